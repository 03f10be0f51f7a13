
use serde::{Serialize, Deserialize};

pub mod config;
pub mod doa;
pub mod filters;
pub mod fourier_analysis;
pub mod gnss;
pub mod io;
pub mod simulation;
pub mod types;

pub mod utils;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DoaErr {
	#[error("invalid PRN {0}; valid ids are 1-32 and 120-138")]
	InvalidPrn(usize),

	#[error("no satellite detected; best peak/median ratio {best_ratio:.2} below threshold {threshold:.2}")]
	AcquisitionFailed { best_ratio: f64, threshold: f64 },

	#[error("insufficient correlation peaks to estimate a phase difference")]
	InsufficientPeaks,

	#[error("difference beam magnitude too small for a monopulse estimate")]
	DegenerateMonopulse,

	#[error("empty signal")]
	EmptySignal,

	#[error("length mismatch: expected {expected}, got {actual}")]
	LengthMismatch { expected: usize, actual: usize },

	#[error("invalid configuration: {0}")]
	InvalidConfig(String),

	#[error("I/O error: {0}")]
	Io(String),

	#[error("acquisition cancelled")]
	Cancelled,
}

/// Conditions worth reporting that don't invalidate an estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DoaWarning {
	AmbiguousLookupMatch { ties: usize, elevation_deg: i32, azimuth_deg: i32 },
	MonopulseUnavailable(String),
}
