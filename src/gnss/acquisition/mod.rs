
use std::sync::atomic::{AtomicBool, Ordering};

use rayon::prelude::*;
use serde::{Serialize, Deserialize};
use tracing::{debug, info};

use crate::DoaErr;
use crate::fourier_analysis::Correlator;
use crate::gnss::PrnCodeCache;
use crate::types::SampleSequence;
use crate::utils;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
	pub prns: Vec<usize>,
	pub doppler_min_hz: f64,
	pub doppler_max_hz: f64,
	pub doppler_step_hz: f64,
	/// Code periods tiled into the local replica
	pub code_periods: usize,
	/// Minimum peak/median correlation magnitude ratio for a detection
	pub min_peak_to_median: f64,
}

impl Default for AcquisitionConfig {
	fn default() -> Self {
		Self {
			prns: (1..=32).collect(),
			doppler_min_hz: -5000.0,
			doppler_max_hz: 5000.0,
			doppler_step_hz: 50.0,
			code_periods: 2,
			min_peak_to_median: 6.0,
		}
	}
}

impl AcquisitionConfig {

	/// Symmetric Doppler window sized from `utils::kinematics::max_doppler_hz`
	pub fn with_doppler_bound(mut self, max_abs_doppler_hz:f64) -> Self {
		self.doppler_min_hz = -max_abs_doppler_hz.abs();
		self.doppler_max_hz =  max_abs_doppler_hz.abs();
		self
	}

	/// PRNs in search order: ascending, without repeats
	pub fn prn_set(&self) -> Vec<usize> {
		let mut prns = self.prns.clone();
		prns.sort();
		prns.dedup();
		prns
	}

	/// Doppler hypotheses from min to max in steps of `doppler_step_hz`.  The max is included when it
	/// falls on the grid.
	pub fn doppler_bins(&self) -> Result<Vec<f64>, DoaErr> {
		if !(self.doppler_step_hz.is_finite() && self.doppler_step_hz > 0.0) {
			return Err(DoaErr::InvalidConfig(format!("Doppler step must be positive, got {}", self.doppler_step_hz)));
		}
		if !(self.doppler_min_hz.is_finite() && self.doppler_max_hz.is_finite()) || self.doppler_max_hz < self.doppler_min_hz {
			return Err(DoaErr::InvalidConfig(format!("bad Doppler range [{}, {}]", self.doppler_min_hz, self.doppler_max_hz)));
		}

		let n_bins:usize = ((self.doppler_max_hz - self.doppler_min_hz) / self.doppler_step_hz + 1e-9).floor() as usize + 1;
		Ok((0..n_bins).map(|k| self.doppler_min_hz + (k as f64)*self.doppler_step_hz).collect())
	}

	pub fn validate(&self) -> Result<(), DoaErr> {
		if self.prns.is_empty() { return Err(DoaErr::InvalidConfig("empty PRN search set".into())); }
		if self.code_periods == 0 { return Err(DoaErr::InvalidConfig("acquisition needs at least one code period".into())); }
		if !(self.min_peak_to_median.is_finite() && self.min_peak_to_median >= 0.0) {
			return Err(DoaErr::InvalidConfig(format!("bad detection threshold {}", self.min_peak_to_median)));
		}
		self.doppler_bins().map(|_| ())
	}

}

/// Detector output for one (PRN, Doppler) hypothesis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HypothesisScore {
	pub prn: usize,
	pub doppler_hz: f64,
	pub peak_to_median: f64,
	/// Correlation lag of the strongest peak
	pub peak_lag: isize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionResult {
	pub prn: usize,
	pub doppler_hz: f64,
	pub doppler_step_hz: f64,
	pub peak_to_median: f64,
	pub peak_lag: isize,
}

fn check_cancel(cancel:Option<&AtomicBool>) -> Result<(), DoaErr> {
	match cancel {
		Some(flag) if flag.load(Ordering::Relaxed) => Err(DoaErr::Cancelled),
		_ => Ok(())
	}
}

fn score_correlation(magnitudes:&[f64]) -> (f64, usize) {
	let mut best = (0.0, 0);
	for (idx, m) in magnitudes.iter().enumerate() {
		if best.0 < *m { best = (*m, idx); }
	}

	// A zero median means there is no noise floor to measure the peak against
	match utils::median(magnitudes) {
		Some(median) if median > 0.0 => (best.0 / median, best.1),
		_ => (0.0, best.1),
	}
}

/// Scores every (PRN, Doppler) hypothesis.  Results come back PRN-major in `prn_set()` order with
/// Doppler ascending, whatever order the worker threads finish in.
pub fn search_grid(signal:&SampleSequence, config:&AcquisitionConfig, codes:&mut PrnCodeCache, cancel:Option<&AtomicBool>) -> Result<Vec<HypothesisScore>, DoaErr> {
	config.validate()?;
	if signal.is_empty() { return Err(DoaErr::EmptySignal); }

	let freqs:Vec<f64> = config.doppler_bins()?;
	let replicas:Vec<(usize, Vec<i8>)> = config.prn_set().into_iter()
		.map(|prn| Ok((prn, codes.tiled(prn, signal.fs, config.code_periods)?)))
		.collect::<Result<Vec<_>, DoaErr>>()?;

	let per_prn:Vec<Vec<HypothesisScore>> = replicas.par_iter().map(|(prn, replica)| {
		check_cancel(cancel)?;
		let correlator = Correlator::from_bipolar(replica, signal.len())?;

		freqs.iter().map(|freq| {
			check_cancel(cancel)?;

			// Wipe the carrier off the input signal, then correlate against the local code
			let wiped = utils::rotate(&signal.samples, -freq, signal.fs);
			let corr = correlator.correlate(&wiped)?;
			let (peak_to_median, peak_idx) = score_correlation(&corr.magnitudes());

			Ok(HypothesisScore{ prn: *prn, doppler_hz: *freq, peak_to_median, peak_lag: corr.lag_at(peak_idx) })
		}).collect::<Result<Vec<HypothesisScore>, DoaErr>>()
	}).collect::<Result<Vec<Vec<HypothesisScore>>, DoaErr>>()?;

	Ok(per_prn.concat())
}

/// Arg-max over the grid.  Only a strictly larger score replaces the current best, so ties go to the
/// hypothesis that comes first.
pub fn select_best(scores:&[HypothesisScore]) -> Option<&HypothesisScore> {
	let mut best:Option<&HypothesisScore> = None;
	for s in scores {
		match best {
			Some(b) if b.peak_to_median >= s.peak_to_median => {},
			_ => best = Some(s),
		}
	}
	best
}

/// Finds the strongest (PRN, Doppler) pair in one channel, or `AcquisitionFailed` when nothing clears
/// `config.min_peak_to_median`
pub fn acquire(signal:&SampleSequence, config:&AcquisitionConfig, codes:&mut PrnCodeCache, cancel:Option<&AtomicBool>) -> Result<AcquisitionResult, DoaErr> {
	let scores = search_grid(signal, config, codes, cancel)?;
	let best = select_best(&scores).ok_or(DoaErr::EmptySignal)?;

	debug!(hypotheses = scores.len(), best_prn = best.prn, best_doppler_hz = best.doppler_hz, best_ratio = best.peak_to_median, "acquisition grid searched");

	if best.peak_to_median < config.min_peak_to_median {
		return Err(DoaErr::AcquisitionFailed{ best_ratio: best.peak_to_median, threshold: config.min_peak_to_median });
	}

	info!(prn = best.prn, doppler_hz = best.doppler_hz, peak_to_median = best.peak_to_median, "satellite acquired");

	Ok(AcquisitionResult {
		prn: best.prn,
		doppler_hz: best.doppler_hz,
		doppler_step_hz: config.doppler_step_hz,
		peak_to_median: best.peak_to_median,
		peak_lag: best.peak_lag,
	})
}
