
use std::collections::HashMap;
use std::sync::Arc;

use serde::{Serialize, Deserialize};
use tracing::{debug, warn};

use crate::{DoaErr, DoaWarning};
use crate::doa::geometry::AntennaArray;
use crate::types::AngleEstimate;
use crate::utils;

// Distances closer than this count as a tie
const TIE_TOLERANCE:f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupTableParams {
	/// Elevations run over [0, max_elevation_deg)
	pub max_elevation_deg: u32,
	/// Azimuths run over [0, max_azimuth_deg)
	pub max_azimuth_deg: u32,
	pub step_deg: u32,
	/// Decimal places kept in both table entries and observed phases
	pub decimals: u32,
}

impl Default for LookupTableParams {
	fn default() -> Self {
		Self { max_elevation_deg: 90, max_azimuth_deg: 360, step_deg: 2, decimals: 3 }
	}
}

impl LookupTableParams {

	pub fn validate(&self) -> Result<(), DoaErr> {
		if self.step_deg == 0 { return Err(DoaErr::InvalidConfig("lookup table step must be at least 1 deg".into())); }
		if self.max_elevation_deg == 0 || self.max_azimuth_deg == 0 {
			return Err(DoaErr::InvalidConfig("lookup table ranges must be non-empty".into()));
		}
		if self.max_elevation_deg > 90 || self.max_azimuth_deg > 360 {
			return Err(DoaErr::InvalidConfig(format!("lookup table range {} x {} deg exceeds the hemisphere", self.max_elevation_deg, self.max_azimuth_deg)));
		}
		if self.decimals > 12 { return Err(DoaErr::InvalidConfig(format!("{} decimals is more than f64 can hold", self.decimals))); }
		Ok(())
	}

}

#[derive(Debug, Clone, PartialEq)]
pub struct LookupEntry {
	pub elevation_deg: i32,
	pub azimuth_deg: i32,
	pub phases: Vec<f64>,
}

/// Table match for an observed phase vector
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
	pub angle: AngleEstimate,
	/// Sum of wrapped per-baseline differences to the winning entry
	pub distance: f64,
	pub warning: Option<DoaWarning>,
}

/// Expected phase of every baseline over an (elevation, azimuth) grid.  Entries are ordered by
/// elevation, then azimuth, both ascending.
#[derive(Debug, Clone)]
pub struct LookupTable {
	params: LookupTableParams,
	num_baselines: usize,
	entries: Vec<LookupEntry>,
}

impl LookupTable {

	pub fn build(array:&AntennaArray, params:&LookupTableParams) -> Result<Self, DoaErr> {
		params.validate()?;

		let step = params.step_deg as usize;
		let mut entries:Vec<LookupEntry> = vec![];
		for el in (0..params.max_elevation_deg).step_by(step) {
			for az in (0..params.max_azimuth_deg).step_by(step) {
				let phases = array.expected_phases((el as f64).to_radians(), (az as f64).to_radians())
					.into_iter().map(|p| utils::round_to(p, params.decimals)).collect();
				entries.push(LookupEntry{ elevation_deg: el as i32, azimuth_deg: az as i32, phases });
			}
		}

		debug!(entries = entries.len(), baselines = array.num_baselines(), "lookup table built");
		Ok(Self { params: params.clone(), num_baselines: array.num_baselines(), entries })
	}

	pub fn num_baselines(&self) -> usize { self.num_baselines }
	pub fn entries(&self) -> &[LookupEntry] { &self.entries }
	pub fn len(&self) -> usize { self.entries.len() }
	pub fn is_empty(&self) -> bool { self.entries.is_empty() }

	/// Nearest entry to `observed` by L1 distance, each component compared modulo 2pi.  The first
	/// minimum in table order wins; equal minima come back with an `AmbiguousLookupMatch` warning.
	pub fn resolve(&self, observed:&[f64]) -> Result<Resolution, DoaErr> {
		if observed.len() != self.num_baselines {
			return Err(DoaErr::LengthMismatch{ expected: self.num_baselines, actual: observed.len() });
		}
		if observed.iter().any(|p| !p.is_finite()) {
			return Err(DoaErr::InvalidConfig("observed phase differences must be finite".into()));
		}

		let rounded:Vec<f64> = observed.iter().map(|p| utils::round_to(*p, self.params.decimals)).collect();
		let distances:Vec<f64> = self.entries.iter().map(|e| {
			e.phases.iter().zip(rounded.iter()).map(|(a, b)| utils::wrap_to_pi(a - b).abs()).sum()
		}).collect();

		let mut best_idx:usize = 0;
		for (idx, d) in distances.iter().enumerate() {
			if *d < distances[best_idx] { best_idx = idx; }
		}

		let best = &self.entries[best_idx];
		let best_distance = distances[best_idx];
		let ties:usize = distances.iter().filter(|d| (*d - best_distance).abs() <= TIE_TOLERANCE).count();

		let warning = if ties > 1 {
			warn!(ties, elevation_deg = best.elevation_deg, azimuth_deg = best.azimuth_deg, "several lookup entries share the minimum distance");
			Some(DoaWarning::AmbiguousLookupMatch{ ties, elevation_deg: best.elevation_deg, azimuth_deg: best.azimuth_deg })
		} else { None };

		Ok(Resolution {
			angle: AngleEstimate{ elevation_deg: best.elevation_deg as f64, azimuth_deg: best.azimuth_deg as f64 },
			distance: best_distance,
			warning,
		})
	}

}

type TableKey = (Vec<(u64, u64)>, u64, u32, u32, u32, u32);

/// Built tables keyed by geometry, wavelength and grid
#[derive(Default)]
pub struct LookupTableCache {
	tables: HashMap<TableKey, Arc<LookupTable>>,
}

impl LookupTableCache {

	pub fn new() -> Self { Self::default() }

	pub fn get(&mut self, array:&AntennaArray, params:&LookupTableParams) -> Result<Arc<LookupTable>, DoaErr> {
		let key:TableKey = (
			array.baselines().iter().map(|b| (b[0].to_bits(), b[1].to_bits())).collect(),
			array.wavelength_m().to_bits(),
			params.max_elevation_deg, params.max_azimuth_deg, params.step_deg, params.decimals);

		if let Some(table) = self.tables.get(&key) {
			return Ok(table.clone());
		}

		let table = Arc::new(LookupTable::build(array, params)?);
		self.tables.insert(key, table.clone());
		Ok(table)
	}

	pub fn len(&self) -> usize { self.tables.len() }
	pub fn is_empty(&self) -> bool { self.tables.is_empty() }

}
