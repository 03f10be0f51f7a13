
use std::fs;
use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::DoaErr;
use crate::doa::correlation::CorrelationConfig;
use crate::doa::geometry::{ArrayConfig, ArrayLayout};
use crate::doa::lookup_table::LookupTableParams;
use crate::doa::phase_difference::PhaseConfig;
use crate::filters::LowpassConfig;
use crate::gnss::acquisition::AcquisitionConfig;
use crate::gnss::constants::gps;

/// Everything the direction finder needs, grouped by stage.  Missing fields in a JSON file take the
/// defaults below.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoaConfig {
	pub acquisition: AcquisitionConfig,
	pub correlation: CorrelationConfig,
	pub phase: PhaseConfig,
	pub array: ArrayConfig,
	pub lookup: LookupTableParams,
	/// Also run the sum/difference estimator when the array is 2x2
	pub monopulse: bool,
	/// Skip the PRN search and look for this satellite only
	pub target_prn: Option<usize>,
	/// Shift each channel by the distance between L1 and its recorded center frequency
	pub tune_to_l1: bool,
	/// Lowpass each channel after tuning; off when absent
	pub lowpass: Option<LowpassConfig>,
	/// Leading capture dropped from every channel while the front end settles
	pub trim_leading_sec: f64,
	/// Phase imposed on each non-reference channel before estimation, to cancel hardware offsets
	pub phase_calibration_rad: Vec<f64>,
}

impl Default for DoaConfig {
	fn default() -> Self {
		Self {
			acquisition: AcquisitionConfig::default(),
			correlation: CorrelationConfig::default(),
			phase: PhaseConfig::default(),
			array: ArrayConfig::default(),
			// A single baseline can't tell azimuths apart, so the default pair only tabulates azimuth 0
			lookup: LookupTableParams { max_azimuth_deg: 1, ..LookupTableParams::default() },
			monopulse: true,
			target_prn: None,
			tune_to_l1: true,
			lowpass: None,
			trim_leading_sec: 0.002,
			phase_calibration_rad: vec![],
		}
	}
}

impl DoaConfig {

	pub fn from_json_str(s:&str) -> Result<Self, DoaErr> {
		let cfg:DoaConfig = serde_json::from_str(s).map_err(|e| DoaErr::InvalidConfig(format!("{}", e)))?;
		cfg.validate()?;
		Ok(cfg)
	}

	pub fn from_json_file<P: AsRef<Path>>(path:P) -> Result<Self, DoaErr> {
		let s = fs::read_to_string(path.as_ref()).map_err(|e| DoaErr::Io(format!("{}: {}", path.as_ref().display(), e)))?;
		Self::from_json_str(&s)
	}

	pub fn to_json_string(&self) -> Result<String, DoaErr> {
		serde_json::to_string_pretty(self).map_err(|e| DoaErr::InvalidConfig(format!("{}", e)))
	}

	pub fn validate(&self) -> Result<(), DoaErr> {
		self.acquisition.validate()?;
		self.phase.validate()?;
		self.lookup.validate()?;
		let array = self.array.build()?;

		if self.correlation.code_periods == 0 {
			return Err(DoaErr::InvalidConfig("correlation needs at least one code period".into()));
		}
		if let Some(prn) = self.target_prn {
			gps::g2_shift(prn).ok_or(DoaErr::InvalidPrn(prn))?;
		}
		if let Some(lp) = &self.lowpass {
			lp.validate()?;
		}
		if !(self.trim_leading_sec.is_finite() && self.trim_leading_sec >= 0.0) {
			return Err(DoaErr::InvalidConfig(format!("bad trim interval {}", self.trim_leading_sec)));
		}
		if !self.phase_calibration_rad.is_empty() && self.phase_calibration_rad.len() != array.num_baselines() {
			return Err(DoaErr::InvalidConfig(format!("{} calibration phases given for {} non-reference channels",
				self.phase_calibration_rad.len(), array.num_baselines())));
		}
		Ok(())
	}

	/// Defaults for a preset layout, with the lookup table widened to the full circle for arrays that
	/// can see azimuth
	pub fn for_layout(layout:ArrayLayout) -> Self {
		let mut cfg = Self::default();
		if layout != ArrayLayout::TwoElement {
			cfg.lookup = LookupTableParams::default();
		}
		cfg.array.layout = layout;
		cfg
	}

}
