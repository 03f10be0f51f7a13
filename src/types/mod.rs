
use num_complex::Complex;
use serde::{Serialize, Deserialize};

use crate::DoaErr;
use crate::gnss::constants::gps;
use crate::utils;

/// I/Q samples from one antenna channel, tagged with the rate they were taken at and the RF frequency
/// that sits at 0 Hz
#[derive(Debug, Clone)]
pub struct SampleSequence {
	pub fs: f64,
	pub center_freq_hz: f64,
	pub samples: Vec<Complex<f64>>,
}

impl SampleSequence {

	pub fn new(samples:Vec<Complex<f64>>, fs:f64) -> Result<Self, DoaErr> {
		if !(fs.is_finite() && fs > 0.0) { return Err(DoaErr::InvalidConfig(format!("sample rate must be positive, got {}", fs))); }
		if samples.is_empty() { return Err(DoaErr::EmptySignal); }
		Ok(Self { fs, center_freq_hz: gps::L1_CARRIER_FREQ_HZ, samples })
	}

	/// Same samples, recorded by a front end tuned to `center_freq_hz` instead of L1
	pub fn with_center_freq(mut self, center_freq_hz:f64) -> Self {
		self.center_freq_hz = center_freq_hz;
		self
	}

	/// Where L1 shows up in this capture
	pub fn l1_offset_hz(&self) -> f64 { gps::L1_CARRIER_FREQ_HZ - self.center_freq_hz }

	/// Shifts the capture so L1 lands on 0 Hz
	pub fn tuned_to_l1(&self) -> Self {
		let offset = self.l1_offset_hz();
		if offset == 0.0 { return self.clone(); }
		Self { fs: self.fs, center_freq_hz: gps::L1_CARRIER_FREQ_HZ, samples: utils::rotate(&self.samples, -offset, self.fs) }
	}

	pub fn len(&self) -> usize { self.samples.len() }
	pub fn is_empty(&self) -> bool { self.samples.is_empty() }

	/// Copy without the first `seconds` of samples
	pub fn trim_leading(&self, seconds:f64) -> Result<Self, DoaErr> {
		if !(seconds.is_finite() && seconds >= 0.0) {
			return Err(DoaErr::InvalidConfig(format!("bad trim interval {}", seconds)));
		}
		let n_drop:usize = (seconds * self.fs).round() as usize;
		if n_drop >= self.samples.len() { return Err(DoaErr::EmptySignal); }
		Ok(Self { fs: self.fs, center_freq_hz: self.center_freq_hz, samples: self.samples[n_drop..].to_vec() })
	}

}

/// Full linear cross-correlation of `a` against `b`.  Index `i` holds lag `i + min_lag()`, where the
/// lags run from `1 - len(a)` to `len(b) - 1`.
#[derive(Debug, Clone)]
pub struct CorrelationVector {
	pub len_a: usize,
	pub len_b: usize,
	pub values: Vec<Complex<f64>>,
}

impl CorrelationVector {

	pub fn len(&self) -> usize { self.values.len() }
	pub fn is_empty(&self) -> bool { self.values.is_empty() }

	pub fn min_lag(&self) -> isize { 1 - (self.len_a as isize) }
	pub fn max_lag(&self) -> isize { (self.len_b as isize) - 1 }

	pub fn lag_at(&self, idx:usize) -> isize { idx as isize + self.min_lag() }

	pub fn magnitudes(&self) -> Vec<f64> { self.values.iter().map(|c| c.norm()).collect() }

}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleEstimate {
	pub elevation_deg: f64,
	pub azimuth_deg: f64,
}
