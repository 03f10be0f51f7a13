
use std::collections::HashMap;
use std::sync::Arc;

use crate::DoaErr;

/// Search over PRN identity and Doppler for a satellite signal in one channel
pub mod acquisition;

pub mod constants;

pub mod gps_l1_ca;

/// Source of bipolar spreading codes.  Acquisition and simulation only see codes through this trait so
/// another code family can be swapped in without touching the search.
pub trait CodeGenerator: Send + Sync {
	/// One full code period resampled to `fs`
	fn sampled(&self, prn:usize, fs:f64) -> Result<Vec<i8>, DoaErr>;
}

/// Memoizes generated codes by (PRN, sample rate).  Codes are a pure function of both, so entries never
/// need to be invalidated.
pub struct PrnCodeCache {
	generator: Box<dyn CodeGenerator>,
	codes: HashMap<(usize, u64), Arc<Vec<i8>>>,
}

impl PrnCodeCache {

	pub fn new<G: CodeGenerator + 'static>(generator:G) -> Self {
		Self { generator: Box::new(generator), codes: HashMap::new() }
	}

	pub fn gps_l1_ca() -> Self { Self::new(gps_l1_ca::signal_modulation::GpsL1Ca) }

	pub fn sampled(&mut self, prn:usize, fs:f64) -> Result<Arc<Vec<i8>>, DoaErr> {
		let key = (prn, fs.to_bits());
		if let Some(code) = self.codes.get(&key) {
			return Ok(code.clone());
		}

		let code = Arc::new(self.generator.sampled(prn, fs)?);
		self.codes.insert(key, code.clone());
		Ok(code)
	}

	/// The sampled code repeated `n_periods` times
	pub fn tiled(&mut self, prn:usize, fs:f64, n_periods:usize) -> Result<Vec<i8>, DoaErr> {
		let code = self.sampled(prn, fs)?;
		Ok(code.iter().cycle().take(code.len() * n_periods).cloned().collect())
	}

	pub fn len(&self) -> usize { self.codes.len() }
	pub fn is_empty(&self) -> bool { self.codes.is_empty() }

}

#[cfg(test)]
mod tests {

	use super::*;

	#[test]
	fn cache_returns_identical_codes() {
		let mut cache = PrnCodeCache::gps_l1_ca();
		let a = cache.sampled(13, 2.046e6).unwrap();
		let b = cache.sampled(13, 2.046e6).unwrap();
		assert!(Arc::ptr_eq(&a, &b));
		assert_eq!(cache.len(), 1);

		cache.sampled(13, 4.092e6).unwrap();
		assert_eq!(cache.len(), 2);
	}

	#[test]
	fn tiled_repeats_code() {
		let mut cache = PrnCodeCache::gps_l1_ca();
		let one = cache.sampled(7, 2.046e6).unwrap();
		let three = cache.tiled(7, 2.046e6, 3).unwrap();
		assert_eq!(three.len(), 3 * one.len());
		assert_eq!(&three[2*one.len()..], &one[..]);
	}

	#[test]
	fn cache_propagates_invalid_prn() {
		let mut cache = PrnCodeCache::gps_l1_ca();
		assert_eq!(cache.sampled(33, 2.046e6), Err(DoaErr::InvalidPrn(33)));
		assert!(cache.is_empty());
	}

}
