
use serde::{Serialize, Deserialize};

use crate::DoaErr;
use crate::fourier_analysis::Correlator;
use crate::gnss::PrnCodeCache;
use crate::types::{CorrelationVector, SampleSequence};
use crate::utils;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
	/// Code periods tiled into the replica; longer replicas give taller, more numerous peaks
	pub code_periods: usize,
}

impl Default for CorrelationConfig {
	fn default() -> Self { Self { code_periods: 10 } }
}

/// Carrier-wiped, full-resolution correlation of one channel against the replica for `prn`
pub fn extract(signal:&SampleSequence, prn:usize, doppler_hz:f64, code_periods:usize, codes:&mut PrnCodeCache) -> Result<CorrelationVector, DoaErr> {
	Ok(extract_all(std::slice::from_ref(signal), prn, doppler_hz, code_periods, codes)?.remove(0))
}

/// `extract` for a set of equal-length channels sharing a sample rate.  The replica spectrum is only
/// computed once.
pub fn extract_all(channels:&[SampleSequence], prn:usize, doppler_hz:f64, code_periods:usize, codes:&mut PrnCodeCache) -> Result<Vec<CorrelationVector>, DoaErr> {
	let first = channels.first().ok_or(DoaErr::EmptySignal)?;
	if code_periods == 0 { return Err(DoaErr::InvalidConfig("correlation needs at least one code period".into())); }

	let replica = codes.tiled(prn, first.fs, code_periods)?;
	let correlator = Correlator::from_bipolar(&replica, first.len())?;

	channels.iter().map(|ch| {
		if ch.fs != first.fs {
			return Err(DoaErr::InvalidConfig(format!("channel sample rates differ ({} vs {})", ch.fs, first.fs)));
		}
		correlator.correlate(&utils::rotate(&ch.samples, -doppler_hz, ch.fs))
	}).collect()
}

#[cfg(test)]
mod tests {

	use super::*;
	use crate::simulation;

	#[test]
	fn peak_sits_at_code_offset() {
		let fs = 2.046e6;
		let mut codes = PrnCodeCache::gps_l1_ca();
		let clean = simulation::clean_signal(&mut codes, 5, fs, 4, false).unwrap();
		let signal = simulation::apply_doppler(&simulation::apply_code_offset(&clean, 100), 750.0, fs);
		let seq = SampleSequence::new(signal, fs).unwrap();

		let corr = extract(&seq, 5, 750.0, 2, &mut codes).unwrap();
		assert_eq!(corr.len(), 2*2046 + 4*2046 - 1);

		let mags = corr.magnitudes();
		let (best_idx, best) = mags.iter().enumerate().fold((0, 0.0), |b, (i, m)| if *m > b.1 { (i, *m) } else { b });
		assert!((best - 2.0*2046.0).abs() < 1e-6, "{}", best);
		assert_eq!(corr.lag_at(best_idx).rem_euclid(2046), 100);
	}

	#[test]
	fn mixed_rates_are_rejected() {
		let mut codes = PrnCodeCache::gps_l1_ca();
		let a = SampleSequence::new(simulation::clean_signal(&mut codes, 1, 2.046e6, 1, false).unwrap(), 2.046e6).unwrap();
		let b = SampleSequence::new(a.samples.clone(), 4.092e6).unwrap();
		assert!(extract_all(&[a, b], 1, 0.0, 1, &mut codes).is_err());
		assert_eq!(extract_all(&[], 1, 0.0, 1, &mut codes).unwrap_err(), DoaErr::EmptySignal);
	}

}
