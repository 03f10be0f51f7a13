
use std::f64::consts;

use num_complex::Complex;
use serde::{Serialize, Deserialize};
use tracing::debug;

use crate::DoaErr;
use crate::fourier_analysis;
use crate::types::CorrelationVector;
use crate::utils;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseConfig {
	/// Peak height as a multiple of the channel's median correlation magnitude
	pub peak_threshold: f64,
	/// Half-width in samples of the window searched in the other channel
	pub match_window: usize,
	/// Differences within this many degrees of both sides of 0/360 are unwrapped before aggregating
	pub wrap_band_deg: f64,
}

impl Default for PhaseConfig {
	fn default() -> Self {
		Self { peak_threshold: 7.5, match_window: 5, wrap_band_deg: 15.0 }
	}
}

impl PhaseConfig {

	pub fn validate(&self) -> Result<(), DoaErr> {
		if !(self.peak_threshold.is_finite() && self.peak_threshold > 0.0) {
			return Err(DoaErr::InvalidConfig(format!("peak threshold must be positive, got {}", self.peak_threshold)));
		}
		if !(self.wrap_band_deg >= 0.0 && self.wrap_band_deg < 90.0) {
			return Err(DoaErr::InvalidConfig(format!("wrap band must be in [0, 90) deg, got {}", self.wrap_band_deg)));
		}
		Ok(())
	}

}

/// Phase of the other channel relative to the reference, aggregated over matched correlation peaks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseDifference {
	/// Median estimate in (-pi, pi]; the one used for angle resolution
	pub median_rad: f64,
	pub mean_rad: f64,
	/// Population standard deviation of the per-peak differences
	pub std_rad: f64,
	pub matched_peaks: usize,
}

/// Magnitudes divided by their own median
pub fn normalized_magnitudes(corr:&CorrelationVector) -> Result<Vec<f64>, DoaErr> {
	let mags = corr.magnitudes();
	match utils::median(&mags) {
		Some(median) if median > 0.0 => Ok(mags.into_iter().map(|m| m / median).collect()),
		Some(_) => Err(DoaErr::InsufficientPeaks),
		None => Err(DoaErr::EmptySignal),
	}
}

/// The other channel's sample at the reference index is kept when it reaches this fraction of the
/// strongest sample in the window.  A one-sample delay leaves it at about half.
const ALIGNED_PEAK_FRACTION:f64 = 0.75;

/// Interior local maxima strictly above `threshold` that are also the largest sample within `distance`
/// of themselves.  On a flat top, or between equal maxima closer than `distance`, only the first counts.
pub fn find_peaks(x:&[f64], threshold:f64, distance:usize) -> Vec<usize> {
	if x.len() < 3 { return vec![]; }
	(1..(x.len()-1)).filter(|&i| {
		if !(x[i] > threshold && x[i] > x[i-1] && x[i] >= x[i+1]) { return false; }
		let lo = i.saturating_sub(distance);
		let hi = (i + distance).min(x.len() - 1);
		x[lo..i].iter().all(|v| *v < x[i]) && x[(i+1)..=hi].iter().all(|v| *v <= x[i])
	}).collect()
}

/// Pairs each reference peak with a sample of `other` within `window` samples of it: the same index when
/// `other` is nearly as strong there as anywhere in the window, otherwise the strongest sample.  Pairs
/// whose other-channel sample doesn't also clear `threshold` are dropped.
pub fn match_peaks(reference:&[f64], other:&[f64], threshold:f64, window:usize) -> Vec<(usize, usize)> {
	let mut ans:Vec<(usize, usize)> = vec![];
	if other.len() < 3 { return ans; }

	for i_ref in find_peaks(reference, threshold, window) {
		let lo = i_ref.saturating_sub(window);
		let hi = (i_ref + window).min(other.len() - 1);
		if lo > hi { continue; }

		let mut best = lo;
		for j in lo..=hi {
			if other[j] > other[best] { best = j; }
		}

		let aligned = i_ref < other.len() && other[i_ref] > threshold && other[i_ref] >= ALIGNED_PEAK_FRACTION * other[best];
		let i_other = if aligned { i_ref } else { best };

		if other[i_other] > threshold { ans.push((i_ref, i_other)); }
	}

	ans
}

/// Per-peak `angle(ref) - angle(other)` in [0, 2pi), before any unwrapping
fn raw_differences(reference:&[Complex<f64>], other:&[Complex<f64>], pairs:&[(usize, usize)]) -> Vec<f64> {
	pairs.iter().map(|(i, j)| {
		let d:f64 = reference[*i].arg() - other[*j].arg();
		if d < 0.0 { d + 2.0*consts::PI } else { d }
	}).collect()
}

/// When every difference hugs the 0/2pi seam, lifts the ones just above zero by 2pi so the cluster
/// isn't split in two
pub fn unwrap_boundary(diffs:&mut [f64], band_deg:f64) {
	let band:f64 = band_deg.to_radians();
	let max = diffs.iter().cloned().fold(std::f64::NEG_INFINITY, f64::max);
	let min = diffs.iter().cloned().fold(std::f64::INFINITY, f64::min);

	if max > 2.0*consts::PI - band && min < band {
		for d in diffs.iter_mut() {
			if *d < consts::FRAC_PI_2 { *d += 2.0*consts::PI; }
		}
	}
}

/// Phase of `other` behind `reference`, from the correlation peaks the two channels share.  Because the
/// input side of each correlation is conjugated, the aggregate is negated before it's returned, so a
/// channel delayed by `exp(-j*phi)` comes back as `+phi`.
pub fn estimate(reference:&CorrelationVector, other:&CorrelationVector, config:&PhaseConfig) -> Result<PhaseDifference, DoaErr> {
	if reference.len() != other.len() {
		return Err(DoaErr::LengthMismatch{ expected: reference.len(), actual: other.len() });
	}
	config.validate()?;

	let ref_norm = normalized_magnitudes(reference)?;
	let other_norm = normalized_magnitudes(other)?;

	let pairs = match_peaks(&ref_norm, &other_norm, config.peak_threshold, config.match_window);
	if pairs.is_empty() { return Err(DoaErr::InsufficientPeaks); }

	let mut diffs = raw_differences(&reference.values, &other.values, &pairs);
	unwrap_boundary(&mut diffs, config.wrap_band_deg);

	let median = utils::median(&diffs).ok_or(DoaErr::InsufficientPeaks)?;
	let mean = utils::mean(&diffs).ok_or(DoaErr::InsufficientPeaks)?;
	let std_rad = utils::std_dev(&diffs).ok_or(DoaErr::InsufficientPeaks)?;

	let ans = PhaseDifference {
		median_rad: utils::wrap_to_pi(-utils::wrap_to_pi(median)),
		mean_rad:   utils::wrap_to_pi(-utils::wrap_to_pi(mean)),
		std_rad,
		matched_peaks: pairs.len(),
	};

	debug!(matched_peaks = ans.matched_peaks, median_rad = ans.median_rad, std_rad = ans.std_rad, "phase difference estimated");
	Ok(ans)
}

/// Lag `l` maximizing `|sum_n a[n] * conj(b[n + l])|`; positive when `b` runs `l` samples behind `a`.
/// Used to measure cable delay between channels.
pub fn sample_delay(a:&[Complex<f64>], b:&[Complex<f64>]) -> Result<isize, DoaErr> {
	let corr = fourier_analysis::correlate(a, b)?;
	let mags = corr.magnitudes();

	let mut best_idx:usize = 0;
	for (idx, m) in mags.iter().enumerate() {
		if *m > mags[best_idx] { best_idx = idx; }
	}
	Ok(corr.lag_at(best_idx))
}

/// Carrier phase, in (-pi, pi], that a delay of `delay` samples puts between two channels recorded at
/// `center_freq_hz`
pub fn delay_to_phase(delay:isize, fs:f64, center_freq_hz:f64) -> f64 {
	utils::wrap_to_pi(2.0 * consts::PI * center_freq_hz * (delay as f64) / fs)
}

#[cfg(test)]
mod tests {

	use super::*;
	use approx::assert_abs_diff_eq;
	use rand::SeedableRng;
	use rand::rngs::StdRng;

	use crate::doa::correlation;
	use crate::gnss::PrnCodeCache;
	use crate::simulation;
	use crate::types::SampleSequence;

	const FS:f64 = 2.046e6;

	fn corr_pair(phi:f64) -> (CorrelationVector, CorrelationVector) {
		let mut codes = PrnCodeCache::gps_l1_ca();
		let clean = simulation::clean_signal(&mut codes, 13, FS, 6, false).unwrap();
		let shifted = simulation::apply_doppler(&simulation::apply_code_offset(&clean, 333), 1250.0, FS);
		let a = SampleSequence::new(shifted.clone(), FS).unwrap();
		let b = SampleSequence::new(utils::impose_phase(&shifted, phi), FS).unwrap();

		let mut corrs = correlation::extract_all(&[a, b], 13, 1250.0, 3, &mut codes).unwrap();
		let other = corrs.remove(1);
		(corrs.remove(0), other)
	}

	#[test]
	fn injected_phase_comes_back_negated() {
		for phi_deg in [-170.0, -60.0, 0.0, 31.0, 100.0, 179.0].iter() {
			let phi = (*phi_deg as f64).to_radians();
			let (a, b) = corr_pair(phi);
			let est = estimate(&a, &b, &PhaseConfig::default()).unwrap();

			assert!(est.matched_peaks > 1);
			assert_abs_diff_eq!(utils::wrap_to_pi(est.median_rad + phi), 0.0, epsilon = 1f64.to_radians());
			assert_abs_diff_eq!(est.std_rad, 0.0, epsilon = 1e-6);
		}
	}

	#[test]
	fn cluster_on_the_seam_is_unwrapped() {
		let mut diffs = vec![0.05, 2.0*consts::PI - 0.05, 0.02, 2.0*consts::PI - 0.1];
		unwrap_boundary(&mut diffs, 15.0);
		assert!(diffs.iter().all(|d| *d > consts::PI));
		let median = utils::median(&diffs).unwrap();
		assert_abs_diff_eq!(utils::wrap_to_pi(median), -0.015, epsilon = 1e-12);

		// Nothing near the top edge: leave alone
		let mut diffs = vec![0.05, 1.0, 0.02];
		unwrap_boundary(&mut diffs, 15.0);
		assert_eq!(diffs, vec![0.05, 1.0, 0.02]);
	}

	#[test]
	fn small_negative_phase_is_recovered() {
		let (a, b) = corr_pair(-0.001);
		let est = estimate(&a, &b, &PhaseConfig::default()).unwrap();
		assert_abs_diff_eq!(est.median_rad, 0.001, epsilon = 1e-6);
		assert_abs_diff_eq!(est.mean_rad, 0.001, epsilon = 1e-6);
	}

	#[test]
	fn peaks_outside_window_are_rejected() {
		let mut reference = vec![1.0; 40];
		let mut other = vec![1.0; 40];
		reference[10] = 20.0;
		reference[30] = 20.0;
		other[13] = 15.0;
		other[37] = 15.0;

		assert_eq!(match_peaks(&reference, &other, 7.5, 5), vec![(10, 13)]);
		assert_eq!(match_peaks(&reference, &other, 7.5, 7), vec![(10, 13), (30, 37)]);
		assert!(match_peaks(&reference, &other, 16.0, 5).is_empty());
	}

	#[test]
	fn smaller_lobes_next_to_a_peak_are_skipped() {
		let mut x = vec![1.0; 30];
		x[10] = 10.0;
		x[13] = 12.0;
		x[25] = 9.0;
		assert_eq!(find_peaks(&x, 7.5, 5), vec![13, 25]);
		assert_eq!(find_peaks(&x, 7.5, 2), vec![10, 13, 25]);

		// Same shape in both channels: every reference peak pairs with itself
		assert_eq!(match_peaks(&x, &x, 7.5, 5), vec![(13, 13), (25, 25)]);
	}

	#[test]
	fn aligned_peak_beats_a_larger_neighbor() {
		let mut reference = vec![1.0; 30];
		let mut other = vec![1.0; 30];
		reference[10] = 20.0;
		other[10] = 15.0;
		other[13] = 18.0;
		assert_eq!(match_peaks(&reference, &other, 7.5, 5), vec![(10, 10)]);

		// One sample of cable delay: the other channel peaks next door instead
		other[10] = 8.0;
		other[11] = 16.0;
		assert_eq!(match_peaks(&reference, &other, 7.5, 5), vec![(10, 13)]);
		other[13] = 1.0;
		assert_eq!(match_peaks(&reference, &other, 7.5, 5), vec![(10, 11)]);
	}

	#[test]
	fn mean_agrees_with_median_on_clean_input() {
		for phi_deg in [-120.0, 45.0].iter() {
			let phi = (*phi_deg as f64).to_radians();
			let (a, b) = corr_pair(phi);
			let est = estimate(&a, &b, &PhaseConfig::default()).unwrap();

			assert_abs_diff_eq!(est.mean_rad, est.median_rad, epsilon = 1e-6);
			assert_abs_diff_eq!(utils::wrap_to_pi(est.mean_rad + phi), 0.0, epsilon = 1e-6);
			assert_abs_diff_eq!(est.std_rad, 0.0, epsilon = 1e-6);
		}
	}

	#[test]
	fn flat_tops_count_once() {
		assert_eq!(find_peaks(&[0.0, 9.0, 9.0, 1.0, 8.0, 0.0], 7.5, 1), vec![1, 4]);
		assert!(find_peaks(&[9.0, 1.0], 7.5, 1).is_empty());
	}

	#[test]
	fn no_shared_peaks_is_an_error() {
		let (a, _) = corr_pair(0.0);
		let mut codes = PrnCodeCache::gps_l1_ca();
		let mut rng = StdRng::seed_from_u64(5);
		let silence = vec![Complex{ re: 0.0, im: 0.0 }; a.len_b];
		let noise = simulation::add_noise(&silence, &simulation::NoiseModel::awgn_db(0.0), &mut rng).unwrap();
		let b = correlation::extract(&SampleSequence::new(noise, FS).unwrap(), 13, 1250.0, 3, &mut codes).unwrap();

		assert_eq!(estimate(&a, &b, &PhaseConfig::default()).unwrap_err(), DoaErr::InsufficientPeaks);
	}

	#[test]
	fn mismatched_lengths_fail_fast() {
		let (a, _) = corr_pair(0.0);
		let short = CorrelationVector{ len_a: 1, len_b: 1, values: vec![Complex{ re: 1.0, im: 0.0 }] };
		assert_eq!(estimate(&a, &short, &PhaseConfig::default()).unwrap_err(), DoaErr::LengthMismatch{ expected: a.len(), actual: 1 });
	}

	#[test]
	fn delay_between_channels() {
		let mut codes = PrnCodeCache::gps_l1_ca();
		let a = simulation::clean_signal(&mut codes, 3, FS, 1, false).unwrap();
		let b = simulation::apply_code_offset(&a, 17);
		assert_eq!(sample_delay(&a, &b).unwrap(), 17);
		assert_eq!(sample_delay(&b, &a).unwrap(), -17);
	}

	#[test]
	fn delay_converts_to_carrier_phase() {
		assert_abs_diff_eq!(delay_to_phase(3, 4e6, 1e6), -consts::FRAC_PI_2, epsilon = 1e-12);
		assert_abs_diff_eq!(delay_to_phase(-3, 4e6, 1e6), consts::FRAC_PI_2, epsilon = 1e-12);
		assert_eq!(delay_to_phase(0, 4e6, 1e6), 0.0);

		// L1 is exactly 770 cycles per sample at twice the chip rate
		let l1 = crate::gnss::constants::gps::L1_CARRIER_FREQ_HZ;
		assert_abs_diff_eq!(delay_to_phase(1, FS, l1), 0.0, epsilon = 1e-6);
	}

}
