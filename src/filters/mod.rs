
use std::collections::VecDeque;
use std::f64::consts;

use num_complex::Complex;
use num_traits::Zero;
use serde::{Serialize, Deserialize};

use crate::DoaErr;

pub trait SampleFilter {

	fn apply(&mut self, x:Complex<f64>) -> Complex<f64>;
	fn initialize(&mut self);

}

/// Lowpass applied to every channel after it's tuned to L1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowpassConfig {
	pub cutoff_hz: f64,
	/// Odd, so the filter has a whole-sample group delay
	pub num_taps: usize,
}

impl Default for LowpassConfig {
	fn default() -> Self { Self { cutoff_hz: 0.5e6, num_taps: 31 } }
}

impl LowpassConfig {

	pub fn validate(&self) -> Result<(), DoaErr> {
		if !(self.cutoff_hz.is_finite() && self.cutoff_hz > 0.0) {
			return Err(DoaErr::InvalidConfig(format!("lowpass cutoff must be positive, got {}", self.cutoff_hz)));
		}
		if self.num_taps < 3 || self.num_taps % 2 == 0 {
			return Err(DoaErr::InvalidConfig(format!("lowpass needs an odd number of taps >= 3, got {}", self.num_taps)));
		}
		Ok(())
	}

	pub fn build(&self, fs:f64) -> Result<FirFilter, DoaErr> {
		self.validate()?;
		FirFilter::lowpass(self.cutoff_hz, fs, self.num_taps)
	}

}

/// Real-tap FIR over complex samples.  `taps[0]` weights the newest sample.
pub struct FirFilter {
	taps: Vec<f64>,
	history: VecDeque<Complex<f64>>,
}

impl FirFilter {

	pub fn new(taps:Vec<f64>) -> Result<Self, DoaErr> {
		if taps.is_empty() { return Err(DoaErr::InvalidConfig("FIR filter needs at least one tap".into())); }
		let history = VecDeque::from(vec![Complex::zero(); taps.len()]);
		Ok(Self { taps, history })
	}

	/// Hamming-windowed sinc normalized to unit gain at DC
	pub fn lowpass(cutoff_hz:f64, fs:f64, num_taps:usize) -> Result<Self, DoaErr> {
		if !(cutoff_hz > 0.0 && cutoff_hz < 0.5 * fs) {
			return Err(DoaErr::InvalidConfig(format!("lowpass cutoff {} [Hz] must be below Nyquist for {} [samples/sec]", cutoff_hz, fs)));
		}
		if num_taps < 3 || num_taps % 2 == 0 {
			return Err(DoaErr::InvalidConfig(format!("lowpass needs an odd number of taps >= 3, got {}", num_taps)));
		}

		let fc:f64 = cutoff_hz / fs;
		let mid:f64 = (num_taps - 1) as f64 / 2.0;
		let taps:Vec<f64> = (0..num_taps).map(|n| {
			let t:f64 = n as f64 - mid;
			let sinc:f64 = if t == 0.0 { 2.0 * fc } else { (2.0 * consts::PI * fc * t).sin() / (consts::PI * t) };
			let window:f64 = 0.54 - 0.46 * (2.0 * consts::PI * (n as f64) / ((num_taps - 1) as f64)).cos();
			sinc * window
		}).collect();

		let dc_gain:f64 = taps.iter().sum();
		Self::new(taps.into_iter().map(|h| h / dc_gain).collect())
	}

	pub fn taps(&self) -> &[f64] { &self.taps }

	/// Delay in samples of a symmetric filter
	pub fn group_delay(&self) -> usize { (self.taps.len() - 1) / 2 }

	/// Filters a whole block from a cleared history and drops the group delay, so output sample `k`
	/// lines up with input sample `k`.  The passband phase of every channel is left untouched.
	pub fn filter_aligned(&mut self, signal:&[Complex<f64>]) -> Vec<Complex<f64>> {
		self.initialize();
		let delay = self.group_delay();
		let padded = signal.iter().cloned().chain(std::iter::repeat(Complex::zero()).take(delay));
		padded.map(|x| self.apply(x)).skip(delay).collect()
	}

}

impl SampleFilter for FirFilter {

	fn apply(&mut self, x:Complex<f64>) -> Complex<f64> {
		self.history.pop_back();
		self.history.push_front(x);
		self.history.iter().zip(self.taps.iter()).fold(Complex::zero(), |acc:Complex<f64>, (s, h)| acc + *s * *h)
	}

	fn initialize(&mut self) {
		for s in self.history.iter_mut() { *s = Complex::zero(); }
	}

}

#[cfg(test)]
mod tests {

	use super::*;
	use approx::assert_abs_diff_eq;

	use crate::utils;

	const FS:f64 = 2.046e6;

	fn tone(freq_hz:f64, n:usize) -> Vec<Complex<f64>> {
		utils::rotate(&vec![Complex{ re: 1.0, im: 0.0 }; n], freq_hz, FS)
	}

	fn mean_power(x:&[Complex<f64>]) -> f64 {
		x.iter().map(|s| s.norm_sqr()).sum::<f64>() / x.len() as f64
	}

	#[test]
	fn impulse_response_is_the_taps() {
		let mut fir = FirFilter::new(vec![0.5, 0.25, 0.25]).unwrap();
		let out:Vec<f64> = [1.0, 0.0, 0.0, 0.0].iter().map(|x| fir.apply(Complex{ re: *x, im: 0.0 }).re).collect();
		assert_eq!(out, vec![0.5, 0.25, 0.25, 0.0]);

		fir.initialize();
		assert_eq!(fir.apply(Complex{ re: 0.0, im: 0.0 }), Complex{ re: 0.0, im: 0.0 });
	}

	#[test]
	fn lowpass_is_symmetric_with_unit_dc_gain() {
		let fir = FirFilter::lowpass(0.5e6, FS, 31).unwrap();
		let taps = fir.taps();
		assert_eq!(taps.len(), 31);
		assert_eq!(fir.group_delay(), 15);
		assert_abs_diff_eq!(taps.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
		for k in 0..15 {
			assert_abs_diff_eq!(taps[k], taps[30 - k], epsilon = 1e-15);
		}
	}

	#[test]
	fn passband_tone_keeps_its_phase_and_stopband_tone_is_removed() {
		let mut fir = FirFilter::lowpass(0.3e6, FS, 63).unwrap();

		let pass = utils::impose_phase(&tone(50e3, 4000), 1.1);
		let out = fir.filter_aligned(&pass);
		assert_eq!(out.len(), pass.len());
		for k in 100..3900 {
			assert_abs_diff_eq!(utils::wrap_to_pi(out[k].arg() - pass[k].arg()), 0.0, epsilon = 1e-3);
			assert_abs_diff_eq!(out[k].norm(), 1.0, epsilon = 0.01);
		}

		let stop = tone(0.9e6, 4000);
		let out = fir.filter_aligned(&stop);
		assert!(mean_power(&out[100..3900]) < 1e-3);
	}

	#[test]
	fn bad_designs_are_rejected() {
		assert!(FirFilter::new(vec![]).is_err());
		assert!(FirFilter::lowpass(0.5e6, FS, 30).is_err());
		assert!(FirFilter::lowpass(1.1e6, FS, 31).is_err());
		assert!(LowpassConfig { cutoff_hz: -1.0, num_taps: 31 }.validate().is_err());
		assert!(LowpassConfig::default().build(FS).is_ok());
	}

}
