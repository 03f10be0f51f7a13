
use std::sync::Arc;

use rustfft::{FFT, FFTplanner};
use rustfft::num_complex::Complex;
use rustfft::num_traits::Zero;

use crate::DoaErr;
use crate::types::CorrelationVector;

/// Full linear cross-correlation against a fixed reference, done by zero-padded FFTs.  The reference
/// spectrum is computed once, so correlating many inputs of the same length (one per Doppler bin, say)
/// only costs one forward and one inverse transform each.
///
/// For reference `a` and input `b` the output at lag `l` is `sum_n a[n] * conj(b[n + l])`, for `l` from
/// `1 - len(a)` to `len(b) - 1`.  The input side is the one conjugated.
pub struct Correlator {
	len_a: usize,
	len_b: usize,
	len_fft: usize,
	fft: Arc<dyn FFT<f64>>,
	ifft: Arc<dyn FFT<f64>>,
	reference_freq_domain: Vec<Complex<f64>>,
}

impl Correlator {

	pub fn new(reference:&[Complex<f64>], len_b:usize) -> Result<Self, DoaErr> {
		let len_a = reference.len();
		if len_a == 0 || len_b == 0 { return Err(DoaErr::EmptySignal); }

		let len_fft:usize = (len_a + len_b - 1).next_power_of_two();

		let mut planner = FFTplanner::new(false);
		let fft = planner.plan_fft(len_fft);
		let mut inv_planner = FFTplanner::new(true);
		let ifft = inv_planner.plan_fft(len_fft);

		let mut reference_time_domain:Vec<Complex<f64>> = reference.to_vec();
		reference_time_domain.resize(len_fft, Complex::zero());
		let mut reference_freq_domain:Vec<Complex<f64>> = vec![Complex::zero(); len_fft];
		fft.process(&mut reference_time_domain, &mut reference_freq_domain);

		Ok(Self { len_a, len_b, len_fft, fft, ifft, reference_freq_domain })
	}

	pub fn from_bipolar(reference:&[i8], len_b:usize) -> Result<Self, DoaErr> {
		let reference:Vec<Complex<f64>> = reference.iter().map(|b| Complex{ re: *b as f64, im: 0.0 }).collect();
		Self::new(&reference, len_b)
	}

	pub fn correlate(&self, signal:&[Complex<f64>]) -> Result<CorrelationVector, DoaErr> {
		if signal.len() != self.len_b {
			return Err(DoaErr::LengthMismatch{ expected: self.len_b, actual: signal.len() });
		}

		let mut signal_time_domain:Vec<Complex<f64>> = signal.to_vec();
		signal_time_domain.resize(self.len_fft, Complex::zero());
		let mut signal_freq_domain:Vec<Complex<f64>> = vec![Complex::zero(); self.len_fft];
		self.fft.process(&mut signal_time_domain, &mut signal_freq_domain);

		// A * conj(B) in the frequency domain is sum_n a[n] conj(b[n - m]) at circular index m
		let mut product:Vec<Complex<f64>> = self.reference_freq_domain.iter()
			.zip(signal_freq_domain.iter())
			.map(|(a, b)| a * b.conj())
			.collect();

		let mut circular:Vec<Complex<f64>> = vec![Complex::zero(); self.len_fft];
		self.ifft.process(&mut product, &mut circular);

		// Lag l lives at circular index -l; the output runs from lag 1 - len_a upward
		let scale:f64 = self.len_fft as f64;
		let values:Vec<Complex<f64>> = (0..(self.len_a + self.len_b - 1)).map(|idx| {
			let neg_lag:usize = (self.len_fft + self.len_a - 1 - idx) % self.len_fft;
			circular[neg_lag] / scale
		}).collect();

		Ok(CorrelationVector{ len_a: self.len_a, len_b: self.len_b, values })
	}

}

/// One-shot version of `Correlator::correlate`
pub fn correlate(a:&[Complex<f64>], b:&[Complex<f64>]) -> Result<CorrelationVector, DoaErr> {
	Correlator::new(a, b.len())?.correlate(b)
}

#[cfg(test)]
mod tests {

	use super::*;
	use approx::assert_abs_diff_eq;

	fn direct_correlation(a:&[Complex<f64>], b:&[Complex<f64>]) -> Vec<Complex<f64>> {
		let la = a.len() as isize;
		let lb = b.len() as isize;
		((1 - la)..lb).map(|lag| {
			let mut acc = Complex::zero();
			for n in 0..la {
				let m = n + lag;
				if m >= 0 && m < lb { acc += a[n as usize] * b[m as usize].conj(); }
			}
			acc
		}).collect()
	}

	fn ramp(n:usize, k:f64) -> Vec<Complex<f64>> {
		(0..n).map(|i| Complex{ re: (i as f64 * k).sin() + 0.3, im: (i as f64 * 0.7 * k).cos() - 0.1 }).collect()
	}

	#[test]
	fn matches_direct_correlation() {
		for (la, lb) in [(1, 1), (3, 8), (8, 3), (17, 40), (64, 64)].iter() {
			let a = ramp(*la, 0.37);
			let b = ramp(*lb, 0.91);

			let fast = correlate(&a, &b).unwrap();
			let slow = direct_correlation(&a, &b);

			assert_eq!(fast.len(), la + lb - 1);
			assert_eq!(fast.min_lag(), 1 - (*la as isize));
			assert_eq!(fast.max_lag(), (*lb as isize) - 1);
			for (x, y) in fast.values.iter().zip(slow.iter()) {
				assert_abs_diff_eq!(x.re, y.re, epsilon = 1e-9);
				assert_abs_diff_eq!(x.im, y.im, epsilon = 1e-9);
			}
		}
	}

	#[test]
	fn peak_lands_on_known_delay() {
		let code:Vec<Complex<f64>> = vec![1.0, -1.0, 1.0, 1.0, -1.0, -1.0, 1.0].into_iter().map(|x| Complex{ re: x, im: 0.0 }).collect();
		let mut signal = vec![Complex::zero(); 20];
		for (i, c) in code.iter().enumerate() { signal[5 + i] = *c; }

		let corr = correlate(&code, &signal).unwrap();
		let (best_idx, _) = corr.magnitudes().into_iter().enumerate().fold((0, 0.0), |best, (i, m)| if m > best.1 { (i, m) } else { best });
		assert_eq!(corr.lag_at(best_idx), 5);
	}

	#[test]
	fn input_side_is_conjugated() {
		let a = vec![Complex{ re: 1.0, im: 0.0 }];
		let b = vec![Complex{ re: 0.0, im: 1.0 }];
		let corr = correlate(&a, &b).unwrap();
		assert_abs_diff_eq!(corr.values[0].im, -1.0, epsilon = 1e-12);
	}

	#[test]
	fn rejects_bad_lengths() {
		let a = ramp(4, 0.1);
		assert_eq!(correlate(&a, &[]).unwrap_err(), DoaErr::EmptySignal);

		let correlator = Correlator::new(&a, 10).unwrap();
		assert_eq!(correlator.correlate(&ramp(9, 0.2)).unwrap_err(), DoaErr::LengthMismatch{ expected: 10, actual: 9 });
	}

}
