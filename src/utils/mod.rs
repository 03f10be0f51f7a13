
use std::f64::consts;

use num_complex::Complex;

pub mod kinematics;
pub mod logging;

/// Median with the even-length case averaged, as numpy does it.  NaNs sort last.
pub fn median(x:&[f64]) -> Option<f64> {
	if x.is_empty() { return None; }

	let mut sorted:Vec<f64> = x.to_vec();
	sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Greater));

	let n = sorted.len();
	if n % 2 == 1 { Some(sorted[n / 2]) }
	else          { Some(0.5 * (sorted[n/2 - 1] + sorted[n/2])) }
}

pub fn mean(x:&[f64]) -> Option<f64> {
	if x.is_empty() { None } else { Some(x.iter().sum::<f64>() / x.len() as f64) }
}

/// Population standard deviation
pub fn std_dev(x:&[f64]) -> Option<f64> {
	let mu = mean(x)?;
	Some((x.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / x.len() as f64).sqrt())
}

/// Wraps into [0, 2pi)
pub fn wrap_to_two_pi(x:f64) -> f64 {
	let y = x.rem_euclid(2.0 * consts::PI);
	// rem_euclid can round up to exactly 2pi for tiny negative inputs
	if y >= 2.0 * consts::PI { 0.0 } else { y }
}

/// Wraps into (-pi, pi]
pub fn wrap_to_pi(x:f64) -> f64 {
	let y = wrap_to_two_pi(x);
	if y > consts::PI { y - 2.0 * consts::PI } else { y }
}

pub fn round_to(x:f64, decimals:u32) -> f64 {
	let scale = 10f64.powi(decimals as i32);
	(x * scale).round() / scale
}

/// Multiplies sample k by exp(j*2*pi*freq_hz*k/fs).  A negative frequency wipes off a carrier at +freq_hz.
pub fn rotate(signal:&[Complex<f64>], freq_hz:f64, fs:f64) -> Vec<Complex<f64>> {
	let phase_step_rad:f64 = (2.0 * consts::PI * freq_hz) / fs;
	signal.iter().enumerate().map(|(idx, s)| {
		let phase = phase_step_rad * (idx as f64);
		s * Complex{ re: phase.cos(), im: phase.sin() }
	}).collect()
}

/// Multiplies every sample by exp(j*phase_rad)
pub fn impose_phase(signal:&[Complex<f64>], phase_rad:f64) -> Vec<Complex<f64>> {
	let rot = Complex{ re: phase_rad.cos(), im: phase_rad.sin() };
	signal.iter().map(|s| s * rot).collect()
}

#[cfg(test)]
mod tests {

	use super::*;
	use approx::assert_abs_diff_eq;

	#[test]
	fn median_odd_and_even() {
		assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
		assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
		assert_eq!(median(&[]), None);
	}

	#[test]
	fn std_dev_of_constant_is_zero() {
		assert_eq!(std_dev(&[1.5, 1.5, 1.5]), Some(0.0));
		assert_abs_diff_eq!(std_dev(&[1.0, 3.0]).unwrap(), 1.0, epsilon = 1e-12);
	}

	#[test]
	fn wrapping() {
		assert_abs_diff_eq!(wrap_to_two_pi(-0.5), 2.0 * consts::PI - 0.5, epsilon = 1e-12);
		assert_abs_diff_eq!(wrap_to_two_pi(7.0), 7.0 - 2.0 * consts::PI, epsilon = 1e-12);
		assert_abs_diff_eq!(wrap_to_pi(consts::PI), consts::PI, epsilon = 1e-12);
		assert_abs_diff_eq!(wrap_to_pi(-consts::PI), consts::PI, epsilon = 1e-12);
		assert_abs_diff_eq!(wrap_to_pi(1.5 * consts::PI), -0.5 * consts::PI, epsilon = 1e-12);
		assert!(wrap_to_two_pi(-1e-18) < 2.0 * consts::PI);
	}

	#[test]
	fn rounding() {
		assert_eq!(round_to(0.54553, 3), 0.546);
		assert_eq!(round_to(-1.23449, 3), -1.234);
	}

	#[test]
	fn rotate_then_unrotate_is_identity() {
		let x:Vec<Complex<f64>> = (0..50).map(|i| Complex{ re: i as f64, im: 1.0 }).collect();
		let y = rotate(&rotate(&x, 1250.0, 2.046e6), -1250.0, 2.046e6);
		for (a, b) in x.iter().zip(y.iter()) {
			assert_abs_diff_eq!((a - b).norm(), 0.0, epsilon = 1e-9);
		}
	}

	#[test]
	fn imposed_phase_shows_up_in_arg() {
		let x = vec![Complex{ re: 2.0, im: 0.0 }];
		assert_abs_diff_eq!(impose_phase(&x, 0.7)[0].arg(), 0.7, epsilon = 1e-12);
	}

}
