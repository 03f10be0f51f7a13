
use std::f64::consts;

use num_complex::Complex;
use num_traits::Zero;

use crate::DoaErr;
use crate::types::AngleEstimate;

// Smallest |difference| / |sum| the ratio is trusted at
const MIN_BEAM_RATIO:f64 = 1e-9;

fn mean(x:&[Complex<f64>]) -> Complex<f64> {
	if x.is_empty() { return Complex::zero(); }
	x.iter().fold(Complex::zero(), |acc:Complex<f64>, s| acc + s) / (x.len() as f64)
}

fn checked_ratio(sum:Complex<f64>, diff:Complex<f64>) -> Result<Complex<f64>, DoaErr> {
	if !(diff.norm() > MIN_BEAM_RATIO * sum.norm()) || diff.norm() == 0.0 {
		return Err(DoaErr::DegenerateMonopulse);
	}
	let ratio = sum / diff;
	if ratio.re.is_finite() && ratio.im.is_finite() { Ok(ratio) } else { Err(DoaErr::DegenerateMonopulse) }
}

fn ratio_to_angle_deg(ratio:Complex<f64>) -> f64 {
	((2.0 / consts::PI) * (-ratio.im).atan()).acos().to_degrees()
}

/// Closed-form angle from the sum and difference beams of a 2x2 array laid out as
///
///   1 2
///   3 4
///
/// with one slice per element, in that order.  The beams are averaged over the slices before the
/// ratios are taken.
pub fn monopulse(channels:&[&[Complex<f64>]]) -> Result<AngleEstimate, DoaErr> {
	if channels.len() != 4 {
		return Err(DoaErr::LengthMismatch{ expected: 4, actual: channels.len() });
	}
	let n = channels[0].len();
	if n == 0 { return Err(DoaErr::EmptySignal); }
	for ch in channels.iter() {
		if ch.len() != n { return Err(DoaErr::LengthMismatch{ expected: n, actual: ch.len() }); }
	}

	let (s1, s2, s3, s4) = (channels[0], channels[1], channels[2], channels[3]);
	let mut sum:Vec<Complex<f64>> = Vec::with_capacity(n);
	let mut delta_az:Vec<Complex<f64>> = Vec::with_capacity(n);
	let mut delta_el:Vec<Complex<f64>> = Vec::with_capacity(n);
	for i in 0..n {
		let left  = s1[i] + s3[i];
		let right = s2[i] + s4[i];
		sum.push(left + right);
		delta_az.push(left - right);
		delta_el.push((s1[i] - s3[i]) + (s2[i] - s4[i]));
	}

	let sum_mean = mean(&sum);
	let azimuth_deg   = ratio_to_angle_deg(checked_ratio(sum_mean, mean(&delta_az))?);
	let elevation_deg = ratio_to_angle_deg(checked_ratio(sum_mean, mean(&delta_el))?);

	Ok(AngleEstimate{ elevation_deg, azimuth_deg })
}

/// Phase of `b` relative to `a` from the sum and difference of the two channels,
/// `2 atan(-Im(mean(a - b) / mean(a + b)))`
pub fn sum_difference_phase(a:&[Complex<f64>], b:&[Complex<f64>]) -> Result<f64, DoaErr> {
	if a.is_empty() { return Err(DoaErr::EmptySignal); }
	if a.len() != b.len() { return Err(DoaErr::LengthMismatch{ expected: a.len(), actual: b.len() }); }

	let sum:Vec<Complex<f64>>  = a.iter().zip(b.iter()).map(|(x, y)| x + y).collect();
	let diff:Vec<Complex<f64>> = a.iter().zip(b.iter()).map(|(x, y)| x - y).collect();

	let sum_mean = mean(&sum);
	let diff_mean = mean(&diff);
	if !(sum_mean.norm() > MIN_BEAM_RATIO * diff_mean.norm()) || sum_mean.norm() == 0.0 {
		return Err(DoaErr::DegenerateMonopulse);
	}

	Ok(2.0 * (-(diff_mean / sum_mean).im).atan())
}
