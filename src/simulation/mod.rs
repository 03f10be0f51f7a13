
//! Synthetic multi-antenna captures.  Everything here is seeded, so the same scenario always produces
//! the same samples.

use num_complex::Complex;
use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use serde::{Serialize, Deserialize};

use crate::DoaErr;
use crate::doa::geometry::AntennaArray;
use crate::gnss::PrnCodeCache;
use crate::types::SampleSequence;
use crate::utils;

/// BPSK code as I/Q (`I = +/-1`, `Q = 0`), repeated for `num_periods` code periods.  A set data bit
/// inverts every chip.
pub fn clean_signal(codes:&mut PrnCodeCache, prn:usize, fs:f64, num_periods:usize, data_bit:bool) -> Result<Vec<Complex<f64>>, DoaErr> {
	if num_periods == 0 { return Err(DoaErr::EmptySignal); }
	let sign:f64 = if data_bit { -1.0 } else { 1.0 };
	let code = codes.tiled(prn, fs, num_periods)?;
	Ok(code.iter().map(|c| Complex{ re: sign * (*c as f64), im: 0.0 }).collect())
}

/// Applies a carrier offset of `doppler_hz`
pub fn apply_doppler(signal:&[Complex<f64>], doppler_hz:f64, fs:f64) -> Vec<Complex<f64>> {
	utils::rotate(signal, doppler_hz, fs)
}

/// Circular delay by `offset` samples
pub fn apply_code_offset(signal:&[Complex<f64>], offset:usize) -> Vec<Complex<f64>> {
	let mut ans = signal.to_vec();
	if !ans.is_empty() {
		let n = ans.len();
		ans.rotate_right(offset % n);
	}
	ans
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseModel {
	/// Complex AWGN power (linear, split evenly between I and Q); zero disables
	pub awgn_power: f64,
	/// Standard deviation of multiplicative phase noise in radians; zero disables
	pub phase_noise_rad: f64,
}

impl Default for NoiseModel {
	fn default() -> Self { Self { awgn_power: 0.0, phase_noise_rad: 0.0 } }
}

impl NoiseModel {

	pub fn awgn_db(power_db:f64) -> Self {
		Self { awgn_power: 10f64.powf(power_db / 10.0), phase_noise_rad: 0.0 }
	}

	pub fn is_silent(&self) -> bool { self.awgn_power == 0.0 && self.phase_noise_rad == 0.0 }

}

pub fn add_noise<R: Rng>(signal:&[Complex<f64>], noise:&NoiseModel, rng:&mut R) -> Result<Vec<Complex<f64>>, DoaErr> {
	if !(noise.awgn_power.is_finite() && noise.awgn_power >= 0.0) {
		return Err(DoaErr::InvalidConfig(format!("bad noise power {}", noise.awgn_power)));
	}

	let awgn = Normal::new(0.0, (noise.awgn_power / 2.0).sqrt()).map_err(|e| DoaErr::InvalidConfig(format!("{:?}", e)))?;
	let jitter = Normal::new(0.0, noise.phase_noise_rad.abs()).map_err(|e| DoaErr::InvalidConfig(format!("{:?}", e)))?;

	Ok(signal.iter().map(|s| {
		let n = Complex{ re: awgn.sample(rng), im: awgn.sample(rng) };
		let p:f64 = jitter.sample(rng);
		(s + n) * Complex{ re: p.cos(), im: p.sin() }
	}).collect())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatedSatellite {
	pub prn: usize,
	pub doppler_hz: f64,
	pub elevation_deg: f64,
	pub azimuth_deg: f64,
	pub amplitude: f64,
	pub data_bit: bool,
	pub code_offset_samples: usize,
}

impl Default for SimulatedSatellite {
	fn default() -> Self {
		Self { prn: 13, doppler_hz: 0.0, elevation_deg: 10.0, azimuth_deg: 0.0, amplitude: 1.0, data_bit: false, code_offset_samples: 0 }
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrayScenario {
	pub fs: f64,
	pub num_periods: usize,
	pub satellites: Vec<SimulatedSatellite>,
	pub noise: NoiseModel,
	pub seed: u64,
}

impl Default for ArrayScenario {
	fn default() -> Self {
		Self { fs: 2.046e6, num_periods: 10, satellites: vec![SimulatedSatellite::default()], noise: NoiseModel::default(), seed: 0 }
	}
}

/// One composite capture per array element.  Element `k > 0` sees each satellite delayed by the
/// geometric phase of baseline `k - 1`, i.e. multiplied by `exp(-j*phase)`.  Noise is drawn
/// independently per element.
pub fn simulate_array(scenario:&ArrayScenario, array:&AntennaArray, codes:&mut PrnCodeCache) -> Result<Vec<SampleSequence>, DoaErr> {
	if scenario.satellites.is_empty() {
		return Err(DoaErr::InvalidConfig("scenario has no satellites".into()));
	}

	let mut channels:Vec<Vec<Complex<f64>>> = Vec::with_capacity(array.num_elements());
	for sat in scenario.satellites.iter() {
		let baseband = clean_signal(codes, sat.prn, scenario.fs, scenario.num_periods, sat.data_bit)?;
		let delayed = apply_code_offset(&baseband, sat.code_offset_samples);
		let rx:Vec<Complex<f64>> = apply_doppler(&delayed, sat.doppler_hz, scenario.fs).into_iter().map(|s| s * sat.amplitude).collect();

		let phases = array.expected_phases(sat.elevation_deg.to_radians(), sat.azimuth_deg.to_radians());
		let per_element = std::iter::once(0.0).chain(phases.into_iter());

		for (idx, phase) in per_element.enumerate() {
			let contribution = utils::impose_phase(&rx, -phase);
			match channels.get_mut(idx) {
				Some(acc) => for (a, c) in acc.iter_mut().zip(contribution.iter()) { *a += *c; },
				None => channels.push(contribution),
			}
		}
	}

	let mut rng = StdRng::seed_from_u64(scenario.seed);
	channels.into_iter().map(|samples| {
		let samples = if scenario.noise.is_silent() { samples } else { add_noise(&samples, &scenario.noise, &mut rng)? };
		SampleSequence::new(samples, scenario.fs)
	}).collect()
}
