
use std::f64::consts;

use nalgebra::Vector2;
use serde::{Serialize, Deserialize};

use crate::DoaErr;
use crate::gnss::constants::gps;

/// Antenna positions relative to the reference element, in meters (x east, y north), plus the carrier
/// wavelength they're used at.  Baseline `k` is the displacement of element `k + 1`.
#[derive(Debug, Clone, PartialEq)]
pub struct AntennaArray {
	baselines: Vec<Vector2<f64>>,
	wavelength_m: f64,
}

impl AntennaArray {

	pub fn new(baselines:Vec<Vector2<f64>>, wavelength_m:f64) -> Result<Self, DoaErr> {
		if baselines.is_empty() {
			return Err(DoaErr::InvalidConfig("an array needs at least one baseline".into()));
		}
		if !(wavelength_m.is_finite() && wavelength_m > 0.0) {
			return Err(DoaErr::InvalidConfig(format!("wavelength must be positive, got {}", wavelength_m)));
		}
		if baselines.iter().any(|b| !(b[0].is_finite() && b[1].is_finite())) {
			return Err(DoaErr::InvalidConfig("non-finite baseline".into()));
		}
		Ok(Self { baselines, wavelength_m })
	}

	/// Reference plus one element `spacing_m` to the east
	pub fn two_element(spacing_m:f64, wavelength_m:f64) -> Result<Self, DoaErr> {
		Self::new(vec![Vector2::new(spacing_m, 0.0)], wavelength_m)
	}

	/// Reference plus one element to the east and one to the north
	pub fn triangular(spacing_m:f64, wavelength_m:f64) -> Result<Self, DoaErr> {
		Self::new(vec![Vector2::new(spacing_m, 0.0), Vector2::new(0.0, spacing_m)], wavelength_m)
	}

	/// 2x2 square; the third baseline is the diagonal
	pub fn square_2x2(spacing_m:f64, wavelength_m:f64) -> Result<Self, DoaErr> {
		Self::new(vec![Vector2::new(spacing_m, 0.0), Vector2::new(0.0, spacing_m), Vector2::new(spacing_m, spacing_m)], wavelength_m)
	}

	/// Two elements half an L1 wavelength apart
	pub fn half_wavelength_pair() -> Self {
		let lambda = gps::l1_wavelength_m();
		Self { baselines: vec![Vector2::new(0.5*lambda, 0.0)], wavelength_m: lambda }
	}

	pub fn num_elements(&self) -> usize { self.baselines.len() + 1 }
	pub fn num_baselines(&self) -> usize { self.baselines.len() }
	pub fn wavelength_m(&self) -> f64 { self.wavelength_m }
	pub fn baselines(&self) -> &[Vector2<f64>] { &self.baselines }

	/// Phase of each non-reference element relative to the reference for a plane wave arriving from
	/// (elevation, azimuth), both in radians.  Azimuth is measured from the east axis toward north.
	pub fn expected_phases(&self, elevation_rad:f64, azimuth_rad:f64) -> Vec<f64> {
		let k:f64 = 2.0 * consts::PI / self.wavelength_m;
		let direction:Vector2<f64> = Vector2::new(azimuth_rad.cos(), azimuth_rad.sin());
		self.baselines.iter().map(|b| k * elevation_rad.sin() * b.dot(&direction)).collect()
	}

}

/// Serializable description of an array, resolved into an `AntennaArray` by `build`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrayLayout {
	TwoElement,
	Triangular,
	#[serde(rename = "square_2x2")]
	Square2x2,
	/// Explicit (east, north) baselines in meters
	Custom(Vec<[f64; 2]>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrayConfig {
	pub layout: ArrayLayout,
	/// Element spacing for the preset layouts; half a wavelength when absent
	pub spacing_m: Option<f64>,
	pub wavelength_m: f64,
}

impl Default for ArrayConfig {
	fn default() -> Self {
		Self { layout: ArrayLayout::TwoElement, spacing_m: None, wavelength_m: gps::l1_wavelength_m() }
	}
}

impl ArrayConfig {

	pub fn build(&self) -> Result<AntennaArray, DoaErr> {
		let d:f64 = self.spacing_m.unwrap_or(0.5 * self.wavelength_m);
		if !(d.is_finite() && d > 0.0) {
			return Err(DoaErr::InvalidConfig(format!("element spacing must be positive, got {}", d)));
		}

		match &self.layout {
			ArrayLayout::TwoElement => AntennaArray::two_element(d, self.wavelength_m),
			ArrayLayout::Triangular => AntennaArray::triangular(d, self.wavelength_m),
			ArrayLayout::Square2x2  => AntennaArray::square_2x2(d, self.wavelength_m),
			ArrayLayout::Custom(xy) => AntennaArray::new(xy.iter().map(|p| Vector2::new(p[0], p[1])).collect(), self.wavelength_m),
		}
	}

}

#[cfg(test)]
mod tests {

	use super::*;
	use approx::assert_abs_diff_eq;

	#[test]
	fn half_wavelength_east_baseline() {
		let array = AntennaArray::half_wavelength_pair();
		let phases = array.expected_phases(10f64.to_radians(), 0.0);
		assert_eq!(phases.len(), 1);
		assert_abs_diff_eq!(phases[0], consts::PI * 10f64.to_radians().sin(), epsilon = 1e-12);
		assert_abs_diff_eq!(phases[0], 0.545, epsilon = 1e-3);
	}

	#[test]
	fn phase_grows_with_elevation_at_zero_azimuth() {
		let array = AntennaArray::two_element(0.1, gps::l1_wavelength_m()).unwrap();
		let mut last = std::f64::NEG_INFINITY;
		for el in 0..90 {
			let p = array.expected_phases((el as f64).to_radians(), 0.0)[0];
			assert!(p >= last, "phase dropped at {} deg", el);
			last = p;
		}
	}

	#[test]
	fn diagonal_baseline_projection() {
		let lambda = 0.2;
		let d = 0.05;
		let array = AntennaArray::square_2x2(d, lambda).unwrap();
		let (el, az) = (40f64.to_radians(), 70f64.to_radians());
		let p = array.expected_phases(el, az);
		let k = 2.0 * consts::PI / lambda;
		assert_abs_diff_eq!(p[0], k * d * az.cos() * el.sin(), epsilon = 1e-12);
		assert_abs_diff_eq!(p[1], k * d * az.sin() * el.sin(), epsilon = 1e-12);
		assert_abs_diff_eq!(p[2], k * d * 2f64.sqrt() * (az + consts::FRAC_PI_4).sin() * el.sin(), epsilon = 1e-12);
	}

	#[test]
	fn layouts_from_config() {
		let cfg = ArrayConfig { layout: ArrayLayout::Square2x2, ..ArrayConfig::default() };
		assert_eq!(cfg.build().unwrap().num_elements(), 4);

		let cfg = ArrayConfig { layout: ArrayLayout::Custom(vec![[0.1, 0.0], [0.0, 0.2]]), spacing_m: None, wavelength_m: 0.19 };
		assert_eq!(cfg.build().unwrap().num_baselines(), 2);

		let cfg = ArrayConfig { spacing_m: Some(-1.0), ..ArrayConfig::default() };
		assert!(cfg.build().is_err());
		assert!(AntennaArray::new(vec![], 0.19).is_err());
	}

}
