
use crate::gnss::constants::{SPEED_OF_LIGHT_M_PER_SEC, gps};

/// Largest line-of-sight Doppler expected from a GPS satellite seen no higher than `max_elevation_rad`
/// above the horizon, for a stationary receiver.  Floored to a whole Hz.
pub fn max_doppler_hz(max_elevation_rad:f64) -> f64 {
	let r_earth:f64 = gps::EARTH_RADIUS_M;
	let r_gps:f64 = gps::EARTH_RADIUS_M + gps::ORBIT_ALTITUDE_M;

	// Receiver-to-satellite range, then the angle between the satellite's velocity and the line of sight
	let r_sat:f64 = (r_earth.powi(2) + r_gps.powi(2) - 2.0*r_earth*r_gps*max_elevation_rad.cos()).sqrt();
	let alpha:f64 = std::f64::consts::PI - (max_elevation_rad.sin() * r_gps / r_sat).asin();
	let slant_angle:f64 = alpha - std::f64::consts::FRAC_PI_2;

	(gps::SATELLITE_SPEED_M_PER_SEC * slant_angle.cos() * gps::L1_CARRIER_FREQ_HZ / SPEED_OF_LIGHT_M_PER_SEC).floor()
}

#[cfg(test)]
mod tests {

	use super::*;

	#[test]
	fn doppler_bound_is_a_few_khz() {
		let fd = max_doppler_hz(26.3f64.to_radians());
		assert!(fd > 0.0 && fd < 5000.0, "{}", fd);
		assert_eq!(fd, fd.floor());
	}

}
