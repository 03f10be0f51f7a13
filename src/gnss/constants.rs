
pub const SPEED_OF_LIGHT_M_PER_SEC:f64 = 299792458.0;

pub mod gps {

	pub const L1_CARRIER_FREQ_HZ:f64 = 1575.42e6;
	pub const CHIP_RATE_HZ:f64 = 1.023e6;
	pub const SEC_PER_CHIP:f64 = 1.0 / CHIP_RATE_HZ;
	pub const CODE_LENGTH:usize = 1023;
	pub const CODE_PERIOD_SEC:f64 = (CODE_LENGTH as f64) / CHIP_RATE_HZ;

	pub fn l1_wavelength_m() -> f64 { super::SPEED_OF_LIGHT_M_PER_SEC / L1_CARRIER_FREQ_HZ }

	// G2 delay in chips; GPS PRN n uses entry n - 1, SBAS PRN n uses entry n - 88
	pub const G2_SHIFT:[usize; 51] = [
		5, 6, 7, 8, 17, 18, 139, 140, 141, 251, 252, 254, 255, 256, 257, 258,
		469, 470, 471, 472, 473, 474, 509, 512, 513, 514, 515, 516, 859, 860, 861, 862,
		// SBAS (WAAS, EGNOS, ...) PRN 120-138
		145, 175, 52, 21, 237, 235, 886, 657, 634, 762, 355, 1012, 176, 603, 130, 359, 595, 68, 386];

	pub fn g2_shift(prn:usize) -> Option<usize> {
		match prn {
			1..=32    => Some(G2_SHIFT[prn - 1]),
			120..=138 => Some(G2_SHIFT[prn - 88]),
			_         => None,
		}
	}

	/// Nominal satellite and orbit figures used to bound the Doppler search
	pub const EARTH_RADIUS_M:f64 = 6378e3;
	pub const ORBIT_ALTITUDE_M:f64 = 20200e3;
	pub const SATELLITE_SPEED_M_PER_SEC:f64 = 929.0;

}
