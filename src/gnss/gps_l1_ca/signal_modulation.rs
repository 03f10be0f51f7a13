
use num_complex::Complex;

use crate::DoaErr;
use crate::gnss::CodeGenerator;
use crate::gnss::constants::gps;

/// Generator for the GPS L1 C/A Gold code family, including the SBAS codes at PRN 120-138
#[derive(Debug, Clone, Copy, Default)]
pub struct GpsL1Ca;

impl CodeGenerator for GpsL1Ca {

	fn sampled(&self, prn:usize, fs:f64) -> Result<Vec<i8>, DoaErr> { prn_int_sampled(prn, fs) }

}

// Runs a 10-stage register in bipolar form, where -1 stands for a logical one.  Multiplying bipolar
// values is the same as XOR-ing the logical ones, so the feedback is a product over the taps.
fn lfsr_sequence(taps:&[usize]) -> [i8; gps::CODE_LENGTH] {
	let mut reg:[i8; 10] = [-1; 10];
	let mut out:[i8; gps::CODE_LENGTH] = [0; gps::CODE_LENGTH];

	for chip in out.iter_mut() {
		*chip = reg[9];
		let feedback:i8 = taps.iter().map(|t| reg[*t]).product();
		for k in (1..10).rev() { reg[k] = reg[k-1]; }
		reg[0] = feedback;
	}

	out
}

/// One period of the C/A code as +1/-1 chips, with +1 for a logical one
pub fn prn_int(prn:usize) -> Result<Vec<i8>, DoaErr> {
	let shift:usize = gps::g2_shift(prn).ok_or(DoaErr::InvalidPrn(prn))?;

	// G1 = 1 + x^3 + x^10, G2 = 1 + x^2 + x^3 + x^6 + x^8 + x^9 + x^10
	let g1 = lfsr_sequence(&[2, 9]);
	let g2 = lfsr_sequence(&[1, 2, 5, 7, 8, 9]);

	Ok((0..gps::CODE_LENGTH).map(|i| {
		let g2_delayed = g2[(i + gps::CODE_LENGTH - shift) % gps::CODE_LENGTH];
		-(g1[i] * g2_delayed)
	}).collect())
}

/// Index of the chip that covers each sample of one code period at `fs`.  The final sample always maps
/// to the final chip so rounding can't run past the end of the code.
pub fn sample_chip_indices(fs:f64) -> Result<Vec<usize>, DoaErr> {
	if !(fs.is_finite() && fs > 0.0) {
		return Err(DoaErr::InvalidConfig(format!("sample rate must be positive, got {}", fs)));
	}

	let samples_per_code:usize = (fs * gps::CODE_PERIOD_SEC).round() as usize;
	if samples_per_code == 0 {
		return Err(DoaErr::InvalidConfig(format!("sample rate {} is too low to hold one code period", fs)));
	}

	let mut idx:Vec<usize> = (0..samples_per_code).map(|i| {
		let chip_time:f64 = ((i+1) as f64) * gps::CHIP_RATE_HZ / fs;
		let code_value_idx:usize = (chip_time.ceil() as usize).saturating_sub(1);
		code_value_idx.min(gps::CODE_LENGTH - 1)
	}).collect();

	if let Some(last) = idx.last_mut() { *last = gps::CODE_LENGTH - 1; }
	Ok(idx)
}

pub fn prn_int_sampled(prn:usize, fs:f64) -> Result<Vec<i8>, DoaErr> {
	let code = prn_int(prn)?;
	Ok(sample_chip_indices(fs)?.into_iter().map(|i| code[i]).collect())
}

pub fn prn_complex(prn:usize) -> Result<Vec<Complex<f64>>, DoaErr> {
	Ok(prn_int(prn)?.into_iter().map(|x| Complex{ re: x as f64, im: 0.0 }).collect())
}
