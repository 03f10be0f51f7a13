
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use num_complex::Complex;
use serde::{Serialize, Deserialize};
use tracing::{info, warn};

use crate::{DoaErr, DoaWarning};
use crate::config::DoaConfig;
use crate::gnss::PrnCodeCache;
use crate::gnss::acquisition::{self, AcquisitionConfig, AcquisitionResult};
use crate::types::{AngleEstimate, CorrelationVector, SampleSequence};
use crate::utils;

use self::geometry::AntennaArray;
use self::lookup_table::{LookupTable, LookupTableCache};
use self::phase_difference::PhaseDifference;

pub mod correlation;
pub mod geometry;
pub mod lookup_table;
pub mod monopulse;
pub mod phase_difference;


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoaReport {
	pub angle: AngleEstimate,
	pub prn: usize,
	/// Mean of the per-channel acquisition Dopplers
	pub doppler_hz: f64,
	pub channel_doppler_hz: Vec<f64>,
	/// Reference channel detection statistic
	pub peak_to_median: f64,
	/// One per non-reference channel, relative to channel 0
	pub phase_differences: Vec<PhaseDifference>,
	pub lookup_distance: f64,
	pub monopulse: Option<AngleEstimate>,
	pub warnings: Vec<DoaWarning>,
}

/// Runs the whole chain (acquisition, correlation, phase differences, table lookup) over one capture
/// per array element.  Channel 0 is the reference element.
pub struct DirectionFinder {
	config: DoaConfig,
	array: AntennaArray,
	table: Arc<LookupTable>,
	codes: PrnCodeCache,
}

impl DirectionFinder {

	pub fn new(config:DoaConfig) -> Result<Self, DoaErr> {
		Self::with_table_cache(config, &mut LookupTableCache::new())
	}

	/// Like `new`, but borrows the lookup table from `tables` when an identical one was built before
	pub fn with_table_cache(config:DoaConfig, tables:&mut LookupTableCache) -> Result<Self, DoaErr> {
		config.validate()?;
		let array = config.array.build()?;
		let table = tables.get(&array, &config.lookup)?;
		Ok(Self { config, array, table, codes: PrnCodeCache::gps_l1_ca() })
	}

	pub fn config(&self) -> &DoaConfig { &self.config }
	pub fn array(&self) -> &AntennaArray { &self.array }
	pub fn table(&self) -> &LookupTable { &self.table }

	/// Checks channel count, lengths and rates, then tunes, filters, trims and calibrates
	pub fn prepare(&self, channels:&[SampleSequence]) -> Result<Vec<SampleSequence>, DoaErr> {
		if channels.len() != self.array.num_elements() {
			return Err(DoaErr::LengthMismatch{ expected: self.array.num_elements(), actual: channels.len() });
		}

		let reference = &channels[0];
		if reference.is_empty() { return Err(DoaErr::EmptySignal); }
		for ch in channels.iter() {
			if ch.len() != reference.len() {
				return Err(DoaErr::LengthMismatch{ expected: reference.len(), actual: ch.len() });
			}
			if ch.fs != reference.fs {
				return Err(DoaErr::InvalidConfig(format!("channel sample rates differ ({} vs {})", ch.fs, reference.fs)));
			}
		}

		let mut lowpass = match &self.config.lowpass {
			Some(lp) => Some(lp.build(reference.fs)?),
			None => None,
		};

		channels.iter().enumerate().map(|(idx, ch)| {
			let tuned = if self.config.tune_to_l1 { ch.tuned_to_l1() } else { ch.clone() };
			let filtered = match lowpass.as_mut() {
				Some(fir) => SampleSequence { samples: fir.filter_aligned(&tuned.samples), ..tuned },
				None => tuned,
			};
			let trimmed = filtered.trim_leading(self.config.trim_leading_sec)?;
			let calibration = if idx == 0 { None } else { self.config.phase_calibration_rad.get(idx - 1) };
			match calibration {
				Some(phase) => Ok(SampleSequence { samples: utils::impose_phase(&trimmed.samples, *phase), ..trimmed }),
				None => Ok(trimmed),
			}
		}).collect()
	}

	/// Acquires on the reference channel, then confirms the same PRN on every other channel.  Returns the
	/// reference result and each channel's Doppler.
	pub fn acquire(&mut self, channels:&[SampleSequence], cancel:Option<&AtomicBool>) -> Result<(AcquisitionResult, Vec<f64>), DoaErr> {
		let reference = channels.first().ok_or(DoaErr::EmptySignal)?;

		let mut search:AcquisitionConfig = self.config.acquisition.clone();
		if let Some(prn) = self.config.target_prn { search.prns = vec![prn]; }
		let result = acquisition::acquire(reference, &search, &mut self.codes, cancel)?;

		let confirm = AcquisitionConfig { prns: vec![result.prn], ..search };
		let mut dopplers:Vec<f64> = vec![result.doppler_hz];
		for ch in channels.iter().skip(1) {
			dopplers.push(acquisition::acquire(ch, &confirm, &mut self.codes, cancel)?.doppler_hz);
		}

		Ok((result, dopplers))
	}

	pub fn estimate(&mut self, channels:&[SampleSequence], cancel:Option<&AtomicBool>) -> Result<DoaReport, DoaErr> {
		let channels = self.prepare(channels)?;
		let (acq, channel_doppler_hz) = self.acquire(&channels, cancel)?;
		let doppler_hz = utils::mean(&channel_doppler_hz).ok_or(DoaErr::EmptySignal)?;

		let corrs = correlation::extract_all(&channels, acq.prn, doppler_hz, self.config.correlation.code_periods, &mut self.codes)?;
		let phase_differences:Vec<PhaseDifference> = corrs.iter().skip(1)
			.map(|other| phase_difference::estimate(&corrs[0], other, &self.config.phase))
			.collect::<Result<Vec<_>, DoaErr>>()?;

		let observed:Vec<f64> = phase_differences.iter().map(|p| p.median_rad).collect();
		let resolution = self.table.resolve(&observed)?;

		let mut warnings:Vec<DoaWarning> = resolution.warning.into_iter().collect();
		let monopulse = if self.config.monopulse && self.array.num_elements() == 4 {
			match self.monopulse_from_peaks(&corrs) {
				Ok(angle) => Some(angle),
				Err(e) => {
					warn!(error = %e, "monopulse estimate unavailable");
					warnings.push(DoaWarning::MonopulseUnavailable(format!("{}", e)));
					None
				}
			}
		} else { None };

		info!(prn = acq.prn, doppler_hz, elevation_deg = resolution.angle.elevation_deg, azimuth_deg = resolution.angle.azimuth_deg, "direction of arrival estimated");

		Ok(DoaReport {
			angle: resolution.angle,
			prn: acq.prn,
			doppler_hz,
			channel_doppler_hz,
			peak_to_median: acq.peak_to_median,
			phase_differences,
			lookup_distance: resolution.distance,
			monopulse,
			warnings,
		})
	}

	/// Monopulse over the correlation values at the reference channel's peaks
	fn monopulse_from_peaks(&self, corrs:&[CorrelationVector]) -> Result<AngleEstimate, DoaErr> {
		let ref_norm = phase_difference::normalized_magnitudes(&corrs[0])?;
		let peaks = phase_difference::find_peaks(&ref_norm, self.config.phase.peak_threshold, self.config.phase.match_window);
		if peaks.is_empty() { return Err(DoaErr::InsufficientPeaks); }

		// Conjugate to undo the conjugated input side of the correlation
		let at_peaks:Vec<Vec<Complex<f64>>> = corrs.iter()
			.map(|c| peaks.iter().map(|i| c.values[*i].conj()).collect())
			.collect();

		// Elements 2 and 3 are the north row, 0 and 2 the west column
		monopulse::monopulse(&[&at_peaks[2][..], &at_peaks[3][..], &at_peaks[0][..], &at_peaks[1][..]])
	}

}
