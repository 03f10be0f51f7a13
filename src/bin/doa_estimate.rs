
extern crate clap;
extern crate colored;
extern crate ctrlc;
extern crate rust_doa;
extern crate serde_json;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Arg, App};
use colored::*;
use rust_doa::DoaErr;
use rust_doa::config::DoaConfig;
use rust_doa::doa::{DirectionFinder, monopulse, phase_difference};
use rust_doa::io;
use rust_doa::types::SampleSequence;
use rust_doa::utils::{kinematics, logging};
use serde::{Serialize, Deserialize};

/// Raw inter-channel offsets, measured against channel 0
#[derive(Debug, Serialize, Deserialize)]
struct ChannelCalibration {
	pub channel: usize,
	pub sample_delay: isize,
	/// Carrier phase the sample delay alone accounts for
	pub delay_phase_rad: f64,
	pub phase_rad: f64,
}

fn calibrate(channels:&[SampleSequence]) -> Result<Vec<ChannelCalibration>, DoaErr> {
	let reference = channels.first().ok_or(DoaErr::EmptySignal)?;
	channels.iter().enumerate().skip(1).map(|(channel, ch)| {
		let sample_delay = phase_difference::sample_delay(&reference.samples, &ch.samples)?;
		Ok(ChannelCalibration {
			channel,
			sample_delay,
			delay_phase_rad: phase_difference::delay_to_phase(sample_delay, ch.fs, ch.center_freq_hz),
			phase_rad: monopulse::sum_difference_phase(&reference.samples, &ch.samples)?,
		})
	}).collect()
}

fn run(matches:&clap::ArgMatches) -> Result<(), DoaErr> {
	let fname:&str = matches.value_of("filename").ok_or_else(|| DoaErr::InvalidConfig("missing --filename".into()))?;
	let fs:f64 = matches.value_of("sample_rate_sps").unwrap_or("2.046e6").parse()
		.map_err(|_| DoaErr::InvalidConfig("unable to parse --sample_rate_sps".into()))?;
	let opt_center_freq_hz:Option<f64> = match matches.value_of("center_freq_hz") {
		Some(s) => Some(s.parse().map_err(|_| DoaErr::InvalidConfig(format!("unable to parse --center_freq_hz {}", s)))?),
		None => None,
	};
	let opt_max_samples:Option<usize> = match matches.value_of("max_samples") {
		Some(s) => Some(s.parse().map_err(|_| DoaErr::InvalidConfig(format!("unable to parse --max_samples {}", s)))?),
		None => None,
	};

	let mut config = match matches.value_of("config") {
		Some(path) => DoaConfig::from_json_file(path)?,
		None => DoaConfig::default(),
	};
	if let Some(s) = matches.value_of("target_prn") {
		config.target_prn = Some(s.parse().map_err(|_| DoaErr::InvalidConfig(format!("unable to parse --target_prn {}", s)))?);
	}
	if let Some(s) = matches.value_of("max_elevation_deg") {
		let max_el:f64 = s.parse().map_err(|_| DoaErr::InvalidConfig(format!("unable to parse --max_elevation_deg {}", s)))?;
		let bound = kinematics::max_doppler_hz(max_el.to_radians());
		eprintln!("Limiting the Doppler search to +/-{} [Hz]", bound);
		config.acquisition = config.acquisition.with_doppler_bound(bound);
	}

	let mut finder = DirectionFinder::new(config)?;
	let n_channels = finder.array().num_elements();

	eprintln!("Reading {} channels from {} at {} [samples/sec], max_samples={:?}", n_channels, &fname, &fs, &opt_max_samples);
	let mut channels = io::read_channels_from_file(fname, n_channels, fs, opt_max_samples)?;
	if let Some(fc) = opt_center_freq_hz {
		channels = channels.into_iter().map(|ch| ch.with_center_freq(fc)).collect();
	}

	if matches.is_present("calibrate") {
		let cal = calibrate(&finder.prepare(&channels)?)?;
		for c in cal.iter() {
			eprintln!("{}", format!("Channel {}: {} [samples] ({:.4} [radians] of carrier), {:.4} [radians]",
				c.channel, c.sample_delay, c.delay_phase_rad, c.phase_rad).green());
		}
		println!("{}", serde_json::to_string_pretty(&cal).map_err(|e| DoaErr::Io(format!("{}", e)))?);
		return Ok(());
	}

	let cancel = Arc::new(AtomicBool::new(false));
	let handler_flag = cancel.clone();
	ctrlc::set_handler(move || handler_flag.store(true, Ordering::Relaxed)).map_err(|e| DoaErr::Io(format!("{}", e)))?;

	let report = finder.estimate(&channels, Some(cancel.as_ref()))?;
	for (idx, p) in report.phase_differences.iter().enumerate() {
		eprintln!("  Channel {}: {:8.4} [radians] median, {:8.4} mean, {:.4} std over {} peaks", idx+1, p.median_rad, p.mean_rad, p.std_rad, p.matched_peaks);
	}

	let summary = format!("PRN {:02} at {:.1} [Hz], peak/median {:.1}: elevation {:.1} [deg], azimuth {:.1} [deg]",
		report.prn, report.doppler_hz, report.peak_to_median, report.angle.elevation_deg, report.angle.azimuth_deg);
	if report.warnings.is_empty() { eprintln!("{}", summary.green()); }
	else {
		eprintln!("{}", summary.yellow());
		for w in report.warnings.iter() { eprintln!("{}", format!("  {:?}", w).yellow()); }
	}

	// Output data in JSON format
	println!("{}", serde_json::to_string_pretty(&report).map_err(|e| DoaErr::Io(format!("{}", e)))?);
	Ok(())
}

fn main() {

	let matches = App::new("DOA Estimate")
		.version("0.1.0")
		.about("Estimates the direction of arrival of a GPS L1 CA signal from an interleaved multi-antenna i16 capture")
		.arg(Arg::with_name("filename")
			.short("f").long("filename")
			.help("Input filename")
			.required(true).takes_value(true))
		.arg(Arg::with_name("sample_rate_sps")
			.short("s").long("sample_rate_sps")
			.takes_value(true))
		.arg(Arg::with_name("center_freq_hz")
			.long("center_freq_hz")
			.help("RF frequency the capture was tuned to; L1 when absent")
			.takes_value(true))
		.arg(Arg::with_name("config")
			.short("c").long("config")
			.help("JSON configuration file")
			.takes_value(true))
		.arg(Arg::with_name("target_prn")
			.short("p").long("target_prn")
			.takes_value(true))
		.arg(Arg::with_name("max_elevation_deg")
			.long("max_elevation_deg")
			.help("Size the Doppler search for satellites no higher than this")
			.takes_value(true))
		.arg(Arg::with_name("max_samples")
			.short("m").long("max_samples")
			.takes_value(true))
		.arg(Arg::with_name("calibrate")
			.long("calibrate")
			.help("Report inter-channel sample delay and phase instead of estimating a direction"))
		.arg(Arg::with_name("log_level")
			.short("l").long("log_level")
			.takes_value(true)
			.possible_values(&["error", "warn", "info", "debug", "trace"]))
		.get_matches();

	logging::init_tracing(matches.value_of("log_level").unwrap_or("info"));

	if let Err(e) = run(&matches) {
		eprintln!("{}", format!("Error: {}", e).red());
		std::process::exit(1);
	}

}
