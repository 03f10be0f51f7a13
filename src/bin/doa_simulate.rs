
extern crate clap;
extern crate colored;
extern crate ctrlc;
extern crate rust_doa;
extern crate serde_json;

use std::fs::File;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Arg, App};
use colored::*;
use rust_doa::DoaErr;
use rust_doa::config::DoaConfig;
use rust_doa::doa::{DirectionFinder, DoaReport};
use rust_doa::gnss::PrnCodeCache;
use rust_doa::io;
use rust_doa::simulation::{self, ArrayScenario, NoiseModel, SimulatedSatellite};
use rust_doa::utils::logging;

fn parse<T: std::str::FromStr>(matches:&clap::ArgMatches, name:&str) -> Result<Option<T>, DoaErr> {
	match matches.value_of(name) {
		Some(s) => s.parse().map(Some).map_err(|_| DoaErr::InvalidConfig(format!("unable to parse --{} {}", name, s))),
		None => Ok(None),
	}
}

fn run(matches:&clap::ArgMatches) -> Result<DoaReport, DoaErr> {
	let config = match matches.value_of("config") {
		Some(path) => DoaConfig::from_json_file(path)?,
		None => DoaConfig::default(),
	};

	let scenario = match matches.value_of("scenario") {
		Some(path) => {
			let f = File::open(path).map_err(|e| DoaErr::Io(format!("{}: {}", path, e)))?;
			serde_json::from_reader(f).map_err(|e| DoaErr::InvalidConfig(format!("{}", e)))?
		},
		None => {
			let sat = SimulatedSatellite {
				prn:           parse(matches, "prn")?.unwrap_or(13),
				doppler_hz:    parse(matches, "doppler_hz")?.unwrap_or(1000.0),
				elevation_deg: parse(matches, "elevation_deg")?.unwrap_or(10.0),
				azimuth_deg:   parse(matches, "azimuth_deg")?.unwrap_or(0.0),
				..SimulatedSatellite::default()
			};
			ArrayScenario {
				fs:          parse(matches, "sample_rate_sps")?.unwrap_or(2.046e6),
				num_periods: parse(matches, "periods")?.unwrap_or(20),
				satellites:  vec![sat],
				noise:       parse::<f64>(matches, "noise_db")?.map(NoiseModel::awgn_db).unwrap_or_default(),
				seed:        parse(matches, "seed")?.unwrap_or(0),
			}
		}
	};

	let mut finder = DirectionFinder::new(config)?;
	let mut codes = PrnCodeCache::gps_l1_ca();
	let channels = simulation::simulate_array(&scenario, finder.array(), &mut codes)?;
	eprintln!("Simulated {} channels of {} samples at {} [samples/sec]", channels.len(), channels[0].len(), scenario.fs);

	if let Some(path) = matches.value_of("output") {
		let scale:f64 = parse(matches, "scale")?.unwrap_or(1000.0);
		let f = File::create(path).map_err(|e| DoaErr::Io(format!("{}: {}", path, e)))?;
		io::write_channels(f, &channels, scale)?;
		eprintln!("Wrote interleaved i16 capture to {}", path);
	}

	let cancel = Arc::new(AtomicBool::new(false));
	let handler_flag = cancel.clone();
	ctrlc::set_handler(move || handler_flag.store(true, Ordering::Relaxed)).map_err(|e| DoaErr::Io(format!("{}", e)))?;

	finder.estimate(&channels, Some(cancel.as_ref()))
}

fn main() {

	let matches = App::new("DOA Simulation")
		.version("0.1.0")
		.about("Synthesizes a multi-antenna GPS L1 CA capture and estimates the direction of arrival from it")
		.arg(Arg::with_name("config")
			.short("c").long("config")
			.help("JSON configuration file")
			.takes_value(true))
		.arg(Arg::with_name("scenario")
			.long("scenario")
			.help("JSON scenario file; overrides the single-satellite flags")
			.takes_value(true))
		.arg(Arg::with_name("prn")
			.short("p").long("prn")
			.takes_value(true))
		.arg(Arg::with_name("elevation_deg")
			.short("e").long("elevation_deg")
			.takes_value(true))
		.arg(Arg::with_name("azimuth_deg")
			.short("a").long("azimuth_deg")
			.takes_value(true))
		.arg(Arg::with_name("doppler_hz")
			.short("d").long("doppler_hz")
			.takes_value(true))
		.arg(Arg::with_name("noise_db")
			.short("n").long("noise_db")
			.help("Complex AWGN power relative to the signal [dB]")
			.takes_value(true))
		.arg(Arg::with_name("sample_rate_sps")
			.short("s").long("sample_rate_sps")
			.takes_value(true))
		.arg(Arg::with_name("periods")
			.long("periods")
			.help("Capture length in code periods")
			.takes_value(true))
		.arg(Arg::with_name("seed")
			.long("seed")
			.takes_value(true))
		.arg(Arg::with_name("output")
			.short("o").long("output")
			.help("Also write the capture as interleaved i16 IQ")
			.takes_value(true))
		.arg(Arg::with_name("scale")
			.long("scale")
			.help("Multiplier applied before converting samples to i16")
			.takes_value(true))
		.arg(Arg::with_name("log_level")
			.short("l").long("log_level")
			.takes_value(true)
			.possible_values(&["error", "warn", "info", "debug", "trace"]))
		.get_matches();

	logging::init_tracing(matches.value_of("log_level").unwrap_or("info"));

	match run(&matches) {
		Ok(report) => {
			let summary = format!("PRN {:02} at {:.1} [Hz]: elevation {:.1} [deg], azimuth {:.1} [deg]",
				report.prn, report.doppler_hz, report.angle.elevation_deg, report.angle.azimuth_deg);
			if report.warnings.is_empty() { eprintln!("{}", summary.green()); }
			else                          { eprintln!("{}", summary.yellow()); }

			match serde_json::to_string_pretty(&report) {
				Ok(s) => println!("{}", s),
				Err(e) => eprintln!("{}", format!("Unable to serialize report: {}", e).red()),
			}
		},
		Err(e) => {
			eprintln!("{}", format!("Error: {}", e).red());
			std::process::exit(1);
		}
	}

}
