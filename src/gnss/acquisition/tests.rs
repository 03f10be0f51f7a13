
use std::sync::atomic::AtomicBool;

use num_complex::Complex;
use rand::SeedableRng;
use rand::rngs::StdRng;

use super::*;
use crate::simulation::{self, NoiseModel};

const FS:f64 = 2.046e6;

fn small_config(prns:Vec<usize>) -> AcquisitionConfig {
	AcquisitionConfig { prns, doppler_min_hz: 0.0, doppler_max_hz: 3000.0, doppler_step_hz: 500.0, ..AcquisitionConfig::default() }
}

fn noisy_prn(prn:usize, doppler_hz:f64, seed:u64) -> SampleSequence {
	let mut codes = PrnCodeCache::gps_l1_ca();
	let clean = simulation::clean_signal(&mut codes, prn, FS, 10, false).unwrap();
	let shifted = simulation::apply_doppler(&simulation::apply_code_offset(&clean, 517), doppler_hz, FS);
	let mut rng = StdRng::seed_from_u64(seed);
	let noisy = simulation::add_noise(&shifted, &NoiseModel::awgn_db(6.0), &mut rng).unwrap();
	SampleSequence::new(noisy, FS).unwrap()
}

#[test]
fn doppler_bins_include_max() {
	let cfg = AcquisitionConfig { doppler_min_hz: -1000.0, doppler_max_hz: 1000.0, doppler_step_hz: 500.0, ..AcquisitionConfig::default() };
	assert_eq!(cfg.doppler_bins().unwrap(), vec![-1000.0, -500.0, 0.0, 500.0, 1000.0]);

	let cfg = AcquisitionConfig { doppler_min_hz: 0.0, doppler_max_hz: 900.0, doppler_step_hz: 400.0, ..AcquisitionConfig::default() };
	assert_eq!(cfg.doppler_bins().unwrap(), vec![0.0, 400.0, 800.0]);

	let cfg = AcquisitionConfig { doppler_step_hz: 0.0, ..AcquisitionConfig::default() };
	assert!(cfg.doppler_bins().is_err());
}

#[test]
fn prn_set_is_sorted_and_unique() {
	let cfg = small_config(vec![22, 3, 13, 3]);
	assert_eq!(cfg.prn_set(), vec![3, 13, 22]);
}

#[test]
fn finds_prn_and_doppler_in_noise() {
	let signal = noisy_prn(13, 1500.0, 7);
	let mut codes = PrnCodeCache::gps_l1_ca();
	let result = acquire(&signal, &small_config(vec![1, 13, 22]), &mut codes, None).unwrap();

	assert_eq!(result.prn, 13);
	assert_eq!(result.doppler_hz, 1500.0);
	assert!(result.peak_to_median > 20.0, "{}", result.peak_to_median);
}

#[test]
fn pure_noise_is_not_a_detection() {
	let mut rng = StdRng::seed_from_u64(99);
	let silence = vec![Complex{ re: 0.0, im: 0.0 }; 10 * 2046];
	let noise = simulation::add_noise(&silence, &NoiseModel::awgn_db(0.0), &mut rng).unwrap();
	let signal = SampleSequence::new(noise, FS).unwrap();

	let mut codes = PrnCodeCache::gps_l1_ca();
	match acquire(&signal, &small_config(vec![1, 13, 22]), &mut codes, None) {
		Err(DoaErr::AcquisitionFailed{ best_ratio, threshold }) => {
			assert!(best_ratio < threshold);
			assert_eq!(threshold, 6.0);
		},
		other => panic!("expected AcquisitionFailed, got {:?}", other),
	}
}

#[test]
fn grid_comes_back_in_search_order() {
	let signal = noisy_prn(22, 0.0, 1);
	let mut codes = PrnCodeCache::gps_l1_ca();
	let cfg = small_config(vec![22, 5]);
	let scores = search_grid(&signal, &cfg, &mut codes, None).unwrap();

	assert_eq!(scores.len(), 2 * 7);
	assert_eq!(scores[0].prn, 5);
	assert_eq!(scores[7].prn, 22);
	assert!(scores[..7].windows(2).all(|w| w[0].doppler_hz < w[1].doppler_hz));
}

#[test]
fn ties_go_to_first_hypothesis() {
	let mk = |prn, doppler_hz, peak_to_median| HypothesisScore{ prn, doppler_hz, peak_to_median, peak_lag: 0 };
	let scores = vec![mk(2, -500.0, 9.0), mk(2, 0.0, 12.0), mk(7, -500.0, 12.0), mk(9, 0.0, 11.0)];
	let best = select_best(&scores).unwrap();
	assert_eq!((best.prn, best.doppler_hz), (2, 0.0));
	assert!(select_best(&[]).is_none());
}

#[test]
fn cancellation_stops_the_search() {
	let signal = noisy_prn(13, 0.0, 2);
	let mut codes = PrnCodeCache::gps_l1_ca();
	let flag = AtomicBool::new(true);
	assert_eq!(acquire(&signal, &small_config(vec![13]), &mut codes, Some(&flag)).unwrap_err(), DoaErr::Cancelled);
}

#[test]
fn invalid_prn_is_reported() {
	let signal = noisy_prn(13, 0.0, 3);
	let mut codes = PrnCodeCache::gps_l1_ca();
	assert_eq!(acquire(&signal, &small_config(vec![13, 40]), &mut codes, None).unwrap_err(), DoaErr::InvalidPrn(40));
}
