
use tracing_subscriber::EnvFilter;

/// Installs a stderr `tracing` subscriber.  `RUST_LOG` takes precedence over `default_level` when set.
/// Calling this twice is harmless; the second call is ignored.
pub fn init_tracing(default_level:&str) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

	let _ = tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(std::io::stderr)
		.with_target(false)
		.try_init();
}
