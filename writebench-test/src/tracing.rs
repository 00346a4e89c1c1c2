use tracing_subscriber::EnvFilter;

/// Crates whose logs are captured at maximum verbosity.
const CRATE_NAMES: &[&str] = &["writebench", "writebench_storage"];

/// Initialize the logger for testing.
///
/// Logs go to the test runner's captured stdout, so they only show up for failing tests. By
/// default, only the benchmark crates log at `TRACE` and everything else at `ERROR`. Setting
/// `RUST_LOG` replaces this filter entirely.
///
/// Calling this more than once is fine; only the first call installs a subscriber.
///
/// # Example
///
/// ```
/// writebench_test::tracing::init();
/// ```
pub fn init() {
    let env_filter = match std::env::var(EnvFilter::DEFAULT_ENV) {
        Ok(value) => EnvFilter::new(value),
        Err(_) => CRATE_NAMES
            .iter()
            .fold(EnvFilter::new("ERROR"), |filter, name| {
                filter.add_directive(format!("{name}=TRACE").parse().unwrap())
            }),
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_test_writer()
        .compact()
        .try_init()
        .ok();
}
