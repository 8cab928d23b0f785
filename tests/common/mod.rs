use once_cell::sync::Lazy;
use tracing_subscriber::EnvFilter;

static TRACING: Lazy<()> = Lazy::new(|| {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
});

/// Routes crate events to the test output; filter with `RUST_LOG`
pub fn init_tracing() {
    Lazy::force(&TRACING);
}
