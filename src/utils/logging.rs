/// Initialize tracing output for the library.
///
/// `RUST_LOG` takes precedence; without it only audiopipe's own info-level
/// spans are shown. Repeated initialization is a no-op.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "audiopipe=info".into());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
