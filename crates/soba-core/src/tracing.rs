use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured stdout tracing. Call once at process startup.
///
/// JSON lines by default; `LOG_FORMAT=pretty` switches to the human-readable
/// formatter for local development. Filtering follows `RUST_LOG` and falls
/// back to `info`.
///
/// Safe to call multiple times; subsequent calls are silently ignored.
pub fn init_tracing() {
    let pretty = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("pretty"));
    let fmt_layer = if pretty {
        fmt::layer().pretty().boxed()
    } else {
        fmt::layer().json().boxed()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .try_init();
}
