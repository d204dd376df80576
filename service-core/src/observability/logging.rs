use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the global subscriber. `RUST_LOG` wins over `log_level` when set.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing(service_name: &str, log_level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_file(true)
        .with_line_number(true);

    let result = if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.json().flatten_event(true))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer.pretty())
            .try_init()
    };

    match result {
        Ok(()) => tracing::info!(service = service_name, log_level, "Tracing initialized"),
        Err(e) => eprintln!(
            "Tracing for service '{}' was already initialized: {}",
            service_name, e
        ),
    }
}
