use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use crate::constants::ENV_LOG_FILTER;
use crate::settings::LoggingSettings;

/// Install the global tracing subscriber.
///
/// `CAAPI_LOG` overrides the configured level with a full filter directive
/// (e.g. `debug,rusqlite_migration=warn`). Calling this more than once keeps
/// the first subscriber.
pub fn init_logging(settings: &LoggingSettings) {
    let filter = build_filter(settings);
    let result = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .try_init();
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

pub(crate) fn build_filter(settings: &LoggingSettings) -> EnvFilter {
    match std::env::var(ENV_LOG_FILTER) {
        Ok(directive) if !directive.trim().is_empty() => EnvFilter::try_new(&directive).unwrap_or_else(|err| {
            eprintln!("invalid {ENV_LOG_FILTER} directive ({err}); using {}", settings.level.as_filter());
            EnvFilter::new(settings.level.as_filter())
        }),
        _ => EnvFilter::new(settings.level.as_filter()),
    }
}
