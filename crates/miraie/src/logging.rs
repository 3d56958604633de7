//! Logging setup.

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::util::TryInitError;

use crate::config::LoggingConfig;

/// Build the target filter for a logging configuration: the global level plus
/// one directive per override.
pub fn filter(config: &LoggingConfig) -> Targets {
    config.overrides.iter().fold(
        Targets::new().with_default(LevelFilter::from(config.level)),
        |targets, (target, level)| targets.with_target(target.clone(), LevelFilter::from(*level)),
    )
}

/// Install the global tracing subscriber.
///
/// Fails if a global subscriber has already been set.
pub fn init(config: &LoggingConfig) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter(config))
        .try_init()
}
