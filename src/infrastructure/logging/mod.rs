// Logging module - Logging infrastructure
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use std::io;

/// Default filter directive for a log level name
pub fn default_directive(level: &str, verbose: bool) -> String {
    let level = if verbose { "debug" } else { level };
    format!("analyzersim={},warn", level)
}

/// Initialize logging system
///
/// `RUST_LOG` overrides the configured level. Safe to call more than once;
/// later calls leave the first subscriber in place.
pub fn init_logging(level: &str, verbose: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive(level, verbose))?,
    };

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(true)
                .with_level(true)
                .with_thread_ids(true)
        )
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("AnalyzerSim logging system initialized");
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_init_is_repeatable() {
        assert!(init_logging("info", false).is_ok());
        assert!(init_logging("debug", true).is_ok());
    }

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive("info", false), "analyzersim=info,warn");
        assert_eq!(default_directive("info", true), "analyzersim=debug,warn");
    }
}
