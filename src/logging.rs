use thiserror::Error;
use tracing_subscriber::{fmt, EnvFilter};

/// Failure to install the global subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The filter directive did not parse.
    #[error("invalid log filter '{directive}': {source}")]
    Filter {
        /// Directive as given.
        directive: String,
        /// Parser detail.
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },
    /// A global subscriber is already installed.
    #[error("logging already initialized")]
    AlreadyInitialized,
}

/// Installs the global `tracing` subscriber with the given filter directive.
pub fn init_logging(level: &str) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_new(level).map_err(|source| LoggingError::Filter {
        directive: level.to_owned(),
        source,
    })?;
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_directives_are_reported_before_install() {
        let err = init_logging("sombra_procs=loud").unwrap_err();
        assert!(matches!(err, LoggingError::Filter { .. }), "{err}");
        assert!(err.to_string().contains("sombra_procs=loud"));
    }

    #[test]
    fn second_install_is_rejected() {
        let _ = init_logging("warn");
        assert!(matches!(
            init_logging("warn"),
            Err(LoggingError::AlreadyInitialized)
        ));
    }
}
