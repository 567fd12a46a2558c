//! Subscriber setup shared by the CLI and the daemon.

use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LEVEL: &str = "info";

/// Install the stderr `fmt` subscriber. A second call is a no-op.
///
/// `RUST_LOG` wins; otherwise `LOG_LEVEL` names a level (any case);
/// otherwise `info`.
pub fn init_tracing() {
    let directive = filter_directive(
        std::env::var("RUST_LOG").ok(),
        std::env::var("LOG_LEVEL").ok(),
    );
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn filter_directive(rust_log: Option<String>, log_level: Option<String>) -> String {
    let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
    non_empty(rust_log)
        .or_else(|| non_empty(log_level).map(|level| level.trim().to_ascii_lowercase()))
        .unwrap_or_else(|| DEFAULT_LEVEL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rust_log_wins_over_log_level() {
        let d = filter_directive(Some("tinygen_pipeline=debug".into()), Some("WARN".into()));
        assert_eq!(d, "tinygen_pipeline=debug");
    }

    #[test]
    fn log_level_is_case_insensitive() {
        assert_eq!(filter_directive(None, Some("DEBUG".into())), "debug");
    }

    #[test]
    fn empty_values_count_as_unset() {
        assert_eq!(filter_directive(Some(String::new()), Some(" ".into())), "info");
        assert_eq!(filter_directive(None, None), "info");
    }
}
