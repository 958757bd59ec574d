use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Directory bootstrap ────────────────────────────────────────────────────────

/// Ensure the `~/.hpc-metrics/` directory exists.
///
/// The remote source caches its access token there by default.
pub fn ensure_directories() -> anyhow::Result<()> {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    std::fs::create_dir_all(home.join(".hpc-metrics"))?;
    Ok(())
}

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Initialise the global `tracing` subscriber.
///
/// `log_level` is mapped to a [`tracing_subscriber::EnvFilter`] directive.
/// Falls back to `"info"` if the level string is not recognised.
pub fn setup_logging(log_level: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_new(normalise_level(log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = fmt::layer().with_target(false).with_thread_ids(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(subscriber)
        .init();

    Ok(())
}

/// Map upper-case log-level names to tracing directives (tracing uses
/// lowercase).
fn normalise_level(log_level: &str) -> &'static str {
    match log_level.to_uppercase().as_str() {
        "DEBUG" => "debug",
        "INFO" => "info",
        "WARNING" => "warn",
        "ERROR" => "error",
        _ => "info",
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalise_level_known_names() {
        assert_eq!(normalise_level("DEBUG"), "debug");
        assert_eq!(normalise_level("info"), "info");
        assert_eq!(normalise_level("Warning"), "warn");
        assert_eq!(normalise_level("ERROR"), "error");
    }

    #[test]
    fn test_normalise_level_unknown_falls_back_to_info() {
        assert_eq!(normalise_level("CRITICAL"), "info");
        assert_eq!(normalise_level(""), "info");
    }
}
