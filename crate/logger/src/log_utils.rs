use std::sync::Once;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

pub use tracing::{debug, error, info, trace, warn};

static LOG_INIT: Once = Once::new();

/// Filter applied when neither `RUST_LOG` nor a caller default is given
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` wins when it is set. Otherwise `default_value` is used,
/// falling back to [`DEFAULT_LOG_FILTER`].
/// Logs go to stderr so that command output on stdout stays clean.
pub fn log_init(default_value: Option<&str>) {
    LOG_INIT.call_once(|| {
        if std::env::var("RUST_LOG").is_err() {
            unsafe {
                std::env::set_var("RUST_LOG", default_value.unwrap_or(DEFAULT_LOG_FILTER));
            }
        }

        tracing_setup();
    });
}

/// Build the `RUST_LOG` style filter used by `-d/--debug`:
/// debug for the okms crates, warn for everything else
#[must_use]
pub fn debug_filter() -> String {
    format!("{DEFAULT_LOG_FILTER},okms_cli=debug,okms_client=debug,okms_kmip=debug")
}

fn tracing_setup() {
    let format = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(true)
        .compact();

    let (filter, _reload_handle) =
        tracing_subscriber::reload::Layer::new(EnvFilter::from_default_env());

    // another subscriber may already be installed (tests)
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::{debug_filter, log_init};

    #[test]
    fn test_log_init_is_idempotent() {
        log_init(Some("info"));
        log_init(Some("debug"));
        tracing::info!("logger initialized twice without panicking");
    }

    #[test]
    fn test_debug_filter_targets_okms_crates() {
        let filter = debug_filter();
        assert!(filter.starts_with("warn,"));
        assert!(filter.contains("okms_client=debug"));
        assert!(filter.contains("okms_kmip=debug"));
    }
}
