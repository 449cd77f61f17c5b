//! Logging initialisation.
//!
//! Library code logs through the `log` facade; the sync manager also emits
//! `tracing` spans. Both end up in one `tracing-subscriber` registry.
//!
//! `RUST_LOG` takes precedence over the configured level:
//! ```bash
//! RUST_LOG=kubesync::sync=debug kubesync settings.yaml
//! ```

use std::sync::Once;

use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::settings::{LogFormat, SyncSettingsSpec};

static INIT: Once = Once::new();

/// Compact time format: HH:MM:SS.mmm
struct CompactTime;

impl FormatTime for CompactTime {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", chrono::Local::now().format("%H:%M:%S%.3f"))
    }
}

/// Builds the filter, preferring `RUST_LOG` when set.
fn build_filter(level: &str) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        return EnvFilter::from_default_env();
    }
    EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Installs the global subscriber.
///
/// Only the first call takes effect.
pub fn init(level: &str, format: LogFormat) {
    INIT.call_once(|| {
        let filter = build_filter(level);

        if let Err(e) = tracing_log::LogTracer::init() {
            eprintln!("Failed to forward log records: {}", e);
        }

        let result = match format {
            LogFormat::Text => {
                let layer = tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_timer(CompactTime)
                    .with_filter(filter);
                tracing::subscriber::set_global_default(tracing_subscriber::registry().with(layer))
            }
            LogFormat::Json => {
                let layer = tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_filter(filter);
                tracing::subscriber::set_global_default(tracing_subscriber::registry().with(layer))
            }
        };

        if let Err(e) = result {
            eprintln!("Failed to install log subscriber: {}", e);
        }
    });
}

/// Initialises logging from the `logLevel` and `logFormat` settings.
pub fn init_from_settings(spec: &SyncSettingsSpec) {
    init(&spec.log_level, spec.log_format);
}
