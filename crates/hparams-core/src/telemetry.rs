//! Tracing subscriber setup for binaries embedding the engine.
//!
//! Call [`init_tracing`] once at program start. Log lines go to stderr so
//! that command output on stdout stays machine-readable.
//!
//! Only the first call installs a subscriber; later calls are no-ops.

use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// Filter directives scoped to the engine, e.g. `hparams_core=trace`.
pub const ENV_LOG: &str = "HPARAMS_LOG";

/// Install the global subscriber.
///
/// * `json`: emit newline-delimited JSON records instead of text lines.
/// * `level`: verbosity used when neither `RUST_LOG` nor `HPARAMS_LOG`
///   is set.
///
/// `RUST_LOG` wins over `HPARAMS_LOG`, which wins over `level`.
pub fn init_tracing(json: bool, level: Level) {
    let directives = filter_directives(|key| std::env::var(key).ok(), level);
    let env_filter = EnvFilter::try_new(&directives)
        .unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    let output = if json {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .json()
            .boxed()
    } else {
        fmt::layer()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(output.with_filter(env_filter))
        .try_init()
        .ok();
}

/// Pick the filter directives from the environment, falling back to
/// `level`. Blank variables count as unset.
fn filter_directives<F>(lookup: F, level: Level) -> String
where
    F: Fn(&str) -> Option<String>,
{
    ["RUST_LOG", ENV_LOG]
        .into_iter()
        .filter_map(|key| lookup(key))
        .find(|value| !value.trim().is_empty())
        .unwrap_or_else(|| level.as_str().to_lowercase())
}
