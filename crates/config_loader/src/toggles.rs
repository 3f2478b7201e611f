//! Process-wide toggles read from the environment.

use contracts::ProcessToggles;
use tracing::debug;

/// Disables timestamp matching; every raw capture is published as-is
pub const DISABLE_SYNCHRONIZATION_VAR: &str = "DEPTHSYNC_DISABLE_SYNCHRONIZATION";

/// Enables per-sample timestamp logging
pub const LOG_TIMESTAMPS_VAR: &str = "DEPTHSYNC_LOG_TIMESTAMPS";

/// Read the toggles from the process environment
pub fn toggles_from_env() -> ProcessToggles {
    toggles_from_lookup(|key| std::env::var(key).ok())
}

/// Read the toggles through an arbitrary variable lookup
pub fn toggles_from_lookup<F>(lookup: F) -> ProcessToggles
where
    F: Fn(&str) -> Option<String>,
{
    let toggles = ProcessToggles {
        disable_synchronization: lookup(DISABLE_SYNCHRONIZATION_VAR)
            .is_some_and(|value| is_truthy(&value)),
        log_timestamps: lookup(LOG_TIMESTAMPS_VAR).is_some_and(|value| is_truthy(&value)),
    };
    debug!(?toggles, "process toggles loaded");
    toggles
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
