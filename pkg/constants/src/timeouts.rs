//! Default timeouts and delays, in seconds unless noted.

use std::time::Duration;

/// Fallback power-off delay used whenever `MinEventTimeout` can't be read.
pub const DEFAULT_WAKEUP_POWEROFF_SECS: u64 = 1800;

/// Timeout for the "prepare shutdown" stage when the poweroff was not instant.
pub const PREPARE_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout for the "prepare shutdown" stage when the poweroff was instant.
pub const PREPARE_SHUTDOWN_TIMEOUT_INSTANT: Duration = Duration::from_secs(10);

/// How long the remote-key socket reader waits before reconnecting.
pub const LIRC_RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Poll interval while waiting for an EDID blob or an active output mode.
pub const DRM_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Settle delay between reconfiguring outputs and restarting the frontend.
pub const DRM_SETTLE_DELAY: Duration = Duration::from_millis(500);
