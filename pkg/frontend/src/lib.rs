//! The `Frontend` capability trait and its two leaf variants: `Dummy` and
//! `UnitTracker` (service-unit tracker). The VDR-managed variant lives in
//! `pkg-controller`, since it needs a back-handle to the outer Controller.

pub mod dummy;
pub mod unit;

use std::time::Duration;

use async_trait::async_trait;

pub use dummy::Dummy;
pub use unit::UnitTracker;

/// Discriminant mirrored onto the D-Bus/log surface; does not carry data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendKind {
    Dummy,
    Unit,
    App,
    Vdr,
}

/// Notified when a frontend transitions to stopped, so the owner (normally
/// the Controller, sometimes the VDR subcontroller) can react. Takes the
/// caller's name rather than a strong reference to avoid an owner<->frontend
/// reference cycle.
#[async_trait]
pub trait StoppedSink: Send + Sync {
    async fn on_stopped(&self, caller_name: &str);
}

/// A frontend: something that can own the primary display, audio, and remote
/// control. `start`/`stop` are not assumed idempotent by this trait; callers
/// are expected to check `is_running` first where that matters.
#[async_trait]
pub trait Frontend: Send + Sync {
    fn name(&self) -> &str;
    fn kind(&self) -> FrontendKind;
    fn stop_on_shutdown(&self) -> bool;
    fn instant_shutdown_timeout(&self) -> Duration;
    fn prepare_shutdown_timeout(&self) -> Duration;

    async fn start(&self) -> anyhow::Result<()>;
    async fn stop(&self) -> anyhow::Result<()>;
    async fn is_running(&self) -> bool;
    /// Restores startup state to its initial phase. A no-op for variants
    /// without a multi-phase startup state machine.
    async fn reset(&self);
}

pub const DEFAULT_INSTANT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(0);
pub const DEFAULT_PREPARE_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(0);
