//! The VDR-managed frontend. Wraps a `DBus2Vdr` proxy bundle, tracks VDR's
//! own startup/ready/stop lifecycle signals, resolves the frontend VDR is
//! currently driving, and mediates shutdown requests back up to the owning
//! `Controller` via a weak back-handle (VDR and Controller would otherwise
//! form a reference cycle).

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use pkg_frontend::{Frontend, FrontendKind, StoppedSink};
use pkg_ipc::vdr::DBus2Vdr;
use pkg_types::config::{AttachOnStartup, BackgroundKind, VdrConfig};
use tokio::sync::Mutex;

use crate::factory::{FactoryContext, FrontendFactory};
use crate::shutdown::{DelayedRepeatableTask, ShutdownHandler};
use crate::Controller;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StartupState {
    Prepare,
    Regular,
}

/// Why VDR's process came up. Decides whether the unattended power-off guard
/// gets armed during `Prepare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartType {
    ManualStart,
    VdrWakeup,
    OtherWakeup,
    Unknown,
}

pub struct VdrSubcontroller {
    id: u32,
    name: String,
    config: VdrConfig,
    dbus2vdr: DBus2Vdr<'static>,
    controller: Weak<Controller>,
    factory: Arc<FrontendFactory>,
    ctx: Arc<FactoryContext>,
    inner: Mutex<Option<Arc<dyn Frontend>>>,
    startup_state: Mutex<StartupState>,
    poweroff_guard: DelayedRepeatableTask,
    has_cec: AtomicBool,
    send_dlic: AtomicBool,
    vdr_stopping: AtomicBool,
}

impl VdrSubcontroller {
    pub async fn new(
        connection: zbus::Connection,
        config: VdrConfig,
        controller: Weak<Controller>,
        factory: Arc<FrontendFactory>,
        ctx: Arc<FactoryContext>,
    ) -> anyhow::Result<Arc<Self>> {
        let id = config.id;
        let dbus2vdr = DBus2Vdr::connect(connection, id).await?;
        let this = Arc::new(Self {
            id,
            name: "vdr".to_string(),
            config,
            dbus2vdr,
            controller,
            factory,
            ctx,
            inner: Mutex::new(None),
            startup_state: Mutex::new(StartupState::Prepare),
            poweroff_guard: DelayedRepeatableTask::new(),
            has_cec: AtomicBool::new(false),
            send_dlic: AtomicBool::new(false),
            vdr_stopping: AtomicBool::new(false),
        });
        Ok(this)
    }

    /// Spawns the three background signal watchers: VDR ready, VDR stop, and
    /// its bus owner disappearing out from under us.
    pub fn spawn_watchers(self: &Arc<Self>) {
        self.spawn_ready_watcher();
        self.spawn_stop_watcher();
        self.spawn_name_owner_watcher();
    }

    fn spawn_ready_watcher(self: &Arc<Self>) {
        let this = self.clone();
        tokio::spawn(async move {
            let Ok(mut ready) = this.dbus2vdr.vdr_state.receive_ready().await else {
                return;
            };
            while let Some(signal) = ready.next().await {
                if let Ok(args) = signal.args() {
                    if args.instanceid as u32 == this.id {
                        this.on_vdr_ready().await;
                    }
                }
            }
        });
    }

    fn spawn_stop_watcher(self: &Arc<Self>) {
        let this = self.clone();
        tokio::spawn(async move {
            let Ok(mut stop) = this.dbus2vdr.vdr_state.receive_stop().await else {
                return;
            };
            while let Some(signal) = stop.next().await {
                if let Ok(args) = signal.args() {
                    if args.instanceid as u32 == this.id {
                        this.vdr_stopping.store(true, Ordering::SeqCst);
                        this.on_stopped(&this.name).await;
                    }
                }
            }
        });
    }

    fn spawn_name_owner_watcher(self: &Arc<Self>) {
        let this = self.clone();
        let service_name = this.dbus2vdr.service_name.clone();
        tokio::spawn(async move {
            let Ok(dbus) = zbus::fdo::DBusProxy::new(&this.dbus2vdr.connection).await else {
                return;
            };
            let Ok(mut changed) = dbus.receive_name_owner_changed().await else {
                return;
            };
            while let Some(signal) = changed.next().await {
                let Ok(args) = signal.args() else { continue };
                if args.name.as_str() == service_name && args.new_owner.is_none() {
                    tracing::warn!(vdr_id = this.id, "vdr dropped off the bus");
                    this.vdr_stopping.store(true, Ordering::SeqCst);
                    this.on_stopped(&this.name).await;
                }
            }
        });
    }

    /// Only acts while this subcontroller is the Controller's current
    /// frontend; otherwise VDR becoming ready isn't this process's concern.
    async fn on_vdr_ready(&self) {
        tracing::info!(vdr_id = self.id, "vdr reported ready");
        self.vdr_stopping.store(false, Ordering::SeqCst);
        let Some(controller) = self.controller.upgrade() else {
            return;
        };
        if controller.current_frontend_name().await != self.name {
            return;
        }
        self.load_frontend().await;
        let has_frontend = self.inner.lock().await.is_some();
        if has_frontend && controller.current_frontend_name().await == self.name {
            if let Err(err) = self.start().await {
                tracing::warn!(%err, "vdr subcontroller restart failed");
            }
        } else {
            self.disable_remote().await;
        }
    }

    /// Scans VDR's plugin list for the frontend it is currently driving,
    /// resolving the first configured match. Leaves the inner frontend
    /// unset (and logs) if none match; does not start whatever it resolves.
    async fn load_frontend(&self) {
        let plugin_name = match self.dbus2vdr.device.get_primary().await {
            Ok((_index, _null_index, _is_primary, _has_decoder, name)) => name,
            Err(err) => {
                tracing::warn!(%err, "could not query vdr primary device");
                String::new()
            }
        };

        tracing::debug!(vdr_id = self.id, plugin_name, "vdr primary device plugin");

        let plugins = self.dbus2vdr.plugin_manager.list().await.unwrap_or_default();
        let has_cec = plugins.iter().any(|(name, _version)| name == "cecremote");
        self.has_cec.store(has_cec, Ordering::SeqCst);
        let send_dlic = plugins.iter().any(|(name, _version)| name == "skindesigner");
        self.send_dlic.store(send_dlic, Ordering::SeqCst);

        let matched = plugins
            .iter()
            .map(|(name, _version)| name.as_str())
            .find(|name| self.config.frontends.contains_key(*name));

        let resolved = match matched.and_then(|name| self.config.frontends.get(name)) {
            Some(cfg) => self
                .factory
                .resolve(cfg, &self.ctx, self.as_stopped_sink())
                .await
                .ok(),
            None => None,
        };

        if resolved.is_none() {
            tracing::warn!(vdr_id = self.id, "no configured frontend matches vdr's active plugins");
        }
        *self.inner.lock().await = resolved;
    }

    /// Forwards the vdr-driven inner frontend's stop notifications straight
    /// to the Controller, bypassing `VdrSubcontroller::on_stopped` (which is
    /// reserved for VDR's own stop/name-owner signals).
    fn as_stopped_sink(&self) -> Arc<dyn StoppedSink> {
        struct Forward(Weak<Controller>);
        #[async_trait]
        impl StoppedSink for Forward {
            async fn on_stopped(&self, caller_name: &str) {
                if let Some(controller) = self.0.upgrade() {
                    controller.on_stopped(caller_name).await;
                }
            }
        }
        Arc::new(Forward(self.controller.clone()))
    }

    pub async fn enable_remote(&self) {
        if let Err(err) = self.dbus2vdr.remote.enable().await {
            tracing::warn!(%err, "vdr remote enable failed");
        }
        if self.has_cec.load(Ordering::SeqCst) {
            if let Err(err) = self.dbus2vdr.svdrp_command("cecremote", "CONN", "").await {
                tracing::debug!(%err, "cecremote CONN failed");
            }
        }
    }

    pub async fn disable_remote(&self) {
        if self.has_cec.load(Ordering::SeqCst) {
            if let Err(err) = self.dbus2vdr.svdrp_command("cecremote", "DISC", "").await {
                tracing::debug!(%err, "cecremote DISC failed");
            }
        }
        if let Err(err) = self.dbus2vdr.remote.disable().await {
            tracing::warn!(%err, "vdr remote disable failed");
        }
    }

    /// Asks VDR to confirm it can shut down, then synthesizes a `Power`
    /// remote keypress if it agrees. Idempotent: always returns `true` so
    /// callers can treat it as fire-and-forget.
    pub async fn attempt_shutdown(&self) -> bool {
        match self.dbus2vdr.shutdown.confirm_shutdown(true).await {
            Ok((code, message, _retry, _info)) if code == 250 => {
                tracing::info!("vdr confirmed shutdown: {message}");
                self.enable_remote().await;
                if let Err(err) = self.dbus2vdr.remote.hit_key("Power").await {
                    tracing::warn!(%err, "could not send Power key to vdr");
                }
                self.disable_remote().await;
            }
            Ok((code, message, _retry, _info)) => {
                tracing::debug!(code, %message, "vdr declined shutdown");
            }
            Err(err) => {
                tracing::warn!(%err, "confirm_shutdown call failed");
            }
        }
        true
    }

    /// Classifies why VDR's process is currently up, by comparing the
    /// persisted wakeup timestamp against VDR's own `NextWakeupTime`.
    pub async fn start_type(&self) -> StartType {
        if let Ok(true) = self.dbus2vdr.shutdown.manual_start().await {
            return StartType::ManualStart;
        }
        let recorded = read_wakeup_ts(&self.config.wakeup_ts_file);
        match (recorded, self.dbus2vdr.shutdown.next_wakeup_time().await) {
            (Some(recorded), Ok((next, _channel))) => {
                let delta = (next - recorded).abs();
                if delta <= self.config.wakeup_delta_seconds {
                    StartType::VdrWakeup
                } else {
                    StartType::OtherWakeup
                }
            }
            _ => StartType::Unknown,
        }
    }

    /// The `Prepare` half of the startup state machine: classifies why
    /// VDR's process is up, arms the unattended power-off guard for an
    /// unexplained wakeup, and decides whether to fall through into
    /// `startup_regular`. Returns `false` if the caller should stop (VDR
    /// not actually ready yet, or the wakeup reason couldn't be classified).
    async fn startup_prepare(&self) -> bool {
        let Ok(status) = self.dbus2vdr.vdr_state.status().await else {
            return false;
        };
        if status != "Ready" {
            return false;
        }

        let start_type = self.start_type().await;
        tracing::info!(vdr_id = self.id, ?start_type, "vdr subcontroller starting");

        if start_type == StartType::OtherWakeup {
            self.arm_poweroff_guard().await;
        }

        if start_type == StartType::Unknown {
            return false;
        }

        {
            let mut state = self.startup_state.lock().await;
            *state = StartupState::Regular;
        }

        let manual = matches!(start_type, StartType::ManualStart);
        let attach = self.config.attach_on_startup;
        if (attach == AttachOnStartup::Auto && !manual) || attach == AttachOnStartup::Never {
            if let Some(controller) = self.controller.upgrade() {
                controller.set_expect_user_activity(true).await;
            }
        }
        true
    }

    /// Arms a one-shot deferred power-off: after the default wakeup window
    /// (the retry interval is always this constant regardless of VDR's own
    /// `MinEventTimeout` setup value; the original tooling read that value
    /// into a never-consulted local, and this preserves the resulting
    /// behavior), asks the outer Controller to start its normal shutdown
    /// pipeline, unless VDR reports the user isn't actually away
    /// (`MinUserInactivity <= 0`).
    async fn arm_poweroff_guard(&self) {
        let _ = self.dbus2vdr.setup.get("MinEventTimeout").await;
        let min_user_inactivity = self
            .dbus2vdr
            .setup
            .get("MinUserInactivity")
            .await
            .ok()
            .and_then(|(value, _, _)| i32::try_from(value).ok())
            .unwrap_or(0);
        if min_user_inactivity <= 0 {
            return;
        }
        let controller = self.controller.clone();
        self.poweroff_guard
            .start(
                Duration::from_secs(pkg_constants::timeouts::DEFAULT_WAKEUP_POWEROFF_SECS),
                move || {
                    let controller = controller.clone();
                    async move {
                        if let Some(controller) = controller.upgrade() {
                            controller.poweroff(true).await;
                        }
                        false
                    }
                },
            )
            .await;
    }

    /// The `Regular` half of the startup state machine: decides whether to
    /// actually start the inner frontend, deferring to
    /// `expect_user_activity` when something upstream (an unattended
    /// wakeup, a `never`-attach policy) wants VDR to sit idle instead.
    async fn startup_regular(&self) {
        let Some(controller) = self.controller.upgrade() else {
            return;
        };
        let inner = self.inner.lock().await.clone();
        let Some(inner) = inner else {
            controller.set_background(BackgroundKind::Normal).await;
            return;
        };
        if controller.expect_user_activity().await {
            controller.set_background(BackgroundKind::Detached).await;
            return;
        }
        controller.set_background(BackgroundKind::Normal).await;
        let user_was_active = self.dbus2vdr.shutdown.is_user_active().await.unwrap_or(true);
        if let Err(err) = inner.start().await {
            tracing::warn!(%err, "vdr-driven frontend failed to start");
        }
        if !user_was_active {
            if let Err(err) = self.dbus2vdr.shutdown.set_user_inactive().await {
                tracing::debug!(%err, "set_user_inactive failed");
            }
        }
        self.enable_remote().await;
    }
}

#[async_trait]
impl ShutdownHandler for VdrSubcontroller {
    async fn attempt_shutdown(&self) -> bool {
        VdrSubcontroller::attempt_shutdown(self).await
    }
}

fn read_wakeup_ts(path: &PathBuf) -> Option<i64> {
    let contents = std::fs::read_to_string(path).ok()?;
    contents.trim().parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn read_wakeup_ts_missing_file_is_none() {
        let path = PathBuf::from("/tmp/does-not-exist-vdr-wakeup-ts-test");
        assert_eq!(read_wakeup_ts(&path), None);
    }

    #[test]
    fn read_wakeup_ts_parses_trimmed_integer() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "  1700000000  ").unwrap();
        assert_eq!(read_wakeup_ts(&file.path().to_path_buf()), Some(1_700_000_000));
    }

    #[test]
    fn read_wakeup_ts_rejects_garbage() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not-a-number").unwrap();
        assert_eq!(read_wakeup_ts(&file.path().to_path_buf()), None);
    }

    #[test]
    fn start_type_variants_are_distinct() {
        assert_ne!(StartType::ManualStart, StartType::VdrWakeup);
        assert_ne!(StartType::VdrWakeup, StartType::OtherWakeup);
        assert_ne!(StartType::OtherWakeup, StartType::Unknown);
    }
}

#[async_trait]
impl StoppedSink for VdrSubcontroller {
    async fn on_stopped(&self, caller_name: &str) {
        tracing::debug!(caller_name, "vdr-driven frontend reported stopped");
        if let Some(controller) = self.controller.upgrade() {
            controller.on_stopped(&self.name).await;
        }
    }
}

#[async_trait]
impl Frontend for VdrSubcontroller {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> FrontendKind {
        FrontendKind::Vdr
    }

    fn stop_on_shutdown(&self) -> bool {
        true
    }

    fn instant_shutdown_timeout(&self) -> Duration {
        pkg_constants::timeouts::PREPARE_SHUTDOWN_TIMEOUT_INSTANT
    }

    fn prepare_shutdown_timeout(&self) -> Duration {
        pkg_constants::timeouts::PREPARE_SHUTDOWN_TIMEOUT
    }

    /// Dispatches on `startup_state`: `Prepare` runs the classification and
    /// guard-arming dance once, then (unless it bailed) falls through to
    /// `Regular`, which is also where every later re-entry (a VDR restart,
    /// an explicit `switchto("vdr")`) lands directly.
    async fn start(&self) -> anyhow::Result<()> {
        let state = *self.startup_state.lock().await;
        match state {
            StartupState::Prepare => {
                if self.startup_prepare().await {
                    self.startup_regular().await;
                }
            }
            StartupState::Regular => {
                self.startup_regular().await;
            }
        }
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        self.poweroff_guard.stop().await;
        if self.dbus2vdr.vdr_state.status().await.is_ok() {
            self.disable_remote().await;
        }
        if let Some(frontend) = self.inner.lock().await.take() {
            frontend.stop().await?;
        }
        if self.send_dlic.load(Ordering::SeqCst) {
            if let Err(err) = self.dbus2vdr.svdrp_command("skindesigner", "DLIC", "").await {
                tracing::debug!(%err, "skindesigner DLIC failed");
            }
        }
        Ok(())
    }

    async fn is_running(&self) -> bool {
        !self.vdr_stopping.load(Ordering::SeqCst)
            && self.dbus2vdr.vdr_state.status().await.is_ok()
    }

    async fn reset(&self) {
        let mut state = self.startup_state.lock().await;
        *state = StartupState::Prepare;
    }
}

