//! The supervisor core: owns the current/next frontend slots, the
//! preconfigured `dummy`/`vdr` frontends, and the shutdown pipeline.
//! Everything the public D-Bus surface and the remote-key dispatcher need
//! goes through here.

pub mod factory;
pub mod keymap;
pub mod pasuspend;
pub mod shutdown;
pub mod vdr_subcontroller;

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use pkg_frontend::{Dummy, Frontend, StoppedSink};
use pkg_ipc::facade::ControllerFacade;
use pkg_ipc::public_interface::FrontendChangeEmitter;
use pkg_ipc::systemd::ManagerProxy;
use pkg_types::config::{
    BackgroundEntry, BackgroundKind, BusKind, Config, FrontendConfig, FrontendKind, MainConfig,
    ShutdownManagerKind,
};
use pkg_types::display::{check_configured_display, parse_display_spec};
use pkg_types::state::{FrontendSlots, FrontendState};
use tokio::sync::Mutex;

use factory::{Buses, FactoryContext, FrontendFactory};
use shutdown::{DelayedRepeatableTask, ShutdownHandler, ShutdownQueue};
use vdr_subcontroller::VdrSubcontroller;

struct ControllerState {
    state: FrontendState,
    frontends: FrontendSlots<Arc<dyn Frontend>>,
    expect_user_activity: bool,
}

/// Forwards a `StoppedSink` notification to the Controller identified by a
/// weak handle that may not be set yet (the dummy frontend needs a sink
/// before the owning `Arc<Controller>` exists).
struct ForwardSink(Arc<OnceLock<Weak<Controller>>>);

#[async_trait]
impl StoppedSink for ForwardSink {
    async fn on_stopped(&self, caller_name: &str) {
        if let Some(controller) = self.0.get().and_then(Weak::upgrade) {
            controller.on_stopped(caller_name).await;
        }
    }
}

pub struct Controller {
    main: MainConfig,
    backgrounds: HashMap<BackgroundKind, BackgroundEntry>,
    lirc: pkg_types::config::LircConfig,
    manager: ManagerProxy<'static>,
    factory: Arc<FrontendFactory>,
    ctx: Arc<FactoryContext>,
    named: Mutex<HashMap<String, Arc<dyn Frontend>>>,
    state: Mutex<ControllerState>,
    poweroff_timer: DelayedRepeatableTask,
    attempt_shutdown_timer: DelayedRepeatableTask,
    shutdown_handler: OnceLock<Arc<dyn ShutdownHandler>>,
    /// General-purpose deferred-task queue carried over from the original
    /// tooling; the shutdown pipeline itself runs on `poweroff_timer`/
    /// `attempt_shutdown_timer` rather than this queue.
    shutdown_queue: ShutdownQueue,
    change_emitter: Mutex<Option<FrontendChangeEmitter>>,
    self_weak: Arc<OnceLock<Weak<Controller>>>,
}

impl Controller {
    pub async fn new(
        buses: Buses,
        manager: ManagerProxy<'static>,
        config: Config,
    ) -> anyhow::Result<Arc<Self>> {
        let factory = Arc::new(FrontendFactory::new());
        let ctx = Arc::new(FactoryContext {
            buses: buses.clone(),
            manager: manager.clone(),
            applications: config.applications.clone(),
        });
        let self_weak: Arc<OnceLock<Weak<Controller>>> = Arc::new(OnceLock::new());
        let dummy_sink: Arc<dyn StoppedSink> = Arc::new(ForwardSink(self_weak.clone()));
        let dummy: Arc<dyn Frontend> = Arc::new(Dummy::new("dummy", dummy_sink));

        let mut named = HashMap::new();
        named.insert("dummy".to_string(), dummy.clone());

        let shutdown_manager = config.main.shutdown_manager;
        let (shutdown_queue, shutdown_worker) = ShutdownQueue::new();
        tokio::spawn(shutdown_worker.run());
        let this = Arc::new(Self {
            main: config.main,
            backgrounds: config.backgrounds,
            lirc: config.lirc,
            manager,
            factory,
            ctx,
            named: Mutex::new(named),
            state: Mutex::new(ControllerState {
                state: FrontendState::default(),
                frontends: FrontendSlots::new(dummy.clone(), dummy.clone()),
                expect_user_activity: false,
            }),
            poweroff_timer: DelayedRepeatableTask::new(),
            attempt_shutdown_timer: DelayedRepeatableTask::new(),
            shutdown_handler: OnceLock::new(),
            shutdown_queue,
            change_emitter: Mutex::new(None),
            self_weak: self_weak.clone(),
        });
        let _ = self_weak.set(Arc::downgrade(&this));

        let vdr_bus = this.ctx.buses.get(config.vdr.dbus2vdr_bus).clone();
        let vdr = VdrSubcontroller::new(
            vdr_bus,
            config.vdr,
            Arc::downgrade(&this),
            this.factory.clone(),
            this.ctx.clone(),
        )
        .await?;
        vdr.spawn_watchers();
        match shutdown_manager {
            ShutdownManagerKind::Vdr => {
                let _ = this.shutdown_handler.set(vdr.clone() as Arc<dyn ShutdownHandler>);
            }
        }
        this.named.lock().await.insert("vdr".to_string(), vdr);

        // Mirrors the startup frontend pair: current = primary, next =
        // secondary, both resolved (and cached) up front so `start`/`switch`
        // have something real to act on before any keypress or VDR-ready
        // signal arrives.
        let primary = this.get_frontend(&this.main.primary_frontend).await;
        let secondary = this.get_frontend(&this.main.secondary_frontend).await;
        {
            let mut state = this.state.lock().await;
            state.frontends = FrontendSlots::new(primary, secondary);
        }

        Ok(this)
    }

    pub fn lirc_config(&self) -> &pkg_types::config::LircConfig {
        &self.lirc
    }

    pub fn set_change_emitter(&self, emitter: FrontendChangeEmitter) {
        // Only settable once, from the binary right after the object server
        // is up; callers are expected to call this exactly once.
        if let Ok(mut guard) = self.change_emitter.try_lock() {
            *guard = Some(emitter);
        }
    }

    fn as_stopped_sink(&self) -> Arc<dyn StoppedSink> {
        Arc::new(ForwardSink(self.self_weak.clone()))
    }

    async fn dummy(&self) -> Arc<dyn Frontend> {
        self.named
            .lock()
            .await
            .get("dummy")
            .expect("dummy frontend is always registered")
            .clone()
    }

    async fn get_frontend(&self, name: &str) -> Arc<dyn Frontend> {
        if let Some(frontend) = self.named.lock().await.get(name) {
            return frontend.clone();
        }
        let cfg = FrontendConfig::named(name);
        match self.factory.resolve(&cfg, &self.ctx, self.as_stopped_sink()).await {
            Ok(frontend) => frontend,
            Err(err) => {
                tracing::warn!(%err, name, "could not resolve frontend, falling back to dummy");
                self.dummy().await
            }
        }
    }

    fn frontend_uses_pasuspend(&self, name: &str) -> bool {
        self.ctx
            .applications
            .get(name)
            .map(|cfg| cfg.use_pasuspend)
            .unwrap_or(false)
    }

    async fn emit_frontend_changed(&self, name: &str, status: &str) {
        if let Some(emitter) = self.change_emitter.lock().await.as_ref() {
            if let Err(err) = emitter.emit(name, status).await {
                tracing::debug!(%err, "could not emit FrontendChanged");
            }
        }
    }

    pub async fn current_frontend_name(&self) -> String {
        self.state.lock().await.frontends.current().name().to_string()
    }

    pub async fn is_active(&self) -> bool {
        let current = self.state.lock().await.frontends.current().clone();
        current.is_running().await
    }

    /// Whether something upstream (an unattended wakeup, an
    /// `attach_on_startup = never` policy, an explicit user-triggered stop)
    /// wants the current frontend left idle instead of auto-started.
    pub async fn expect_user_activity(&self) -> bool {
        self.state.lock().await.expect_user_activity
    }

    pub async fn set_expect_user_activity(&self, value: bool) {
        self.state.lock().await.expect_user_activity = value;
    }

    /// Starts whatever is currently in the `current` slot. Does not resolve
    /// a frontend by name; `switchto` is responsible for arming the slot
    /// before a switch happens.
    pub async fn start(&self) -> (bool, String) {
        if !check_configured_display(std::env::var("DISPLAY").ok().as_deref()) {
            return (false, "DISPLAY is not configured".to_string());
        }
        {
            let mut state = self.state.lock().await;
            state.expect_user_activity = false;
        }
        self.poweroff_timer.stop().await;
        let frontend = { self.state.lock().await.frontends.current().clone() };
        self.set_background(BackgroundKind::Normal).await;
        if self.frontend_uses_pasuspend(frontend.name()) {
            pasuspend::suspend().await;
        }
        let result = match frontend.start().await {
            Ok(()) => {
                self.emit_frontend_changed(frontend.name(), "started").await;
                (true, "Ok".to_string())
            }
            Err(err) => {
                tracing::warn!(%err, name = frontend.name(), "frontend failed to start");
                (false, err.to_string())
            }
        };
        // Regardless of outcome: the next time this frontend stops on its
        // own, on_stopped should treat it as a switch (reverse slots, start
        // whatever is now current).
        self.state.lock().await.state = FrontendState::Switch;
        result
    }

    /// Stops the current frontend. `extern` marks a user/IPC-initiated stop:
    /// it picks a background from the current state, transitions state to
    /// `Stop`, and marks `expect_user_activity`. An internal stop (`extern
    /// = false`, used by `switch`) leaves all of that alone so the caller's
    /// own state transition (e.g. `Switch`) survives.
    pub async fn stop(&self, extern_stop: bool) -> (bool, String) {
        if extern_stop {
            let current_state = self.state.lock().await.state;
            let background = match current_state {
                FrontendState::PrepareShutdown => BackgroundKind::PrepareShutdown,
                FrontendState::Quit => BackgroundKind::Shutdown,
                FrontendState::Restart => BackgroundKind::Normal,
                _ => BackgroundKind::Detached,
            };
            self.set_background(background).await;
            let mut state = self.state.lock().await;
            state.state = FrontendState::Stop;
            state.expect_user_activity = true;
        }

        let frontend = { self.state.lock().await.frontends.current().clone() };
        if !frontend.is_running().await {
            return (true, "already stopped".to_string());
        }
        match frontend.stop().await {
            Ok(()) => {
                if self.frontend_uses_pasuspend(frontend.name()) {
                    pasuspend::resume().await;
                }
                (true, "Ok".to_string())
            }
            Err(err) => {
                tracing::warn!(%err, name = frontend.name(), "frontend failed to stop");
                (false, err.to_string())
            }
        }
    }

    pub async fn toggle(&self, extern_: bool) -> (bool, String) {
        if self.is_active().await {
            {
                let mut state = self.state.lock().await;
                state.state = FrontendState::Stop;
            }
            self.stop(extern_).await;
        } else {
            self.start().await;
        }
        (true, "Ok".to_string())
    }

    /// Stops the current frontend with `extern = false` and arms `Switch`
    /// state; the `on_stopped` callback does the actual slot reversal and
    /// restart once the stop completes, against whatever is in the `next`
    /// slot at that time.
    pub async fn switch(&self) -> (bool, String) {
        {
            let mut state = self.state.lock().await;
            state.state = FrontendState::Switch;
        }
        self.stop(false).await;
        (true, "Ok".to_string())
    }

    pub async fn switchto(&self, next_frontend: &str) -> bool {
        let frontend = self.get_frontend(next_frontend).await;
        if self.current_frontend_name().await == frontend.name() {
            return true;
        }
        self.state.lock().await.frontends.set_next(frontend);
        self.switch().await;
        true
    }

    pub async fn switchbetween(&self, frontend_a: &str, frontend_b: &str) -> bool {
        if frontend_a.is_empty() || frontend_b.is_empty() {
            return false;
        }
        let current = self.current_frontend_name().await;
        let target = if current == frontend_a { frontend_b } else { frontend_a };
        self.switchto(target).await
    }

    pub async fn set_next(&self, next_frontend: &str) -> bool {
        let frontend = self.get_frontend(next_frontend).await;
        self.state.lock().await.frontends.set_next(frontend);
        true
    }

    pub async fn set_next_fe(&self, kind: &str, name: &str) -> bool {
        let cfg = match kind {
            "unit" => FrontendConfig {
                kind: FrontendKind::Unit { unit: name.to_string() },
                use_pasuspend: false,
                bus: BusKind::default(),
            },
            "desktop_app" | "app" => FrontendConfig {
                kind: FrontendKind::DesktopApp { app: name.to_string() },
                use_pasuspend: false,
                bus: BusKind::default(),
            },
            _ => FrontendConfig::named(name),
        };
        match self.factory.resolve(&cfg, &self.ctx, self.as_stopped_sink()).await {
            Ok(frontend) => {
                self.state.lock().await.frontends.set_next(frontend);
                true
            }
            Err(err) => {
                tracing::warn!(%err, kind, name, "set_next_fe failed to resolve frontend");
                false
            }
        }
    }

    pub async fn set_display(&self, display: &str) -> bool {
        let Some(spec) = parse_display_spec(display) else {
            return false;
        };
        let mut env = HashMap::new();
        env.insert("DISPLAY".to_string(), display.to_string());
        self.set_systemd_env(&env).await;
        match std::env::var_os("HOME") {
            Some(home) => {
                let path = std::path::Path::new(&home).join(".second_display");
                if let Err(err) = tokio::fs::write(&path, spec.second_display_line()).await {
                    tracing::warn!(%err, path = %path.display(), "failed to write second display file");
                }
            }
            None => tracing::warn!("HOME not set, could not write second display file"),
        }
        true
    }

    pub async fn quit(&self) -> bool {
        {
            let mut state = self.state.lock().await;
            state.state = FrontendState::Quit;
        }
        let current = { self.state.lock().await.frontends.current().clone() };
        if current.is_running().await {
            let (ok, _) = self.stop(true).await;
            return ok;
        }
        true
    }

    /// Arms the outer power-off timer: after the current frontend's own
    /// shutdown grace period, `prepare_shutdown` stops it and starts asking
    /// the shutdown handler to confirm the system can actually power off.
    pub async fn poweroff(&self, instant: bool) {
        {
            let mut state = self.state.lock().await;
            state.expect_user_activity = true;
        }
        self.poweroff_timer.stop().await;
        self.attempt_shutdown_timer.stop().await;
        let current = { self.state.lock().await.frontends.current().clone() };
        let timeout = if instant {
            current.instant_shutdown_timeout()
        } else {
            current.prepare_shutdown_timeout()
        };
        let weak = self.self_weak.clone();
        self.poweroff_timer
            .start(timeout, move || {
                let weak = weak.clone();
                async move {
                    if let Some(controller) = weak.get().and_then(Weak::upgrade) {
                        controller.prepare_shutdown(instant).await;
                    }
                    false
                }
            })
            .await;
    }

    /// Switches back to VDR first if some other frontend is active, so that
    /// "power off" from a desktop app or game always routes through VDR's
    /// own shutdown confirmation rather than just killing the app.
    pub async fn yavdr_compat_poweroff(&self) {
        if self.current_frontend_name().await != "vdr" {
            self.switchto("vdr").await;
        } else {
            self.poweroff(false).await;
        }
    }

    /// Runs once the outer power-off timer fires: stops the current
    /// frontend if it wants to be stopped on shutdown, then starts
    /// repeatedly asking the configured shutdown handler to confirm the
    /// system can power off, every `PREPARE_SHUTDOWN_TIMEOUT[_INSTANT]`.
    async fn prepare_shutdown(&self, instant: bool) {
        let current = { self.state.lock().await.frontends.current().clone() };
        if current.stop_on_shutdown() {
            {
                let mut state = self.state.lock().await;
                state.state = FrontendState::PrepareShutdown;
            }
            self.stop(true).await;
        }
        let Some(handler) = self.shutdown_handler.get().cloned() else {
            return;
        };
        let retry_timeout = if instant {
            pkg_constants::timeouts::PREPARE_SHUTDOWN_TIMEOUT_INSTANT
        } else {
            pkg_constants::timeouts::PREPARE_SHUTDOWN_TIMEOUT
        };
        self.attempt_shutdown_timer
            .start(retry_timeout, move || {
                let handler = handler.clone();
                async move { handler.attempt_shutdown().await }
            })
            .await;
    }

    /// Called over IPC once the managed system reports its own shutdown
    /// sequence completed, so yavdr-frontend stops retrying `attempt_shutdown`.
    pub async fn on_vdr_shutdown_successful(&self) -> bool {
        {
            let mut state = self.state.lock().await;
            state.expect_user_activity = false;
        }
        self.poweroff_timer.stop().await;
        self.attempt_shutdown_timer.stop().await;
        self.set_background(BackgroundKind::Normal).await;
        if let Some(vdr) = self.named.lock().await.get("vdr") {
            vdr.reset().await;
        }
        {
            let mut state = self.state.lock().await;
            state.state = FrontendState::Restart;
        }
        true
    }

    pub async fn get_systemd_env(&self) -> HashMap<String, String> {
        let vars = self.manager.environment().await.unwrap_or_default();
        vars.into_iter()
            .filter_map(|entry| entry.split_once('=').map(|(k, v)| (k.to_string(), v.to_string())))
            .collect()
    }

    pub async fn set_systemd_env(&self, env: &HashMap<String, String>) {
        let assignments: Vec<String> = env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let refs: Vec<&str> = assignments.iter().map(String::as_str).collect();
        if let Err(err) = self.manager.set_environment(refs).await {
            tracing::warn!(%err, "failed to set systemd environment");
        }
    }

    pub async fn set_background(&self, kind: BackgroundKind) {
        let Some(entry) = self.backgrounds.get(&kind) else {
            return;
        };
        let mut env = self.get_systemd_env().await;
        for (key, value) in std::env::vars() {
            env.entry(key).or_insert(value);
        }
        pkg_display::background::set_background(&entry.path, entry.fill, &env).await;
    }

    pub async fn drm_hotplug(&self) {
        let path = std::path::Path::new(pkg_constants::paths::DRM_CONNECTOR_FACTS_PATH);
        let facts = match pkg_display::drm::load_facts(path) {
            Ok(facts) => facts,
            Err(err) => {
                tracing::warn!(%err, "could not load drm connector facts");
                return;
            }
        };
        pkg_display::drm::hotplug(pkg_constants::paths::DRM_SYSFS_CARD_GLOB, &facts).await;
        tokio::time::sleep(pkg_constants::timeouts::DRM_SETTLE_DELAY).await;
        self.set_background(BackgroundKind::Normal).await;
        let current = { self.state.lock().await.frontends.current().clone() };
        if let Err(err) = current.stop().await {
            tracing::debug!(%err, "current frontend failed to stop during drm hotplug");
        }
        if let Err(err) = current.start().await {
            tracing::warn!(%err, "current frontend failed to restart after drm hotplug");
        }
    }

    /// Keypress entry point: looks up `name` in the configured keymap,
    /// skips the configured no-op "coffee" key, and dispatches through the
    /// static action table. Falls back to `start` if nothing is running and
    /// the state machine expects user activity.
    pub async fn on_keypress(self: &Arc<Self>, key_name: &str) {
        if self.lirc.coffee_key.as_deref() == Some(key_name) {
            return;
        }
        let Some(entry) = self.lirc.keymap.get(key_name) else {
            if !self.is_active().await {
                let _ = self.start().await;
            }
            return;
        };
        let Some(action) = keymap::lookup(&entry.action) else {
            tracing::warn!(action = %entry.action, "keymap entry names an unknown action");
            return;
        };
        action(self.clone(), entry.args.clone()).await;
    }
}

#[async_trait]
impl pkg_lirc::KeypressSink for Controller {
    async fn on_keypress(&self, key_name: &str) {
        if let Some(arc_self) = self.self_weak.get().and_then(Weak::upgrade) {
            Controller::on_keypress(&arc_self, key_name).await;
        }
    }
}

#[async_trait]
impl StoppedSink for Controller {
    async fn on_stopped(&self, caller_name: &str) {
        let current_name = { self.state.lock().await.frontends.current().name().to_string() };
        if current_name != caller_name {
            tracing::debug!(caller_name, current = %current_name, "stop signal not from current frontend, ignoring");
            return;
        }
        let dispatch_state = { self.state.lock().await.state };
        tracing::debug!(caller_name, ?dispatch_state, "current frontend stopped");
        self.emit_frontend_changed(caller_name, "stopped").await;
        match dispatch_state {
            FrontendState::Switch => {
                self.state.lock().await.frontends.switch();
                self.start().await;
            }
            FrontendState::Restart => {
                self.start().await;
            }
            FrontendState::Stop => {}
            FrontendState::PrepareShutdown | FrontendState::Quit => {
                self.stop(true).await;
            }
        }
    }
}

#[async_trait]
impl ControllerFacade for Controller {
    async fn start(&self) -> (bool, String) {
        Controller::start(self).await
    }

    async fn stop(&self) -> (bool, String) {
        Controller::stop(self, true).await
    }

    async fn toggle(&self) -> (bool, String) {
        Controller::toggle(self, true).await
    }

    async fn toggle_noninteractive(&self) -> (bool, String) {
        Controller::toggle(self, false).await
    }

    async fn switch(&self) -> (bool, String) {
        Controller::switch(self).await
    }

    async fn switchto(&self, next_frontend: &str) -> bool {
        Controller::switchto(self, next_frontend).await
    }

    async fn switchbetween(&self, frontend_a: &str, frontend_b: &str) -> bool {
        Controller::switchbetween(self, frontend_a, frontend_b).await
    }

    async fn set_next(&self, next_frontend: &str) -> bool {
        Controller::set_next(self, next_frontend).await
    }

    async fn set_display(&self, display: &str) -> bool {
        Controller::set_display(self, display).await
    }

    async fn set_next_fe(&self, kind: &str, name: &str) -> bool {
        Controller::set_next_fe(self, kind, name).await
    }

    async fn quit(&self) -> bool {
        Controller::quit(self).await
    }

    async fn shutdown_successful(&self) -> bool {
        Controller::on_vdr_shutdown_successful(self).await
    }

    async fn current_frontend_name(&self) -> String {
        Controller::current_frontend_name(self).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pkg_types::config::{MainConfig, ShutdownManagerKind, VdrConfig, VdrStatusSource, AttachOnStartup, LircConfig};

    fn sample_config() -> Config {
        Config {
            main: MainConfig {
                primary_frontend: "vdr".to_string(),
                secondary_frontend: "dummy".to_string(),
                pm_bus: BusKind::SessionBus,
                public_bus: BusKind::SessionBus,
                shutdown_manager: ShutdownManagerKind::Vdr,
            },
            backgrounds: HashMap::new(),
            applications: HashMap::new(),
            vdr: VdrConfig {
                id: 0,
                dbus2vdr_bus: BusKind::SessionBus,
                vdr_systemd_unit: "vdr.service".to_string(),
                vdr_status_source: VdrStatusSource::Dbus2vdr,
                attach_on_startup: AttachOnStartup::Auto,
                wakeup_ts_file: "/tmp/does-not-exist-wakeup".into(),
                wakeup_delta_seconds: 300,
                frontends: HashMap::new(),
            },
            lirc: LircConfig {
                socket: "/tmp/does-not-exist.sock".into(),
                keymap: HashMap::new(),
                min_delay_seconds: 0,
                log_level: pkg_types::config::LoggingLevel::Info,
                coffee_key: None,
            },
        }
    }

    #[test]
    fn sample_config_builds() {
        let _ = sample_config();
    }
}
