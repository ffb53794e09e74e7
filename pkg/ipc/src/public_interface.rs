use std::sync::Arc;

use zbus::interface;
use zbus::object_server::SignalEmitter;

use crate::facade::ControllerFacade;

pub const BUS_NAME: &str = "de.yavdr.frontend";
pub const OBJECT_PATH: &str = "/Controller";
pub const INTERFACE_NAME: &str = "de.yavdr.frontend.Controller";

/// The exported `de.yavdr.frontend.Controller` object. Method bodies do
/// nothing but forward to the facade and translate results to D-Bus types;
/// all policy lives in `pkg-controller`.
pub struct ControllerInterface {
    facade: Arc<dyn ControllerFacade>,
}

impl ControllerInterface {
    pub fn new(facade: Arc<dyn ControllerFacade>) -> Self {
        Self { facade }
    }
}

#[interface(name = "de.yavdr.frontend.Controller")]
impl ControllerInterface {
    async fn start(&self) {
        let _ = self.facade.start().await;
    }

    #[zbus(name = "start")]
    async fn legacy_start(&self) -> (bool, String) {
        self.facade.start().await
    }

    async fn stop(&self) -> (bool, String) {
        self.facade.stop().await
    }

    async fn toggle(&self) -> (bool, String) {
        self.facade.toggle().await
    }

    async fn toggle_noninteractive(&self) -> (bool, String) {
        self.facade.toggle_noninteractive().await
    }

    async fn switch(&self) -> (bool, String) {
        self.facade.switch().await
    }

    async fn switch_to(&self, next_frontend: &str) -> bool {
        self.facade.switchto(next_frontend).await
    }

    async fn switch_between(&self, frontend_a: &str, frontend_b: &str) -> bool {
        self.facade.switchbetween(frontend_a, frontend_b).await
    }

    async fn set_next(&self, next_frontend: &str) -> bool {
        self.facade.set_next(next_frontend).await
    }

    async fn set_display(&self, display: &str) {
        let _ = self.facade.set_display(display).await;
    }

    /// The name suggests launching a desktop entry directly; it does not.
    /// Preserved as-is: delegates to `switchto` and reports "Ok".
    async fn start_desktop(&self, application: &str) -> (bool, String) {
        (self.facade.switchto(application).await, "Ok".to_string())
    }

    async fn set_next_fe(&self, kind: String, name: String, _class: String) -> bool {
        self.facade.set_next_fe(&kind, &name).await
    }

    async fn quit(&self) -> bool {
        self.facade.quit().await
    }

    async fn shutdown_successful(&self) -> bool {
        self.facade.shutdown_successful().await
    }

    #[zbus(property)]
    async fn current_frontend(&self) -> String {
        self.facade.current_frontend_name().await
    }

    #[zbus(signal)]
    pub async fn frontend_changed(
        signal_emitter: &SignalEmitter<'_>,
        name: &str,
        status: &str,
    ) -> zbus::Result<()>;
}

/// Emits `FrontendChanged` from outside a method handler (the Controller
/// drives this from its own state-transition code, not from an IPC call).
pub struct FrontendChangeEmitter {
    object_server: zbus::ObjectServer,
    path: zbus::zvariant::OwnedObjectPath,
}

impl FrontendChangeEmitter {
    pub fn new(object_server: zbus::ObjectServer, path: zbus::zvariant::OwnedObjectPath) -> Self {
        Self {
            object_server,
            path,
        }
    }

    pub async fn emit(&self, name: &str, status: &str) -> zbus::Result<()> {
        let iface_ref = self
            .object_server
            .interface::<_, ControllerInterface>(&self.path)
            .await?;
        let emitter = iface_ref.signal_emitter();
        ControllerInterface::frontend_changed(emitter, name, status).await
    }
}
