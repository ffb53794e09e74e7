//! Proxies to `org.freedesktop.systemd1`, the process-manager bus.

use zbus::proxy;
use zbus::zvariant::OwnedObjectPath;

#[proxy(
    default_service = "org.freedesktop.systemd1",
    default_path = "/org/freedesktop/systemd1",
    interface = "org.freedesktop.systemd1.Manager"
)]
pub trait Manager {
    fn load_unit(&self, name: &str) -> zbus::Result<OwnedObjectPath>;
    fn start_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;
    fn stop_unit(&self, name: &str, mode: &str) -> zbus::Result<OwnedObjectPath>;
    fn list_unit_files(&self) -> zbus::Result<Vec<(String, String)>>;
    fn list_unit_files_by_patterns(
        &self,
        states: Vec<&str>,
        patterns: Vec<&str>,
    ) -> zbus::Result<Vec<(String, String)>>;
    fn subscribe(&self) -> zbus::Result<()>;
    fn set_environment(&self, assignments: Vec<&str>) -> zbus::Result<()>;

    #[zbus(property)]
    fn environment(&self) -> zbus::Result<Vec<String>>;

    #[zbus(signal)]
    fn job_removed(&self, id: u32, job: OwnedObjectPath, unit: String, result: String);

    #[zbus(signal)]
    fn unit_removed(&self, id: u32, unit: OwnedObjectPath);
}

#[proxy(
    default_service = "org.freedesktop.systemd1",
    interface = "org.freedesktop.systemd1.Unit"
)]
pub trait Unit {
    #[zbus(property)]
    fn active_state(&self) -> zbus::Result<String>;

    #[zbus(property)]
    fn sub_state(&self) -> zbus::Result<String>;
}

/// `active_state == "active"` and `sub_state ∈ {"active", "running"}`.
pub fn unit_is_running(active_state: &str, sub_state: &str) -> bool {
    active_state == "active" && matches!(sub_state, "active" | "running")
}
