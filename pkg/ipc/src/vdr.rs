//! Proxies to the `de.tvdr.vdr*` family exposed by dbus2vdr.

use zbus::proxy;
use zbus::zvariant::OwnedValue;

/// `de.tvdr.vdr[<id>]`, the well-known name dbus2vdr exports for VDR
/// instance `id` (instance 0 omits the numeric suffix).
pub fn service_name(id: u32) -> String {
    if id == 0 {
        "de.tvdr.vdr".to_string()
    } else {
        format!("de.tvdr.vdr{id}")
    }
}

#[proxy(default_path = "/Devices", interface = "de.tvdr.vdr.device")]
pub trait Device {
    fn get_primary(&self) -> zbus::Result<(i32, i32, bool, bool, String)>;
    fn get_null_device(&self) -> zbus::Result<i32>;
    fn request_primary(&self, index: i32) -> zbus::Result<()>;
    fn list(&self) -> zbus::Result<Vec<(i32, i32, bool, bool, String)>>;
}

#[proxy(default_path = "/Status", interface = "de.tvdr.vdr.status")]
pub trait Status {
    fn is_replaying(&self) -> zbus::Result<(String, String, bool)>;
}

/// The VDR-state interface (`/vdr`): startup/readiness/stop lifecycle signals
/// keyed by instance id.
#[proxy(default_path = "/vdr", interface = "de.tvdr.vdr.vdr")]
pub trait VdrState {
    fn status(&self) -> zbus::Result<String>;

    #[zbus(signal)]
    fn start(&self, instanceid: i32);

    #[zbus(signal)]
    fn ready(&self, instanceid: i32);

    #[zbus(signal)]
    fn stop(&self, instanceid: i32);
}

#[proxy(default_path = "/Setup", interface = "de.tvdr.vdr.setup")]
pub trait Setup {
    fn list(&self) -> zbus::Result<Vec<(String, OwnedValue)>>;
    fn get(&self, name: &str) -> zbus::Result<(OwnedValue, i32, String)>;
    fn set(&self, name: &str, value: OwnedValue) -> zbus::Result<(i32, String)>;
}

#[proxy(default_path = "/Remote", interface = "de.tvdr.vdr.remote")]
pub trait Remote {
    fn enable(&self) -> zbus::Result<(i32, String)>;
    fn disable(&self) -> zbus::Result<(i32, String)>;
    fn status(&self) -> zbus::Result<bool>;
    fn hit_key(&self, key_name: &str) -> zbus::Result<(i32, String)>;
    fn hit_keys(&self, key_names: Vec<&str>) -> zbus::Result<(i32, String)>;
    fn call_plugin(&self, plugin_name: &str) -> zbus::Result<(i32, String)>;
}

#[proxy(default_path = "/Shutdown", interface = "de.tvdr.vdr.shutdown")]
pub trait Shutdown {
    fn is_user_active(&self) -> zbus::Result<bool>;
    fn confirm_shutdown(&self, ignoreuser: bool) -> zbus::Result<(i32, String, i32, String)>;
    fn manual_start(&self) -> zbus::Result<bool>;
    fn next_wakeup_time(&self) -> zbus::Result<(i64, String)>;
    fn set_user_inactive(&self) -> zbus::Result<(i32, String)>;
}

#[proxy(default_path = "/Plugins", interface = "de.tvdr.vdr.pluginmanager")]
pub trait PluginManager {
    fn list(&self) -> zbus::Result<Vec<(String, String)>>;
}

#[proxy(interface = "de.tvdr.vdr.plugin")]
pub trait Plugin {
    #[zbus(name = "SVDRPCommand")]
    fn svdrp_command(&self, command: &str, option: &str) -> zbus::Result<(i32, String)>;
}

/// One bundle of proxies bound to a single VDR instance's bus connection and
/// service name, mirroring `DBus2VDR` in the original source.
pub struct DBus2Vdr<'a> {
    pub connection: zbus::Connection,
    pub service_name: String,
    pub device: DeviceProxy<'a>,
    pub status: StatusProxy<'a>,
    pub vdr_state: VdrStateProxy<'a>,
    pub setup: SetupProxy<'a>,
    pub remote: RemoteProxy<'a>,
    pub shutdown: ShutdownProxy<'a>,
    pub plugin_manager: PluginManagerProxy<'a>,
}

impl<'a> DBus2Vdr<'a> {
    pub async fn connect(connection: zbus::Connection, id: u32) -> zbus::Result<Self> {
        let service_name = service_name(id);
        let device = DeviceProxy::builder(&connection)
            .destination(service_name.clone())?
            .build()
            .await?;
        let status = StatusProxy::builder(&connection)
            .destination(service_name.clone())?
            .build()
            .await?;
        let vdr_state = VdrStateProxy::builder(&connection)
            .destination(service_name.clone())?
            .build()
            .await?;
        let setup = SetupProxy::builder(&connection)
            .destination(service_name.clone())?
            .build()
            .await?;
        let remote = RemoteProxy::builder(&connection)
            .destination(service_name.clone())?
            .build()
            .await?;
        let shutdown = ShutdownProxy::builder(&connection)
            .destination(service_name.clone())?
            .build()
            .await?;
        let plugin_manager = PluginManagerProxy::builder(&connection)
            .destination(service_name.clone())?
            .build()
            .await?;
        Ok(Self {
            connection,
            service_name,
            device,
            status,
            vdr_state,
            setup,
            remote,
            shutdown,
            plugin_manager,
        })
    }

    pub async fn svdrp_command(
        &self,
        plugin_name: &str,
        command: &str,
        option: &str,
    ) -> zbus::Result<(i32, String)> {
        let plugin = PluginProxy::builder(&self.connection)
            .destination(self.service_name.clone())?
            .path(format!("/Plugins/{plugin_name}"))?
            .build()
            .await?;
        plugin.svdrp_command(command, option).await
    }
}
