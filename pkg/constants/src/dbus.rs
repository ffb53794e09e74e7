//! D-Bus names, paths and interfaces.

/// Bus name the public IPC interface is published on.
pub const FRONTEND_BUS_NAME: &str = "de.yavdr.frontend";

/// Object path of the public Controller object.
pub const FRONTEND_OBJECT_PATH: &str = "/Controller";

/// Interface name of the public Controller object.
pub const FRONTEND_INTERFACE: &str = "de.yavdr.frontend.Controller";

/// systemd (process manager) well-known bus name.
pub const SYSTEMD_BUS_NAME: &str = "org.freedesktop.systemd1";

/// systemd manager object path.
pub const SYSTEMD_OBJECT_PATH: &str = "/org/freedesktop/systemd1";

/// Well-known bus name of dbus2vdr, the bridge that exposes VDR internals.
pub const VDR_BUS_NAME: &str = "de.tvdr.vdr";

/// Object path exposed by dbus2vdr for the main VDR-state interface.
pub const VDR_OBJECT_PATH: &str = "/Status";

/// Interface-name prefix shared by the whole dbus2vdr family.
pub const VDR_INTERFACE_PREFIX: &str = "de.tvdr.vdr";

/// Bus daemon service used for `NameOwnerChanged`.
pub const DBUS_DAEMON_BUS_NAME: &str = "org.freedesktop.DBus";
