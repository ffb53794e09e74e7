use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Which message bus a proxy or service lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BusKind {
    SessionBus,
    SystemBus,
}

impl Default for BusKind {
    fn default() -> Self {
        BusKind::SessionBus
    }
}

/// Structured log level, superseding the older two-value "loglevel" schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggingLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl Default for LoggingLevel {
    fn default() -> Self {
        LoggingLevel::Info
    }
}

impl LoggingLevel {
    pub fn as_tracing_filter(&self) -> &'static str {
        match self {
            LoggingLevel::Error => "error",
            LoggingLevel::Warn => "warn",
            LoggingLevel::Info => "info",
            LoggingLevel::Debug => "debug",
            LoggingLevel::Trace => "trace",
        }
    }
}

/// One of the four semantic background states the painter can apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackgroundKind {
    Normal,
    Detached,
    PrepareShutdown,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackgroundEntry {
    pub path: PathBuf,
    #[serde(default)]
    pub fill: bool,
}

/// Tagged frontend reference. `Named` is resolved recursively by the frontend
/// factory; the others name a concrete way of obtaining a running frontend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FrontendKind {
    Named { name: String },
    Unit { unit: String },
    DesktopApp { app: String },
    Module { module: String, class_name: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrontendConfig {
    #[serde(flatten)]
    pub kind: FrontendKind,
    #[serde(default)]
    pub use_pasuspend: bool,
    #[serde(default)]
    pub bus: BusKind,
}

impl FrontendConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            kind: FrontendKind::Named { name: name.into() },
            use_pasuspend: false,
            bus: BusKind::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShutdownManagerKind {
    Vdr,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainConfig {
    pub primary_frontend: String,
    pub secondary_frontend: String,
    #[serde(default)]
    pub pm_bus: BusKind,
    #[serde(default)]
    pub public_bus: BusKind,
    pub shutdown_manager: ShutdownManagerKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VdrStatusSource {
    Dbus2vdr,
    Systemd,
}

impl Default for VdrStatusSource {
    fn default() -> Self {
        VdrStatusSource::Dbus2vdr
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachOnStartup {
    Auto,
    Always,
    Never,
}

impl Default for AttachOnStartup {
    fn default() -> Self {
        AttachOnStartup::Auto
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VdrConfig {
    pub id: u32,
    #[serde(default)]
    pub dbus2vdr_bus: BusKind,
    pub vdr_systemd_unit: String,
    #[serde(default)]
    pub vdr_status_source: VdrStatusSource,
    #[serde(default)]
    pub attach_on_startup: AttachOnStartup,
    pub wakeup_ts_file: PathBuf,
    pub wakeup_delta_seconds: i64,
    #[serde(default)]
    pub frontends: HashMap<String, FrontendConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeymapEntry {
    pub action: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LircConfig {
    pub socket: PathBuf,
    #[serde(default)]
    pub keymap: HashMap<String, KeymapEntry>,
    #[serde(default = "default_min_delay_seconds")]
    pub min_delay_seconds: u64,
    #[serde(default)]
    pub log_level: LoggingLevel,
    /// Keypress name that is treated as a no-op "coffee" key when requested.
    #[serde(default)]
    pub coffee_key: Option<String>,
}

fn default_min_delay_seconds() -> u64 {
    0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub main: MainConfig,
    #[serde(default)]
    pub backgrounds: HashMap<BackgroundKind, BackgroundEntry>,
    #[serde(default)]
    pub applications: HashMap<String, FrontendConfig>,
    pub vdr: VdrConfig,
    pub lirc: LircConfig,
}

/// Search order: explicit `--config` path, then `$HOME/.config/yavdr-frontend/config.yml`,
/// then `/etc/yavdr-frontend/config.yml`. Absence of all three is fatal.
pub fn load_config(cli_path: Option<&Path>) -> Result<Config, ConfigError> {
    let candidates = candidate_paths(cli_path);
    let path = candidates
        .iter()
        .find(|p| p.is_file())
        .ok_or(ConfigError::NotFound)?;
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.clone(), e))?;
    let config: Config =
        serde_yaml::from_str(&content).map_err(|e| ConfigError::Yaml(path.clone(), e))?;
    Ok(config)
}

fn candidate_paths(cli_path: Option<&Path>) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    if let Some(p) = cli_path {
        paths.push(p.to_path_buf());
    }
    if let Some(home) = std::env::var_os("HOME") {
        paths.push(Path::new(&home).join(pkg_constants::paths::USER_CONFIG_SUFFIX));
    }
    paths.push(PathBuf::from(pkg_constants::paths::SYSTEM_CONFIG_PATH));
    paths
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_is_fatal() {
        let err = load_config(Some(Path::new("/nonexistent/path/config.yml"))).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound));
    }

    #[test]
    fn cli_path_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            r#"
main:
  primary_frontend: vdr
  secondary_frontend: dummy
  shutdown_manager: vdr
vdr:
  id: 0
  vdr_systemd_unit: vdr.service
  wakeup_ts_file: /var/lib/vdr/wakeup
  wakeup_delta_seconds: 300
lirc:
  socket: /var/run/lirc/lircd
"#,
        )
        .unwrap();
        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.main.primary_frontend, "vdr");
        assert_eq!(config.vdr.id, 0);
    }

    #[test]
    fn frontend_config_round_trips_through_yaml() {
        let yaml = "type: unit\nunit: kodi.service\nuse_pasuspend: true\n";
        let cfg: FrontendConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(
            cfg.kind,
            FrontendKind::Unit {
                unit: "kodi.service".to_string()
            }
        );
        assert!(cfg.use_pasuspend);
        assert_eq!(cfg.bus, BusKind::SessionBus);
    }
}
