use std::path::PathBuf;

/// Fatal at startup: invalid YAML, schema violation, or no config file found
/// on the search path. Logged and the process exits with status 1.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(
        "no config file found (checked --config, $HOME/.config/yavdr-frontend/config.yml, /etc/yavdr-frontend/config.yml)"
    )]
    NotFound,
    #[error("failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("failed to parse config file {0}: {1}")]
    Yaml(PathBuf, #[source] serde_yaml::Error),
}

/// Non-fatal: a frontend name or unit could not be resolved. Callers
/// substitute a dummy frontend and log a warning; the public IPC surfaces
/// this as `(false, "Frontend is None")`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrontendError {
    #[error("unknown frontend: {0}")]
    UnknownFrontend(String),
    #[error("unknown unit: {0}")]
    UnknownUnit(String),
}
