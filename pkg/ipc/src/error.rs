/// Transient IPC failure: bus unavailable, peer gone, or a malformed reply.
/// Callers log and treat the remote side as not-ready rather than propagating.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("dbus error: {0}")]
    Zbus(#[from] zbus::Error),
    #[error("dbus variant conversion error: {0}")]
    Variant(#[from] zvariant::Error),
    #[error("{0} is not running")]
    ServiceUnknown(String),
}
