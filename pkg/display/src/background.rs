use std::collections::HashMap;
use std::path::Path;

use tokio::process::Command;

/// Paint the desktop background with `feh`, scoped to the given environment
/// (the caller is expected to have resolved an effective `DISPLAY` into it).
/// Failures are logged and swallowed; a missing background image is not
/// fatal to the caller.
pub async fn set_background(path: &Path, fill: bool, env: &HashMap<String, String>) {
    let flag = if fill { "--bg-fill" } else { "--bg-center" };
    let result = Command::new("feh")
        .arg(flag)
        .arg(path)
        .env_clear()
        .envs(env)
        .status()
        .await;
    match result {
        Ok(status) if status.success() => {
            tracing::debug!(path = %path.display(), fill, "background set");
        }
        Ok(status) => {
            tracing::info!(path = %path.display(), ?status, "feh exited non-zero");
        }
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "could not invoke feh");
        }
    }
}
