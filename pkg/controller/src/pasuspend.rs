//! Advisory PulseAudio suspend/resume around a frontend switch, invoked when
//! a `FrontendConfig` sets `use_pasuspend`. Failures are logged only.

use std::time::Duration;

use tokio::process::Command;

pub async fn suspend() {
    match Command::new("yavdr-pasuspend").arg("-s").status().await {
        Ok(status) if status.success() => {
            tracing::debug!("yavdr-pasuspend -s succeeded");
        }
        Ok(status) => tracing::warn!(?status, "yavdr-pasuspend -s exited non-zero"),
        Err(err) => tracing::warn!(%err, "could not invoke yavdr-pasuspend -s"),
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
}

pub async fn resume() {
    if let Err(err) = Command::new("wait-for-vdr-snd-release").status().await {
        tracing::debug!(%err, "wait-for-vdr-snd-release failed, falling back to a fixed wait");
        tokio::time::sleep(Duration::from_secs(3)).await;
    }
    match Command::new("yavdr-pasuspend").arg("-r").status().await {
        Ok(status) if status.success() => {
            tracing::debug!("yavdr-pasuspend -r succeeded");
        }
        Ok(status) => tracing::warn!(?status, "yavdr-pasuspend -r exited non-zero"),
        Err(err) => tracing::warn!(%err, "could not invoke yavdr-pasuspend -r"),
    }
    tokio::time::sleep(Duration::from_millis(100)).await;
}
