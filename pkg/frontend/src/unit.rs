use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use pkg_ipc::systemd::{self, ManagerProxy, UnitProxy};
use pkg_types::error::FrontendError;
use zbus::zvariant::OwnedObjectPath;

use crate::{Frontend, FrontendKind, StoppedSink};

/// Tracks a single named service managed by the process manager. Used both
/// for plain `Unit` frontends and for `DesktopApp` frontends, which resolve
/// to an `app@<name>.service` unit under the hood.
pub struct UnitTracker {
    name: String,
    unit_name: String,
    fe_kind: FrontendKind,
    manager: ManagerProxy<'static>,
    unit: UnitProxy<'static>,
    unit_object_path: OwnedObjectPath,
    sink: Arc<dyn StoppedSink>,
}

impl UnitTracker {
    pub async fn new(
        connection: zbus::Connection,
        unit_name: &str,
        fe_kind: FrontendKind,
        sink: Arc<dyn StoppedSink>,
    ) -> Result<Self, FrontendError> {
        let unit_name = if unit_name.ends_with(".service") {
            unit_name.to_string()
        } else {
            format!("{unit_name}.service")
        };
        let manager = ManagerProxy::new(&connection)
            .await
            .map_err(|_| FrontendError::UnknownUnit(unit_name.clone()))?;
        let unit_object_path = manager
            .load_unit(&unit_name)
            .await
            .map_err(|_| FrontendError::UnknownUnit(unit_name.clone()))?;
        let unit = UnitProxy::builder(&connection)
            .path(unit_object_path.clone())
            .map_err(|_| FrontendError::UnknownUnit(unit_name.clone()))?
            .build()
            .await
            .map_err(|_| FrontendError::UnknownUnit(unit_name.clone()))?;

        Ok(Self {
            name: unit_name.clone(),
            unit_name,
            fe_kind,
            manager,
            unit,
            unit_object_path,
            sink,
        })
    }

    async fn await_job_result(&self, job: &OwnedObjectPath) -> anyhow::Result<String> {
        let mut removed = self.manager.receive_job_removed().await?;
        while let Some(signal) = removed.next().await {
            let args = signal.args()?;
            if &args.job == job {
                return Ok(args.result);
            }
        }
        anyhow::bail!("job-removed stream ended before job {job} completed")
    }

    fn spawn_unit_removed_watcher(&self) {
        let manager = self.manager.clone();
        let object_path = self.unit_object_path.clone();
        let name = self.name.clone();
        let sink = self.sink.clone();
        tokio::spawn(async move {
            let Ok(mut removed) = manager.receive_unit_removed().await else {
                return;
            };
            while let Some(signal) = removed.next().await {
                let Ok(args) = signal.args() else { continue };
                if args.unit == object_path {
                    sink.on_stopped(&name).await;
                    return;
                }
            }
        });
    }
}

#[async_trait]
impl Frontend for UnitTracker {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> FrontendKind {
        self.fe_kind
    }

    fn stop_on_shutdown(&self) -> bool {
        false
    }

    fn instant_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(0)
    }

    fn prepare_shutdown_timeout(&self) -> Duration {
        Duration::from_secs(0)
    }

    async fn start(&self) -> anyhow::Result<()> {
        tracing::debug!(unit = %self.unit_name, "starting unit");
        let job = self.manager.start_unit(&self.unit_name, "replace").await?;
        let result = self.await_job_result(&job).await?;
        if result != "done" {
            anyhow::bail!("start job for {} finished with result {result}", self.unit_name);
        }
        self.spawn_unit_removed_watcher();
        Ok(())
    }

    async fn stop(&self) -> anyhow::Result<()> {
        tracing::debug!(unit = %self.unit_name, "stopping unit");
        let job = self.manager.stop_unit(&self.unit_name, "replace").await?;
        let result = self.await_job_result(&job).await?;
        self.sink.on_stopped(&self.name).await;
        if result != "done" {
            anyhow::bail!("stop job for {} finished with result {result}", self.unit_name);
        }
        Ok(())
    }

    async fn is_running(&self) -> bool {
        let active_state = self.unit.active_state().await.unwrap_or_default();
        let sub_state = self.unit.sub_state().await.unwrap_or_default();
        systemd::unit_is_running(&active_state, &sub_state)
    }

    async fn reset(&self) {}
}
