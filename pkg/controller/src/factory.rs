use std::collections::HashMap;
use std::sync::Arc;

use pkg_frontend::{Frontend, FrontendKind as RuntimeKind, StoppedSink, UnitTracker};
use pkg_types::config::{BusKind, FrontendConfig, FrontendKind};
use pkg_types::error::FrontendError;
use tokio::process::Command;
use tokio::sync::Mutex;

/// The two message buses a `FrontendConfig` can be resolved against.
#[derive(Clone)]
pub struct Buses {
    pub session: zbus::Connection,
    pub system: zbus::Connection,
}

impl Buses {
    pub fn get(&self, kind: BusKind) -> &zbus::Connection {
        match kind {
            BusKind::SessionBus => &self.session,
            BusKind::SystemBus => &self.system,
        }
    }
}

/// What the factory needs to resolve any `FrontendConfig`: the process
/// manager's proxy (for unit probing), the application shortcut table, and
/// the two buses units may be attached to.
pub struct FactoryContext {
    pub buses: Buses,
    pub manager: pkg_ipc::systemd::ManagerProxy<'static>,
    pub applications: HashMap<String, FrontendConfig>,
}

/// Resolves `FrontendConfig` values into live `Frontend` instances, caching
/// by configuration identity so at most one instance exists per config.
#[derive(Default)]
pub struct FrontendFactory {
    cache: Mutex<HashMap<FrontendConfig, Arc<dyn Frontend>>>,
}

impl FrontendFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn resolve(
        &self,
        config: &FrontendConfig,
        ctx: &FactoryContext,
        sink: Arc<dyn StoppedSink>,
    ) -> Result<Arc<dyn Frontend>, FrontendError> {
        {
            let cache = self.cache.lock().await;
            if let Some(existing) = cache.get(config) {
                return Ok(existing.clone());
            }
        }
        let resolved = resolve_uncached(config, ctx, sink).await?;
        let mut cache = self.cache.lock().await;
        let entry = cache.entry(config.clone()).or_insert(resolved);
        Ok(entry.clone())
    }
}

fn resolve_uncached<'a>(
    config: &'a FrontendConfig,
    ctx: &'a FactoryContext,
    sink: Arc<dyn StoppedSink>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Arc<dyn Frontend>, FrontendError>> + Send + 'a>>
{
    Box::pin(async move {
        match &config.kind {
            FrontendKind::Unit { unit } => build_unit(unit, config.bus, ctx, RuntimeKind::Unit, sink).await,
            FrontendKind::DesktopApp { app } => {
                let unit_name = systemd_escape_app(app).await.unwrap_or_else(|err| {
                    tracing::warn!(%err, app, "systemd-escape failed, falling back to naive template");
                    format!("app@{app}.service")
                });
                build_unit(&unit_name, config.bus, ctx, RuntimeKind::App, sink).await
            }
            FrontendKind::Module { module, class_name } => {
                Err(FrontendError::UnknownFrontend(format!("{module}.{class_name}")))
            }
            FrontendKind::Named { name } => resolve_named(name, config.bus, ctx, sink).await,
        }
    })
}

async fn resolve_named(
    name: &str,
    bus: BusKind,
    ctx: &FactoryContext,
    sink: Arc<dyn StoppedSink>,
) -> Result<Arc<dyn Frontend>, FrontendError> {
    if let Some(app_config) = ctx.applications.get(name) {
        return resolve_uncached(app_config, ctx, sink).await;
    }
    if let Some(app) = name.strip_suffix(".desktop") {
        let desktop_config = FrontendConfig {
            kind: FrontendKind::DesktopApp { app: app.to_string() },
            use_pasuspend: false,
            bus,
        };
        return resolve_uncached(&desktop_config, ctx, sink).await;
    }
    if name.ends_with(".service") {
        let unit_config = FrontendConfig {
            kind: FrontendKind::Unit { unit: name.to_string() },
            use_pasuspend: false,
            bus,
        };
        return resolve_uncached(&unit_config, ctx, sink).await;
    }
    let candidate = format!("{name}.service");
    let known = ctx
        .manager
        .list_unit_files()
        .await
        .unwrap_or_default()
        .into_iter()
        .any(|(path, _)| {
            std::path::Path::new(&path)
                .file_name()
                .and_then(|f| f.to_str())
                == Some(candidate.as_str())
        });
    if known {
        let unit_config = FrontendConfig {
            kind: FrontendKind::Unit { unit: candidate },
            use_pasuspend: false,
            bus,
        };
        resolve_uncached(&unit_config, ctx, sink).await
    } else {
        Err(FrontendError::UnknownFrontend(name.to_string()))
    }
}

async fn build_unit(
    unit_name: &str,
    bus: BusKind,
    ctx: &FactoryContext,
    kind: RuntimeKind,
    sink: Arc<dyn StoppedSink>,
) -> Result<Arc<dyn Frontend>, FrontendError> {
    let connection = ctx.buses.get(bus).clone();
    let tracker = UnitTracker::new(connection, unit_name, kind, sink).await?;
    Ok(Arc::new(tracker))
}

/// Real invocation of `systemd-escape --template=app@.service <name>`,
/// preserved from the original tooling rather than hand-rolled escaping.
async fn systemd_escape_app(app_name: &str) -> anyhow::Result<String> {
    let output = Command::new("systemd-escape")
        .arg("--template=app@.service")
        .arg(app_name)
        .output()
        .await?;
    if !output.status.success() {
        anyhow::bail!("systemd-escape exited with {}", output.status);
    }
    Ok(String::from_utf8(output.stdout)?.trim().to_string())
}
