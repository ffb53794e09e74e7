use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use pkg_controller::factory::Buses;
use pkg_controller::keymap;
use pkg_controller::Controller;
use pkg_ipc::facade::ControllerFacade;
use pkg_ipc::public_interface::{ControllerInterface, FrontendChangeEmitter, BUS_NAME, OBJECT_PATH};
use pkg_ipc::systemd::ManagerProxy;
use pkg_types::config::{load_config, Config};
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "yavdr-frontend", about = "yaVDR user-session frontend supervisor")]
struct Cli {
    /// Path to the YAML config file; falls back to the user and system search paths
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Log format: 'text' or 'json'
    #[arg(long, default_value = "text")]
    log_format: String,
}

fn init_logging(log_format: &str, fallback_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback_level));
    match log_format {
        "json" => {
            tracing_subscriber::fmt().json().with_env_filter(filter).init();
        }
        _ => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
        }
    }
}

fn validate_keymap(config: &Config) -> anyhow::Result<()> {
    for (key, entry) in &config.lirc.keymap {
        if !keymap::is_known_action(&entry.action) {
            anyhow::bail!("keymap entry for key '{key}' names unknown action '{}'", entry.action);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging(&cli.log_format, config.lirc.log_level.as_tracing_filter());

    if let Err(err) = validate_keymap(&config) {
        error!(%err, "config rejected");
        std::process::exit(1);
    }

    info!("starting yavdr-frontend");

    let session = zbus::Connection::session().await?;
    let system = zbus::Connection::system().await?;
    let buses = Buses { session, system };

    let manager = ManagerProxy::new(buses.get(config.main.pm_bus)).await?;
    let public_bus = config.main.public_bus;

    let controller = Controller::new(buses.clone(), manager, config).await?;

    let public_conn = buses.get(public_bus).clone();
    public_conn
        .object_server()
        .at(OBJECT_PATH, ControllerInterface::new(controller.clone() as Arc<dyn ControllerFacade>))
        .await?;
    public_conn.request_name(BUS_NAME).await?;
    info!(bus_name = BUS_NAME, object_path = OBJECT_PATH, "public interface registered");

    let emitter = FrontendChangeEmitter::new(
        public_conn.object_server().clone(),
        zbus::zvariant::OwnedObjectPath::try_from(OBJECT_PATH)?,
    );
    controller.set_change_emitter(emitter);

    // The remote-key socket reader runs on its own OS thread with a dedicated
    // lightweight runtime, so a stalled reconnect loop can never starve the
    // Controller's own task set.
    let lirc_socket = controller.lirc_config().socket.clone();
    let lirc_min_delay = Duration::from_secs(controller.lirc_config().min_delay_seconds);
    let lirc_sink = controller.clone();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("lirc runtime");
        rt.block_on(pkg_lirc::run(&lirc_socket, lirc_min_delay, lirc_sink));
    });
    info!("remote-key reader started");

    controller.drm_hotplug().await;

    let mut sighup = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())?;
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    loop {
        tokio::select! {
            _ = sighup.recv() => {
                info!("SIGHUP received, re-running DRM hot-plug handler");
                controller.drm_hotplug().await;
            }
            _ = sigterm.recv() => {
                warn!("SIGTERM received, quitting");
                controller.quit().await;
                break;
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("SIGINT received, quitting");
                controller.quit().await;
                break;
            }
        }
    }

    Ok(())
}
