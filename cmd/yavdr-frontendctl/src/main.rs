use clap::{Parser, Subcommand};
use tracing::info;
use zbus::proxy;

#[proxy(
    default_service = "de.yavdr.frontend",
    default_path = "/Controller",
    interface = "de.yavdr.frontend.Controller"
)]
trait Controller {
    #[zbus(name = "start")]
    fn start(&self) -> zbus::Result<(bool, String)>;
    fn stop(&self) -> zbus::Result<(bool, String)>;
    fn toggle(&self) -> zbus::Result<(bool, String)>;
    fn toggle_noninteractive(&self) -> zbus::Result<(bool, String)>;
    fn switch(&self) -> zbus::Result<(bool, String)>;
    fn switch_to(&self, next_frontend: &str) -> zbus::Result<bool>;
    fn switch_between(&self, frontend_a: &str, frontend_b: &str) -> zbus::Result<bool>;
    fn set_next(&self, next_frontend: &str) -> zbus::Result<bool>;
    fn set_display(&self, display: &str) -> zbus::Result<()>;
    fn start_desktop(&self, application: &str) -> zbus::Result<(bool, String)>;
    fn set_next_fe(&self, kind: &str, name: &str, class: &str) -> zbus::Result<bool>;
    fn quit(&self) -> zbus::Result<bool>;
    fn shutdown_successful(&self) -> zbus::Result<bool>;

    #[zbus(property)]
    fn current_frontend(&self) -> zbus::Result<String>;
}

#[derive(Parser)]
#[command(name = "yavdr-frontendctl", about = "control client for the yavdr-frontend supervisor")]
struct Cli {
    /// Talk to the system bus instead of the session bus
    #[arg(long, global = true)]
    system: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the primary frontend
    Start,
    /// Stop the current frontend
    Stop,
    /// Start if stopped, stop if running
    Toggle {
        /// Treat the toggle as machine-triggered rather than user-triggered
        #[arg(long)]
        noninteractive: bool,
    },
    /// Switch between the primary and secondary frontend
    Switch,
    /// Switch to a named frontend
    SwitchTo { frontend: String },
    /// Switch to whichever of the two given frontends is not currently active
    SwitchBetween { frontend_a: String, frontend_b: String },
    /// Queue a frontend to take over on the next switch
    SetNext { frontend: String },
    /// Queue a frontend of a specific kind (unit, desktop_app, named) to take over
    SetNextFe { kind: String, name: String },
    /// Launch a desktop application by name (an alias for switch-to)
    StartDesktop { application: String },
    /// Move a window/output to the given X11 DISPLAY spec
    SetDisplay { display: String },
    /// Stop the frontend and exit the supervisor
    Quit,
    /// Report that VDR's own shutdown sequence completed successfully
    ShutdownSuccessful,
    /// Print the name of the currently active frontend
    Current,
}

fn report(ok: bool, message: &str) -> anyhow::Result<()> {
    if ok {
        println!("{message}");
        Ok(())
    } else {
        anyhow::bail!("{message}");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let connection = if cli.system {
        zbus::Connection::system().await?
    } else {
        zbus::Connection::session().await?
    };
    let proxy = ControllerProxy::new(&connection).await?;
    info!(system = cli.system, "connected to yavdr-frontend");

    match cli.command {
        Command::Start => {
            let (ok, message) = proxy.start().await?;
            report(ok, &message)?;
        }
        Command::Stop => {
            let (ok, message) = proxy.stop().await?;
            report(ok, &message)?;
        }
        Command::Toggle { noninteractive } => {
            let (ok, message) = if noninteractive {
                proxy.toggle_noninteractive().await?
            } else {
                proxy.toggle().await?
            };
            report(ok, &message)?;
        }
        Command::Switch => {
            let (ok, message) = proxy.switch().await?;
            report(ok, &message)?;
        }
        Command::SwitchTo { frontend } => {
            let ok = proxy.switch_to(&frontend).await?;
            report(ok, "Ok")?;
        }
        Command::SwitchBetween { frontend_a, frontend_b } => {
            let ok = proxy.switch_between(&frontend_a, &frontend_b).await?;
            report(ok, "Ok")?;
        }
        Command::SetNext { frontend } => {
            let ok = proxy.set_next(&frontend).await?;
            report(ok, "Ok")?;
        }
        Command::SetNextFe { kind, name } => {
            let ok = proxy.set_next_fe(&kind, &name, "").await?;
            report(ok, "Ok")?;
        }
        Command::StartDesktop { application } => {
            let (ok, message) = proxy.start_desktop(&application).await?;
            report(ok, &message)?;
        }
        Command::SetDisplay { display } => {
            proxy.set_display(&display).await?;
            println!("Ok");
        }
        Command::Quit => {
            let ok = proxy.quit().await?;
            report(ok, "Ok")?;
        }
        Command::ShutdownSuccessful => {
            let ok = proxy.shutdown_successful().await?;
            report(ok, "Ok")?;
        }
        Command::Current => {
            let name = proxy.current_frontend().await?;
            println!("{name}");
        }
    }

    Ok(())
}
