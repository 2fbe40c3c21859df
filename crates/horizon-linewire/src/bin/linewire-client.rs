//! Interactive line-oriented TCP client.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use horizon_linewire::console::{self, ClientConsole, Command, Console};
use horizon_linewire::logging::{self, DEFAULT_LOG_DIR, PROGRAM_TARGET};
use horizon_linewire::settings::{self, ClientSettings, SettingsFile};
use horizon_linewire::ProductInfo;

#[derive(Parser)]
#[command(name = "linewire-client")]
#[command(version)]
#[command(about = "Connect to a TCP endpoint and exchange text lines by hand")]
struct Cli {
    /// Settings file (default: platform configuration directory)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Directory for the per-run log file
    #[arg(long, default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    /// Host name or IP address to connect to
    #[arg(long)]
    address: Option<String>,

    /// Port to connect to
    #[arg(long)]
    port: Option<u16>,

    /// Connect immediately instead of waiting for /open
    #[arg(long)]
    connect: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let product = ProductInfo::CLIENT;
    let _log = logging::init(&product, &cli.log_dir)?;

    let result = run(cli, &product);
    if let Err(e) = &result {
        tracing::error!(target: PROGRAM_TARGET, error = %e, "client terminated");
    }
    result
}

fn run(cli: Cli, product: &ProductInfo) -> Result<(), Box<dyn std::error::Error>> {
    let settings_path = settings::resolve_path::<ClientSettings>(cli.settings.as_deref())?;
    let mut settings = ClientSettings::load_from(&settings_path)?;
    if let Some(address) = cli.address {
        settings.address = address;
    }
    if let Some(port) = cli.port {
        settings.port = port;
    }

    let mut stdout = io::stdout();
    writeln!(stdout, "{}", product.banner())?;
    writeln!(stdout, "Type /help for commands.")?;

    let mut console = ClientConsole::new(settings);
    console::print_events(console.client().events());
    if cli.connect {
        console.execute(Command::Open(Vec::new()), &mut stdout)?;
    }

    console::run(&mut console, io::stdin().lock(), &mut stdout)?;

    let settings = console.shutdown();
    settings.save_to(&settings_path)?;
    Ok(())
}
