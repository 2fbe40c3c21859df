//! Interactive line-oriented TCP server.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use horizon_linewire::console::{self, Command, Console, ServerConsole};
use horizon_linewire::logging::{self, DEFAULT_LOG_DIR, PROGRAM_TARGET};
use horizon_linewire::settings::{self, ServerSettings, SettingsFile};
use horizon_linewire::ProductInfo;

#[derive(Parser)]
#[command(name = "linewire-server")]
#[command(version)]
#[command(about = "Accept TCP connections and exchange text lines by hand")]
struct Cli {
    /// Settings file (default: platform configuration directory)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Directory for the per-run log file
    #[arg(long, default_value = DEFAULT_LOG_DIR)]
    log_dir: PathBuf,

    /// Port to listen on (0 picks a free port)
    #[arg(long)]
    port: Option<u16>,

    /// Start listening immediately instead of waiting for /open
    #[arg(long)]
    listen: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let product = ProductInfo::SERVER;
    let _log = logging::init(&product, &cli.log_dir)?;

    let result = run(cli, &product);
    if let Err(e) = &result {
        tracing::error!(target: PROGRAM_TARGET, error = %e, "server terminated");
    }
    result
}

fn run(cli: Cli, product: &ProductInfo) -> Result<(), Box<dyn std::error::Error>> {
    let settings_path = settings::resolve_path::<ServerSettings>(cli.settings.as_deref())?;
    let mut settings = ServerSettings::load_from(&settings_path)?;
    if let Some(port) = cli.port {
        settings.port = port;
    }

    let mut stdout = io::stdout();
    writeln!(stdout, "{}", product.banner())?;
    writeln!(stdout, "Type /help for commands.")?;

    let mut console = ServerConsole::new(settings);
    console::print_events(console.server().events());
    if cli.listen {
        console.execute(Command::Open(Vec::new()), &mut stdout)?;
    }

    console::run(&mut console, io::stdin().lock(), &mut stdout)?;

    let settings = console.shutdown();
    settings.save_to(&settings_path)?;
    Ok(())
}
