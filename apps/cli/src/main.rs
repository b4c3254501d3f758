mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tessera")]
#[command(about = "Builds static sites from stages of markdown and templates", long_about = None)]
struct Cli {
    /// Log every claimed file and written page.
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scaffold a new site in a new folder.
    New { name: String },
    /// Build the site whose tessera.toml is found from the given folder upwards.
    Build {
        #[arg(long, short)]
        root: Option<PathBuf>,

        #[arg(long)]
        base_url: Option<String>,
    },
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("tessera_ssg=debug,tessera=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("tessera_ssg=info,tessera=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::New { name } => commands::new_site(&name),
        Commands::Build { root, base_url } => {
            commands::build_site(root.as_deref(), base_url.as_deref())
        }
    };

    if let Err(error) = result {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}
