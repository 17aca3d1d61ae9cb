//! Berth - a multi-service stack runner
//!
//! This is the main CLI entry point for berth.

use berth::error::Result;
use berth::runtime::Supervisor;
use berth::stack::{StackOrchestrator, StackParser};
use berth::storage::VolumeManager;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Berth - multi-service stack runner
#[derive(Parser)]
#[command(name = "berth")]
#[command(author = "Evoker Industries")]
#[command(version)]
#[command(about = "A multi-service stack runner with readiness-gated startup", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and start the stack
    Up {
        /// Stack file
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Run in detached mode
        #[arg(short, long)]
        detach: bool,
    },

    /// Stop and remove the stack
    Down {
        /// Stack file
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Also remove named volumes
        #[arg(long)]
        volumes: bool,
    },

    /// List service instances
    Ps {
        /// Show all instances, not only running ones
        #[arg(short, long)]
        all: bool,
    },

    /// Validate and print the stack file
    Config {
        /// Stack file
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// View service logs
    Logs {
        /// Stack file
        #[arg(short, long)]
        file: Option<PathBuf>,
        /// Service name
        service: Option<String>,
    },

    /// Show berth version
    Version,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let working_dir = std::env::current_dir()?;

    // Base path for berth data
    let base_path = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("/var/lib"))
        .join("berth");

    let supervisor = Arc::new(Supervisor::new());
    let volumes = Arc::new(VolumeManager::new(base_path.join("volumes"))?);

    match cli.command {
        Commands::Up { file, detach } => {
            let (project_name, config) = load_stack(&working_dir, file)?;

            let mut orchestrator =
                StackOrchestrator::new(&project_name, config, supervisor, volumes);
            orchestrator.up(detach).await?;
            println!("Started project {}", project_name);
        }

        Commands::Down { file, volumes: remove_volumes } => {
            let (project_name, config) = load_stack(&working_dir, file)?;

            let mut orchestrator =
                StackOrchestrator::new(&project_name, config, supervisor, volumes);
            orchestrator.down(remove_volumes).await?;
            println!("Stopped project {}", project_name);
        }

        Commands::Ps { all } => {
            println!("{:<14} {:<24} {:<10}", "NAME", "IMAGE", "STATUS");
            for instance in supervisor.list(all)? {
                println!(
                    "{:<14} {:<24} {:<10}",
                    instance.name, instance.image, instance.status
                );
            }
        }

        Commands::Config { file } => {
            let (_, config) = load_stack(&working_dir, file)?;
            let warnings = StackParser::validate(&config)?;

            for warning in warnings {
                println!("Warning: {}", warning);
            }

            match serde_yaml::to_string(&config) {
                Ok(rendered) => println!("{}", rendered),
                Err(e) => {
                    return Err(berth::BerthError::StackParse(format!(
                        "Failed to render config: {}",
                        e
                    )))
                }
            }
        }

        Commands::Logs { file, service } => {
            let (project_name, config) = load_stack(&working_dir, file)?;

            let orchestrator =
                StackOrchestrator::new(&project_name, config, supervisor, volumes);
            for line in orchestrator.logs(service.as_deref())? {
                println!("{}", line);
            }
        }

        Commands::Version => {
            println!("berth version {}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}

/// Resolve and parse the stack file, deriving the project name
fn load_stack(
    working_dir: &std::path::Path,
    file: Option<PathBuf>,
) -> Result<(String, berth::stack::StackConfig)> {
    let stack_file = file.unwrap_or_else(|| {
        StackParser::find_stack_file(working_dir)
            .unwrap_or_else(|| working_dir.join("stack.yaml"))
    });

    let mut config = StackParser::parse_file(&stack_file)?;
    StackParser::interpolate(&mut config, &std::env::vars().collect());
    StackParser::validate(&config)?;

    let project_name = config.name.clone().unwrap_or_else(|| {
        working_dir
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("default")
            .to_string()
    });

    Ok((project_name, config))
}
