use clap::{Parser, Subcommand};
use glimmer_cli::app_state::AppState;
use glimmer_cli::commands;
use glimmer_cli::readline;
use std::io::Write;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::filter::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), String> {
    init_logging();

    let state = Arc::new(RwLock::new(AppState::new()));

    // Print lifecycle events as they happen
    let mut events = state.read().await.registry.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => println!("{}", commands::describe_event(&event)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Event printer fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });

    {
        let s = state.read().await;
        println!(
            "{} scene(s) loaded from {}, {} simulated light(s)",
            s.library.len(),
            s.settings.scene_directory,
            s.settings.lights.len()
        );
    }

    loop {
        let line = readline()?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match respond(line, Arc::clone(&state)).await {
            Ok(quit) => {
                if quit {
                    break;
                }
            }
            Err(err) => {
                write!(std::io::stdout(), "{err}").map_err(|e| e.to_string())?;
                std::io::stdout().flush().map_err(|e| e.to_string())?;
            }
        }
    }

    // Put every light back before leaving
    let registry = Arc::clone(&state.read().await.registry);
    registry.stop_all().await;
    printer.abort();

    Ok(())
}

#[derive(Parser)]
#[command(version, about = "glimmer light scenes")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a scene by name
    Start { scene: String },
    /// Stop a running animation
    Stop { name: String },
    StopAll,
    /// Add lights to a running animation
    Add {
        #[arg(short, long)]
        animation: String,
        lights: Vec<String>,
    },
    /// Take lights away from whatever animates them
    Remove {
        #[arg(long)]
        skip_restore: bool,
        lights: Vec<String>,
    },
    Status,
    Lights,
    /// Switch a simulated light on or off from outside the engine
    Power {
        light: String,
        #[arg(value_parser = ["on", "off"])]
        state: String,
    },
    Scenes,
    /// Write every loaded scene to one TOML file
    Export {
        #[arg(short, long)]
        path: String,
    },
    Reload,
    Config,
    SetDirectory {
        #[arg(short, long)]
        path: String,
    },
    Exit,
}

async fn respond(line: &str, state: Arc<RwLock<AppState>>) -> Result<bool, String> {
    let mut args = shlex::split(line).ok_or("error: Invalid quoting")?;
    args.insert(0, "glimmer".to_string());
    let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;

    match &cli.command {
        Some(Commands::Start { scene }) => commands::start_scene(scene, state).await,
        Some(Commands::Stop { name }) => commands::stop_scene(name, state).await,
        Some(Commands::StopAll) => commands::stop_all(state).await,
        Some(Commands::Add { animation, lights }) => {
            commands::add_lights(animation, lights, state).await
        }
        Some(Commands::Remove {
            skip_restore,
            lights,
        }) => commands::remove_lights(lights, *skip_restore, state).await,
        Some(Commands::Status) => commands::show_status(state).await,
        Some(Commands::Lights) => commands::list_lights(state).await,
        Some(Commands::Power { light, state: power }) => {
            commands::set_power(light, power == "on", state).await
        }
        Some(Commands::Scenes) => commands::list_scenes(state).await,
        Some(Commands::Export { path }) => commands::export_scenes(path, state).await,
        Some(Commands::Reload) => commands::reload(state).await,
        Some(Commands::Config) => commands::show_settings(state).await,
        Some(Commands::SetDirectory { path }) => commands::set_directory(path, state).await,
        Some(Commands::Exit) => {
            commands::exit();
            return Ok(true);
        }
        None => {}
    }
    Ok(false)
}

/// Initialize logging, writing to GLIMMER_LOG_PATH if set, otherwise stderr.
fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(tracing::Level::INFO.into())
        .from_env_lossy();

    if let Ok(path) = std::env::var("GLIMMER_LOG_PATH") {
        if let Ok(file) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
        {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_target(true)
                .with_ansi(false)
                .with_writer(file)
                .init();
            return;
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}
