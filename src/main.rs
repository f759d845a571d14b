// src/main.rs - Winder host command line
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use winder_rs::communication::{self, MarlinPort, PauseState, PortOptions, SerialPortInterface};
use winder_rs::config::{self, Config};
use winder_rs::planner;
use winder_shared::SerialInterface;
use winder_shared::wind::load_wind_file;
use winder_simulator::{SimulatedController, SimulatorOptions};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Parser)]
#[command(name = "winder-host", version, about = "Filament winder host")]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Log at debug level regardless of configuration
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Plan a .wind file into G-code
    Plan {
        wind_file: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Annotate the program with layer and move comments
        #[arg(short, long)]
        verbose: bool,
    },
    /// Stream a G-code file to the controller
    Run {
        gcode_file: PathBuf,
        #[arg(long)]
        port: Option<String>,
        #[arg(long)]
        baud: Option<u32>,
        /// Log every command as it is sent
        #[arg(short, long)]
        verbose: bool,
        /// Talk to the built-in simulated controller instead of a serial port
        #[arg(long)]
        simulate: bool,
    },
    /// List serial ports
    Ports,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let cli = Cli::parse();

    let (config, config_error) = match cli.config.as_deref() {
        None => (Config::default(), None),
        Some(path) => match config::load_config(path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        },
    };

    let level = if cli.debug {
        tracing::Level::DEBUG
    } else {
        config.logging.tracing_level().unwrap_or(tracing::Level::INFO)
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    if let Some(e) = config_error {
        tracing::error!(
            "Failed to load config from '{}': {}",
            cli.config.as_deref().unwrap_or_default(),
            e
        );
        return Err(e.into());
    }

    match cli.command {
        Command::Plan { wind_file, output, verbose } => {
            plan(&wind_file, &output, verbose || config.planner.verbose)
        }
        Command::Run { gcode_file, port, baud, verbose, simulate } => {
            run(&config, &gcode_file, port, baud, verbose, simulate).await
        }
        Command::Ports => {
            for port in communication::available_ports() {
                println!("{}", port);
            }
            Ok(())
        }
    }
}

fn plan(wind_file: &Path, output: &Path, verbose: bool) -> Result<(), BoxError> {
    tracing::info!("Planning wind from: {}", wind_file.display());
    let definition = load_wind_file(wind_file).map_err(|e| {
        tracing::error!("Failed to load wind file '{}': {}", wind_file.display(), e);
        e
    })?;

    let plan = planner::plan_wind(&definition, verbose).map_err(|e| {
        tracing::error!("Planning failed: {}", e);
        e
    })?;

    let mut program = plan.commands.join("\n");
    program.push('\n');
    std::fs::write(output, program)?;

    let planned = plan.layers.iter().filter(|l| l.outcome.is_planned()).count();
    tracing::info!(
        "Wrote {} commands for {} of {} layers to {}",
        plan.commands.len(),
        planned,
        definition.layers.len(),
        output.display()
    );
    if plan.rejected_after_terminal > 0 {
        tracing::warn!(
            "{} layer(s) after the terminal layer were not planned",
            plan.rejected_after_terminal
        );
    }
    Ok(())
}

async fn run(
    config: &Config,
    gcode_file: &Path,
    port: Option<String>,
    baud: Option<u32>,
    verbose: bool,
    simulate: bool,
) -> Result<(), BoxError> {
    let program = tokio::fs::read_to_string(gcode_file).await?;
    let options = PortOptions::from_config(&config.serial, verbose);

    let (interface, simulator): (Arc<dyn SerialInterface>, Option<SimulatedController>) =
        if simulate {
            let (interface, simulator) = SimulatedController::connect(SimulatorOptions::default());
            (Arc::new(interface), Some(simulator))
        } else {
            let Some(port_name) = port.or_else(|| config.serial.port.clone()) else {
                tracing::error!("No serial port given; pass --port or set [serial] port");
                return Err("no serial port configured".into());
            };
            let baud = baud.unwrap_or(config.serial.baud);
            (Arc::new(SerialPortInterface::new(port_name, baud)), None)
        };

    let port = Arc::new(MarlinPort::new(interface, options));
    port.initialize().await?;

    let mut queued = 0usize;
    for line in program.lines().map(str::trim).filter(|l| !l.is_empty()) {
        port.queue_command(line).await;
        queued += 1;
    }
    tracing::info!("Queued {} lines from {}", queued, gcode_file.display());
    tracing::info!("Press Enter to pause or resume");

    let toggler = tokio::spawn(toggle_on_enter(port.clone()));

    let result = tokio::select! {
        drained = port.wait_until_drained() => drained,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, {} commands left in queue", port.pending().await);
            Ok(())
        }
    };
    toggler.abort();

    let stats = port.stats().await;
    tracing::info!(
        "Sent {} commands, {} acknowledged, {} comments skipped",
        stats.commands_sent,
        stats.acks_received,
        stats.comments_skipped
    );
    port.reset().await;

    if let Some(simulator) = simulator {
        tracing::info!("Simulated controller finished at {}", simulator.position());
        simulator.stop();
    }

    result.map_err(|e| {
        tracing::error!("Run failed: {}", e);
        Box::new(e) as BoxError
    })
}

/// Toggles pause / resume each time a line arrives on stdin. Stdin is read on
/// a detached thread so a pending read never blocks shutdown.
async fn toggle_on_enter(port: Arc<MarlinPort>) {
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            if line.is_err() || tx.send(()).is_err() {
                break;
            }
        }
    });

    while rx.recv().await.is_some() {
        let result = match port.pause_state().await {
            PauseState::Ready => port.pause().await,
            PauseState::Paused => port.resume().await,
            state => {
                tracing::info!("Still waiting for the controller ({:?})", state);
                Ok(())
            }
        };
        if let Err(e) = result {
            tracing::warn!("{}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winder_shared::gcode::ParameterHeader;

    const WIND: &str = r#"{
        "layers": [
            {"windType": "skip", "mandrelRotation": 90},
            {"windType": "hoop", "terminal": true}
        ],
        "mandrelParameters": {"diameter": 10, "windLength": 5},
        "towParameters": {"width": 1, "thickness": 0.1},
        "defaultFeedRate": 1200
    }"#;

    #[test]
    fn test_plan_writes_program() {
        let dir = tempfile::tempdir().unwrap();
        let wind_file = dir.path().join("part.wind");
        let output = dir.path().join("part.gcode");
        std::fs::write(&wind_file, WIND).unwrap();

        plan(&wind_file, &output, false).unwrap();

        let program = std::fs::read_to_string(&output).unwrap();
        assert!(program.ends_with('\n'));
        let lines: Vec<&str> = program.lines().collect();
        assert_eq!(&lines[..2], ["G0 X0 Y0 Z0", "G0 F1200"]);
        assert!(ParameterHeader::find_in(lines.iter().copied()).is_some());
    }

    #[test]
    fn test_plan_rejects_bad_wind_file() {
        let dir = tempfile::tempdir().unwrap();
        let wind_file = dir.path().join("broken.wind");
        std::fs::write(&wind_file, "{\"layers\": [").unwrap();
        assert!(plan(&wind_file, &dir.path().join("out.gcode"), false).is_err());
    }

    #[tokio::test]
    async fn test_run_streams_to_simulator() {
        let dir = tempfile::tempdir().unwrap();
        let gcode_file = dir.path().join("part.gcode");
        std::fs::write(&gcode_file, "G0 F1000\n; note\n\nG0 X1 Y90\nG92 Y0\n").unwrap();

        let result = run(&Config::default(), &gcode_file, None, None, true, true).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_run_without_port_fails() {
        let dir = tempfile::tempdir().unwrap();
        let gcode_file = dir.path().join("part.gcode");
        std::fs::write(&gcode_file, "G0 X1\n").unwrap();

        let result = run(&Config::default(), &gcode_file, None, None, false, false).await;
        assert!(result.is_err());
    }
}
