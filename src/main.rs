//! boresight - Camera Boresighting Controller
//!
//! Host binary: wires the control core to logging collaborators and replays button
//! edges from a script (or stdin) in place of GPIO.

use anyhow::{Context, Result};
use boresight::app::{ExitReason, ModeStateMachine, Peripherals, Runtime};
use boresight::device::{BlinkActuator, LogPin, LoggingCamera, NullVideoSink, RecordingManager};
use boresight::input::{edge_channel, parse_script, spawn_replay_thread};
use boresight::overlay::AimPointStore;
use boresight::Config;
use clap::Parser;
use log::{error, info};
use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

#[derive(Debug, Parser)]
#[command(name = "boresight", version = boresight::VERSION)]
#[command(about = "Camera boresighting controller: reticle, anchored zoom and recording")]
struct Cli {
    /// Configuration file (defaults to <config dir>/boresight/config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory for recordings and the aim-point record
    #[arg(long, value_name = "DIR")]
    storage_dir: Option<PathBuf>,

    /// Edge script to replay: "<delay_ms> <press|release> <button>" per line.
    /// Read from stdin when omitted.
    #[arg(short, long, value_name = "FILE")]
    script: Option<PathBuf>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };
    if let Some(dir) = &cli.storage_dir {
        config.storage.directory = dir.clone();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let script = match &cli.script {
        Some(path) => {
            if !path.is_file() {
                anyhow::bail!("Script is not a regular file: {}", path.display());
            }
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading script {}", path.display()))?;
            Some(parse_script(&text)?)
        }
        None => None,
    };

    let store = AimPointStore::new(config.aim_path());
    let peripherals = Peripherals {
        camera: Box::new(LoggingCamera::new(config.orientation())),
        recorder: Box::new(RecordingManager::new(
            config.storage.directory.clone(),
            Box::new(NullVideoSink::default()),
        )),
        buzzer: Box::new(
            BlinkActuator::new("buzzer", LogPin::new("buzzer"))
                .with_join_timeout(config.timing.join_timeout()),
        ),
        led: Box::new(
            BlinkActuator::new("led", LogPin::new("led"))
                .with_join_timeout(config.timing.join_timeout()),
        ),
    };
    let machine = ModeStateMachine::new(&config, peripherals, store.clone());

    let runtime = Runtime::new(config.timing.clone());
    let (edges_tx, edges_rx) = edge_channel(config.input.edge_queue_capacity);

    let running = runtime.running();
    match script {
        Some(steps) => {
            spawn_replay_thread(steps, edges_tx, running);
        }
        None => {
            std::thread::spawn(move || {
                let mut text = String::new();
                if let Err(err) = std::io::stdin().read_to_string(&mut text) {
                    error!("Failed to read edge script from stdin: {}", err);
                    return;
                }
                match parse_script(&text) {
                    Ok(steps) => {
                        if spawn_replay_thread(steps, edges_tx, running).join().is_err() {
                            error!("Edge replay thread panicked");
                        }
                    }
                    Err(err) => error!("Invalid edge script on stdin: {}", err),
                }
            });
        }
    }

    let running = runtime.running();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            running.store(false, Ordering::SeqCst);
        }
    });

    info!(
        "boresight {} started, storage in {}",
        boresight::VERSION,
        config.storage.directory.display()
    );
    match runtime.run(machine, edges_rx, store).await? {
        ExitReason::ExitCombo => std::process::exit(0),
        ExitReason::Stopped => Ok(()),
    }
}
