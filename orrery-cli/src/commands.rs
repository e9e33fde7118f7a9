//! CLI command implementations

use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Subcommand};
use orrery_core::simulation::presets;
use orrery_core::{
    BodySpec, ForceModel, FrameProducer, OrreryConfig, OrreryError, ProducerEvent, encode_batch,
    load_bodies,
};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Serve the browser client and stream simulations over WebSocket
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,
        /// Port to bind to
        #[arg(short, long)]
        port: Option<u16>,
        /// Directory holding index.html, js/ and styles/
        #[arg(long)]
        static_dir: Option<PathBuf>,
        /// Frames buffered between producer and session
        #[arg(long)]
        channel_capacity: Option<usize>,
        /// Frames sent per client request
        #[arg(long)]
        batch_size: Option<usize>,
        /// Send the final partial batch instead of dropping it
        #[arg(long)]
        flush: bool,
        #[command(flatten)]
        simulation: SimulationArgs,
    },
    /// Run one simulation headless and print batches as JSON lines
    Simulate {
        /// Frames per printed line
        #[arg(long)]
        batch_size: Option<usize>,
        #[command(flatten)]
        simulation: SimulationArgs,
    },
}

/// Options shared by every command that builds a simulation.
#[derive(Args)]
pub struct SimulationArgs {
    /// Steps per session (0 runs until the client disconnects)
    #[arg(long)]
    steps: Option<u64>,
    /// Time advanced per step
    #[arg(long)]
    dt: Option<f64>,
    /// Force model: summed or pairwise
    #[arg(long, value_enum)]
    force_model: Option<ForceModel>,
    /// JSON file with an array of bodies
    #[arg(long, conflicts_with_all = ["preset", "random_bodies"])]
    bodies: Option<PathBuf>,
    /// Built-in initial conditions: two-body or five-body
    #[arg(long, conflicts_with = "random_bodies")]
    preset: Option<String>,
    /// Generate a random cluster with this many bodies
    #[arg(long)]
    random_bodies: Option<usize>,
    /// Seed for --random-bodies
    #[arg(long, default_value = "1", requires = "random_bodies")]
    seed: u64,
}

impl SimulationArgs {
    fn apply(self, config: &mut OrreryConfig) -> anyhow::Result<()> {
        if let Some(steps) = self.steps {
            config.simulation.step_count = (steps > 0).then_some(steps);
        }
        if let Some(dt) = self.dt {
            config.simulation.dt = dt;
        }
        if let Some(force_model) = self.force_model {
            config.simulation.force_model = force_model;
        }
        if let Some(bodies) = self.selected_bodies()? {
            config.simulation.bodies = bodies;
        }
        Ok(())
    }

    fn selected_bodies(&self) -> anyhow::Result<Option<Vec<BodySpec>>> {
        if let Some(path) = &self.bodies {
            let bodies = load_bodies(path).map_err(|err| describe(&err))?;
            return Ok(Some(bodies));
        }
        if let Some(name) = &self.preset {
            return match presets::by_name(name) {
                Some(bodies) => Ok(Some(bodies)),
                None => bail!("unknown preset '{name}' (expected two-body or five-body)"),
            };
        }
        Ok(self
            .random_bodies
            .map(|count| presets::random_cluster(count, self.seed)))
    }
}

fn describe(err: &OrreryError) -> anyhow::Error {
    if err.is_user_error() {
        anyhow::anyhow!(err.user_message())
    } else {
        anyhow::anyhow!("{err}")
    }
}

/// Handle the CLI command
///
/// # Errors
/// Returns the first failure from building the configuration or running the command
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Serve {
            host,
            port,
            static_dir,
            channel_capacity,
            batch_size,
            flush,
            simulation,
        } => {
            let mut config = OrreryConfig::from_env();
            simulation.apply(&mut config)?;
            if host.is_some() || port.is_some() {
                config.server.bind_address = bind_address(&config, host, port)?;
            }
            if let Some(static_dir) = static_dir {
                config.server.static_dir = static_dir;
            }
            if let Some(capacity) = channel_capacity {
                config.streaming.channel_capacity = capacity;
            }
            if let Some(batch_size) = batch_size {
                config.streaming.batch_size = batch_size;
            }
            if flush {
                config.streaming.flush_trailing_batch = true;
            }
            serve(config).await
        }
        Commands::Simulate {
            batch_size,
            simulation,
        } => {
            let mut config = OrreryConfig::from_env();
            simulation.apply(&mut config)?;
            if let Some(batch_size) = batch_size {
                config.streaming.batch_size = batch_size;
            }
            simulate(config).await
        }
    }
}

fn bind_address(
    config: &OrreryConfig,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<SocketAddr> {
    let current = config.server.bind_address;
    let host = host.unwrap_or_else(|| current.ip().to_string());
    let port = port.unwrap_or(current.port());
    format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid bind address {host}:{port}"))
}

/// Runs the web server until Ctrl-C.
///
/// # Errors
/// - Configuration is invalid or the server fails to bind or serve
pub async fn serve(config: OrreryConfig) -> anyhow::Result<()> {
    let address = config.server.bind_address;
    let session_path = config.server.session_path;

    println!("Orrery server starting...");
    println!("Client: http://{address}/");
    println!("Stream: ws://{address}{session_path}");
    println!();
    println!("Press Ctrl+C to stop the server");

    orrery_web::run_server(config).await?;
    Ok(())
}

/// Runs one bounded simulation and writes each batch to stdout.
///
/// The trailing partial batch is always printed.
///
/// # Errors
/// - Configuration is invalid or the run is unbounded
/// - The producer faults or stdout is closed
pub async fn simulate(config: OrreryConfig) -> anyhow::Result<()> {
    config.simulation.validate().map_err(anyhow::Error::msg)?;
    config.streaming.validate().map_err(anyhow::Error::msg)?;
    if config.simulation.step_count.is_none() {
        bail!("simulate needs a bounded step count (--steps > 0)");
    }

    let producer = FrameProducer::from_config(&config.simulation)
        .map_err(|err| describe(&OrreryError::from(err)))?;
    let mut handle = producer.spawn(config.streaming.channel_capacity);
    let batch_size = config.streaming.batch_size;

    let mut out = std::io::stdout();
    let mut batch = Vec::with_capacity(batch_size);
    while let Some(event) = handle.next_event().await {
        match event {
            ProducerEvent::Frame(frame) => {
                batch.push(frame);
                if batch.len() == batch_size {
                    writeln!(out, "{}", encode_batch(&batch)?)?;
                    batch.clear();
                }
            }
            ProducerEvent::Completed { steps } => {
                tracing::info!(steps, "Simulation completed");
            }
        }
    }
    if !batch.is_empty() {
        writeln!(out, "{}", encode_batch(&batch)?)?;
    }
    out.flush()?;

    let outcome = handle.shutdown().await?;
    tracing::debug!(steps = outcome.steps(), "Producer joined");
    Ok(())
}
