// SPDX-License-Identifier: MIT

use clap::{Parser, Subcommand};
use dotenv::dotenv;
use instructflow_rs::error::FlowError;
use instructflow_rs::graph::{InMemoryCheckpointer, Snapshot, WorkflowEngine};
use instructflow_rs::server;
use instructflow_rs::settings::Settings;
use instructflow_rs::workflow::{
    build_instructions_graph, PlaceholderBackend, WorkflowConfig, WorkflowRegistry,
};

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve the start/poll HTTP API
    Serve {
        /// Address to bind, overrides HOST
        #[arg(long)]
        host: Option<String>,

        /// Port to bind, overrides PORT
        #[arg(short, long)]
        port: Option<u16>,

        /// YAML settings file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run one workflow in the foreground
    Run {
        /// JSON file with the workflow request
        #[arg(short, long)]
        input: PathBuf,

        /// YAML settings file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Install the global tracing subscriber, warning if one is already set
fn init_tracing() -> bool {
    match tracing::subscriber::set_global_default(tracing_subscriber::fmt().finish()) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Failed to install tracing subscriber: {}", e);
            false
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), FlowError> {
    dotenv().ok();
    env_logger::init();
    // `log` output goes through env_logger; tower-http spans through tracing.
    init_tracing();

    let args = Args::parse();

    match args.command {
        Commands::Serve { host, port, config } => {
            let mut settings = Settings::load(config.as_deref())?;
            if let Some(host) = host {
                settings.host = host;
            }
            if let Some(port) = port {
                settings.port = port;
            }
            log::info!("Loaded settings: {:?}", settings);

            let registry = WorkflowRegistry::for_backend(
                Arc::new(PlaceholderBackend),
                settings.execution_limits(),
            )?;
            server::serve(&settings, registry).await?;
        }
        Commands::Run { input, config } => {
            let settings = Settings::load(config.as_deref())?;
            let limits = settings.execution_limits();

            let payload: serde_json::Value =
                serde_json::from_str(&tokio::fs::read_to_string(&input).await?)?;
            let request = WorkflowConfig::from_json(payload)?;
            request.validate(limits.max_document_bytes)?;

            let graph = build_instructions_graph(Arc::new(PlaceholderBackend))?;
            let engine = WorkflowEngine::new(Arc::new(InMemoryCheckpointer::new()));

            let workflow_id = Uuid::new_v4().to_string();
            let mut state = graph.initial_state();
            request.populate(&mut state, &workflow_id, limits.max_refinement_attempts);

            let cancel = CancellationToken::new();
            if let Some(timeout) = limits.timeout {
                let token = cancel.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(timeout).await;
                    token.cancel();
                });
            }

            let (tx, mut rx) = mpsc::channel::<Snapshot>(16);
            let printer = tokio::spawn(async move {
                while let Some(snapshot) = rx.recv().await {
                    println!(
                        "[{}] {} (progress {})",
                        snapshot.step,
                        snapshot.stage,
                        snapshot.state.get_f64("progress").unwrap_or_default()
                    );
                }
            });

            println!("Running workflow: {}", workflow_id);
            let outcome = engine
                .execute(&graph, &workflow_id, state, &tx, &cancel)
                .await;
            drop(tx);
            if let Err(e) = printer.await {
                log::warn!("Snapshot printer stopped: {}", e);
            }

            match outcome {
                Ok(state) => {
                    println!("{}", serde_json::to_string_pretty(&state.to_json())?);
                }
                Err(failure) => {
                    println!("{}", serde_json::to_string_pretty(&failure.state.to_json())?);
                    return Err(failure.error.into());
                }
            }
        }
    }

    Ok(())
}
