// SPDX-License-Identifier: MIT

use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use postgen_rs::postgen::server::{self, AppState, SessionRegistry};
use postgen_rs::postgen::{AppConfig, GenerationOutcome, GenerationRequest, Runtime};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// YAML configuration file; environment variables override it
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Port to listen on (overrides API_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Generate one post and print it
    Generate {
        #[arg(short, long, default_value = "cli-user")]
        user: String,

        #[arg(short, long)]
        topic: String,

        #[arg(short, long, default_value = "linkedin")]
        platform: String,

        #[arg(long)]
        tone: Option<String>,

        #[arg(long)]
        content_type: Option<String>,

        #[arg(long)]
        max_refinements: Option<u32>,

        /// Accept the draft even when quality checks fail
        #[arg(long)]
        force_publish: bool,
    },
    /// Chunk, embed and index the documents in a directory
    Ingest {
        /// Defaults to DATA_DIR
        #[arg(short, long)]
        dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let mut config = AppConfig::load(args.config.as_deref()).context("loading configuration")?;

    match args.command {
        Commands::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            let server_config = config.server.clone();
            let runtime = Runtime::from_config(config)?;
            if !runtime.retriever.reload().await? {
                log::warn!("No vector index found; run `postgen ingest` before generating");
            }
            let state = AppState {
                generator: runtime.generator.clone(),
                memory: runtime.memory.clone(),
                retriever: runtime.retriever.clone(),
                sessions: SessionRegistry::new(),
                debug: server_config.debug,
            };
            server::serve(&server_config, state).await?;
        }
        Commands::Generate {
            user,
            topic,
            platform,
            tone,
            content_type,
            max_refinements,
            force_publish,
        } => {
            let runtime = Runtime::from_config(config)?;
            let session_id = format!(
                "session-{}-{}",
                user,
                &uuid::Uuid::new_v4().simple().to_string()[..8]
            );
            let request = GenerationRequest {
                user_id: user,
                session_id,
                topic,
                platform,
                tone,
                content_type,
                max_refinements,
                human_force_publish: force_publish,
                review: Some(false),
            };
            match runtime.generator.generate(request, None).await? {
                GenerationOutcome::Completed(result) => {
                    println!("{}", result.final_post);
                    eprintln!(
                        "\nwriter: {} | acceptance: {:?} | refinements: {} | failed checks: {:?}",
                        result.writer,
                        result.acceptance,
                        result.refinement_count,
                        result.quality_checks.failed()
                    );
                }
                GenerationOutcome::AwaitingReview { draft, .. } => {
                    println!("{}", draft);
                }
            }
        }
        Commands::Ingest { dir } => {
            let data_dir = dir.unwrap_or_else(|| config.ingest.data_dir.clone());
            let runtime = Runtime::from_config(config)?;
            let report = runtime
                .ingest_pipeline()
                .run(&data_dir)
                .await
                .with_context(|| format!("ingesting {}", data_dir.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
