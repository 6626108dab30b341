use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{error, info};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use docrag::config::RagConfig;
use docrag::document::UploadedFile;
use docrag::rag::build_pipeline;
use docrag::web;

/// Retrieval-augmented question answering over a folder of PDF/DOCX files
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Folder scanned for .pdf/.docx files (overrides RAG_DATA_DIR)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer a single question and exit
    Ask {
        question: String,
        /// Answer from these files instead of the data folder
        #[arg(long = "file")]
        files: Vec<PathBuf>,
    },
    /// Interactive question loop on the terminal
    Chat,
    /// Serve the browser chat UI
    Serve {
        #[arg(long, default_value = "127.0.0.1:8501")]
        bind: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    let mut config = RagConfig::from_env().context("Invalid configuration")?;
    if let Some(data_dir) = args.data_dir {
        config.data_dir = data_dir;
    }

    let mut pipeline = build_pipeline(config).context("Failed to initialize pipeline")?;

    match args.command {
        Command::Ask { question, files } => {
            let uploads = files
                .iter()
                .map(|path| read_upload(path))
                .collect::<Result<Vec<_>>>()?;

            let result = pipeline.answer(&question, &uploads).await.map_err(|e| {
                error!("Query failed: {:#}", e);
                e
            })?;

            println!("{}", result.answer);
            if let Some(source) = result.source {
                println!("Source: {}", source);
            }
        }
        Command::Chat => {
            pipeline
                .run_query_loop()
                .await
                .context("Error in query loop")?;
        }
        Command::Serve { bind } => {
            info!("Starting chat UI on {}", bind);
            web::serve(pipeline, bind).await?;
        }
    }

    Ok(())
}

/// Read a file from disk the way the UI would hand it over
fn read_upload(path: &Path) -> Result<UploadedFile> {
    let bytes = fs::read(path).with_context(|| format!("File not found: {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .context("Invalid file name")?;
    Ok(UploadedFile::new(name, bytes))
}
