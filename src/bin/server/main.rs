//! ID-Card OCR Server and CLI
//!
//! A cross-platform binary exposing the identity-document extraction
//! pipeline via CLI or HTTP server.
//!
//! # Usage
//!
//! ## CLI Mode
//! ```bash
//! idcard-ocr-server extract --url "https://example.com/card.jpg" --corner-model models/corner.onnx --field-model models/field.onnx --rec-model models/rec.onnx --charset models/charset.txt
//! idcard-ocr-server extract --file card.jpg --corner-model models/corner.onnx --field-model models/field.onnx --rec-model models/rec.onnx --charset models/charset.txt
//! ```
//!
//! ## Server Mode
//! ```bash
//! idcard-ocr-server serve --corner-model models/corner.onnx --field-model models/field.onnx --rec-model models/rec.onnx --charset models/charset.txt --port 8080
//! ```

mod cli;
mod config;
mod engine;
mod server;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

#[derive(Parser)]
#[command(name = "idcard-ocr-server")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Identity-document field extraction via CLI or HTTP server", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract fields from a single card photo via CLI
    Extract {
        /// URL of the image to process
        #[arg(long, conflicts_with = "file")]
        url: Option<String>,

        /// Local file path of the image to process
        #[arg(long, conflicts_with = "url")]
        file: Option<PathBuf>,

        /// Path to the corner landmark detection model
        #[arg(long = "corner-model", env = "IDCARD_CORNER_MODEL")]
        corner_model: PathBuf,

        /// Path to the field layout detection model
        #[arg(long = "field-model", env = "IDCARD_FIELD_MODEL")]
        field_model: PathBuf,

        /// Path to the text recognition model
        #[arg(long = "rec-model", env = "IDCARD_REC_MODEL")]
        rec_model: PathBuf,

        /// Path to the recognition character dictionary
        #[arg(long = "charset", env = "IDCARD_CHARSET")]
        charset: PathBuf,

        /// Output format (json, text, pretty)
        #[arg(long, default_value = "pretty")]
        output: String,

        /// Device to use (cpu, cuda, cuda:0, etc.)
        #[arg(long, default_value = "cpu", env = "IDCARD_DEVICE")]
        device: String,

        /// Directory to persist field crops under, namespaced by request id
        #[arg(long = "crop-dump-dir", env = "IDCARD_CROP_DUMP_DIR")]
        crop_dump_dir: Option<PathBuf>,
    },
    /// Start the HTTP server
    Serve {
        /// Path to the corner landmark detection model
        #[arg(long = "corner-model", env = "IDCARD_CORNER_MODEL")]
        corner_model: PathBuf,

        /// Path to the field layout detection model
        #[arg(long = "field-model", env = "IDCARD_FIELD_MODEL")]
        field_model: PathBuf,

        /// Path to the text recognition model
        #[arg(long = "rec-model", env = "IDCARD_REC_MODEL")]
        rec_model: PathBuf,

        /// Path to the recognition character dictionary
        #[arg(long = "charset", env = "IDCARD_CHARSET")]
        charset: PathBuf,

        /// Port to listen on
        #[arg(long, short, default_value = "8080", env = "IDCARD_PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0", env = "IDCARD_HOST")]
        host: String,

        /// Device to use (cpu, cuda, cuda:0, etc.)
        #[arg(long, default_value = "cpu", env = "IDCARD_DEVICE")]
        device: String,

        /// Directory to persist field crops under, namespaced by request id
        #[arg(long = "crop-dump-dir", env = "IDCARD_CROP_DUMP_DIR")]
        crop_dump_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize tracing
    idcard_ocr::utils::init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract {
            url,
            file,
            corner_model,
            field_model,
            rec_model,
            charset,
            output,
            device,
            crop_dump_dir,
        } => {
            let config = config::ExtractorConfig {
                corner_model,
                field_model,
                rec_model,
                charset,
                device,
                crop_dump_dir,
            };

            if let Some(url) = url {
                info!("Processing URL: {}", url);
                cli::process_url(&url, &config, &output).await?;
            } else if let Some(file) = file {
                info!("Processing file: {}", file.display());
                cli::process_file(&file, &config, &output)?;
            } else {
                eprintln!("Error: Either --url or --file must be provided");
                std::process::exit(1);
            }
        }
        Commands::Serve {
            corner_model,
            field_model,
            rec_model,
            charset,
            port,
            host,
            device,
            crop_dump_dir,
        } => {
            let config = config::ServerConfig {
                extractor: config::ExtractorConfig {
                    corner_model,
                    field_model,
                    rec_model,
                    charset,
                    device,
                    crop_dump_dir,
                },
                host,
                port,
            };

            info!("Starting server on {}:{}", config.host, config.port);
            server::run_server(config).await?;
        }
    }

    Ok(())
}
