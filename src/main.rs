use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use doi_pdf_api::config::{load_config, Config, Environment};
use doi_pdf_api::models::{Doi, Lookup};
use doi_pdf_api::server;
use doi_pdf_api::service::PaperService;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// DOI PDF API - Resolve DOIs to PDFs and extract their text
#[derive(Parser, Debug)]
#[command(name = "doi-pdf-api")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Resolve DOIs to PDFs, extract their text and serve both over HTTP", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the HTTP server (default)
    Serve {
        /// Address to bind (overrides server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides server.port)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Download the PDF for a DOI
    Fetch {
        /// DOI, e.g. 10.1145/3025453.3025501
        doi: String,

        /// Output file (defaults to <sanitized-doi>.pdf)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Print the text extracted from a DOI's PDF
    Text {
        doi: String,

        /// Print page-structured JSON instead of plain text
        #[arg(long)]
        structured: bool,
    },

    /// Print metadata for a DOI as JSON
    Metadata { doi: String },
}

fn init_tracing(cli: &Cli, config: &Config) {
    let level = if cli.quiet || config.environment == Environment::Test {
        "error"
    } else {
        match cli.verbose {
            0 => config.logging.level.as_str(),
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("doi_pdf_api={0},tower_http={0}", level)));
    let json = config.logging.format.as_deref() == Some("json");

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&cli, &config);

    match cli.command.unwrap_or(Commands::Serve {
        host: None,
        port: None,
    }) {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            tracing::info!(
                "Starting doi-pdf-api v{} in {:?} mode",
                doi_pdf_api::VERSION,
                config.environment
            );
            server::serve(&config).await?;
        }

        Commands::Fetch { doi, output } => {
            let doi = Doi::parse(&doi)?;
            let service = PaperService::from_config(&config)?;

            let Lookup::Found(bytes) = service.get_document(&doi).await? else {
                bail!("Paper not found for DOI {}", doi);
            };

            let path = output.unwrap_or_else(|| PathBuf::from(format!("{}.pdf", doi.file_stem())));
            tokio::fs::write(&path, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Saved {} bytes to {}", bytes.len(), path.display());
        }

        Commands::Text { doi, structured } => {
            let doi = Doi::parse(&doi)?;
            let service = PaperService::from_config(&config)?;

            if structured {
                let Lookup::Found(content) = service.get_structured_content(&doi).await? else {
                    bail!("Failed to extract structured content for DOI {}", doi);
                };
                println!("{}", serde_json::to_string_pretty(&content)?);
            } else {
                let Lookup::Found(text) = service.get_text(&doi).await? else {
                    bail!("Failed to extract text for DOI {}", doi);
                };
                println!("{}", text.text);
            }
        }

        Commands::Metadata { doi } => {
            let doi = Doi::parse(&doi)?;
            let service = PaperService::from_config(&config)?;

            let Lookup::Found(metadata) = service.get_metadata(&doi).await? else {
                bail!("Paper metadata not found for DOI {}", doi);
            };
            println!("{}", serde_json::to_string_pretty(&metadata)?);
        }
    }

    Ok(())
}
