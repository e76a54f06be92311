//! request-proxy binary.
//!
//! - `serve`: run the front controller over the configured mounts
//! - `fetch <url>`: forward one request and write the response to stdout
//!   (status line, headers, body) or save the body with `--output`

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use request_proxy::config::{load_config, ProxyConfig};
use request_proxy::filters::SaveToFile;
use request_proxy::frontend::ProxyServer;
use request_proxy::http::response::SaveOutcome;
use request_proxy::observability::logging;
use request_proxy::transport::ForwardTransport;
use request_proxy::{Pipeline, ProxyError, ProxyRequest};

#[derive(Parser)]
#[command(name = "request-proxy")]
#[command(about = "Filter-pipeline HTTP request proxy", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults apply when omitted.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the front controller
    Serve,
    /// Forward a single GET request
    Fetch {
        url: String,

        /// Save the body here instead of printing the response
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        user_agent: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    logging::init(&config.observability);

    match cli.command {
        Commands::Serve => serve(config).await?,
        Commands::Fetch {
            url,
            output,
            user_agent,
        } => fetch(&config, &url, output, user_agent).await?,
    }
    Ok(())
}

async fn serve(config: ProxyConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        mounts = config.mounts.len(),
        timeout_secs = config.transport.timeout_secs,
        "Configuration loaded"
    );

    let server = ProxyServer::new(&config)?;
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn fetch(
    config: &ProxyConfig,
    url: &str,
    output: Option<PathBuf>,
    user_agent: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let target = url::Url::parse(url).map_err(|e| ProxyError::InvalidUri(format!("{url}: {e}")))?;
    if !matches!(target.scheme(), "http" | "https") {
        return Err(ProxyError::InvalidUri(format!("{url}: expected http or https")).into());
    }

    let mut pipeline = Pipeline::new().with_transport(ForwardTransport::new(config.debug));
    if let Some(user_agent) = user_agent {
        pipeline = pipeline.set_user_agent(&user_agent);
    }
    if let Some(path) = &output {
        pipeline = pipeline.add_filter(SaveToFile::new(path));
    }

    let mut request = ProxyRequest::get(url);
    *request.options_mut() = config.transport.options();
    let response = pipeline.forward(Some(request)).await?;

    if response.is_miss() {
        tracing::warn!(url = %url, "Origin unreachable");
    }

    match response.saved().cloned() {
        Some(SaveOutcome::Written(bytes)) => {
            tracing::info!(bytes, code = response.code(), "Saved");
        }
        Some(SaveOutcome::Failed(reason)) => return Err(reason.into()),
        None => {
            let mut stdout = tokio::io::stdout();
            response.render(&mut stdout).await?;
        }
    }
    Ok(())
}
