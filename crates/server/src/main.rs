//! anchora server binary: stdio tool-call protocol by default, HTTP/SSE on
//! request.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Transport {
    /// Line-framed JSON-RPC on stdin/stdout.
    Stdio,
    /// HTTP with an SSE channel on a TCP port.
    Http,
}

#[derive(Parser, Debug)]
#[command(name = "anchora")]
#[command(about = "Contextual retrieval and grounding engine")]
#[command(version)]
struct Cli {
    /// Path to the YAML configuration bundle.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the data directory from the config.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Which transport to serve.
    #[arg(long, value_enum, default_value_t = Transport::Stdio)]
    transport: Transport,

    /// Verbose logging (debug level).
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = server::load_config(cli.config.as_deref())?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }

    let log_level = if cli.verbose {
        "debug"
    } else {
        &config.server.log_level
    };
    server::init_tracing(log_level);

    let ctx = Arc::new(server::CoreContext::build(config)?);
    match cli.transport {
        Transport::Stdio => server::run_stdio(ctx).await,
        Transport::Http => server::run_http(ctx).await,
    }
}
