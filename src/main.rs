use clap::{Parser, Subcommand};
use dataselectie::pipeline::config::Config;
use dataselectie::pipeline::export::{encode_csv, ExportEngine};
use dataselectie::pipeline::hydrate::Hydrator;
use dataselectie::pipeline::query::compile_listing;
use dataselectie::{build_state, parse_params, DataSource};
use futures::TryStreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;

#[derive(Parser)]
#[command(name = "dataselectie", about = "Faceted search, listings and CSV export over the registry index")]
struct Cli {
    /// Configuration file layered over the built-in defaults.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON fixtures backing the record and geometry stores.
    #[arg(long, global = true, default_value = "fixtures/amsterdam.json")]
    data: PathBuf,

    /// Search the configured Elasticsearch cluster instead of the fixture index.
    #[arg(long, global = true)]
    elastic: bool,

    /// Write debug logs to /tmp/dataselectie-debug.log (tail -f to inspect).
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API.
    Serve,
    /// Print one listing page as JSON.
    List {
        surface: String,
        /// Request parameters as key=value.
        params: Vec<String>,
    },
    /// Stream the full match set as CSV to stdout.
    Export { surface: String, params: Vec<String> },
    /// Print the compiled search document without running it.
    Explain {
        surface: String,
        params: Vec<String>,
        /// Show the export document (no aggregations, no window).
        #[arg(long)]
        export: bool,
    },
}

fn init_logging(debug: bool) -> anyhow::Result<()> {
    let filter = |default: &str| {
        tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default))
    };
    if debug {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open("/tmp/dataselectie-debug.log")?;
        tracing_subscriber::fmt()
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .with_env_filter(filter("debug"))
            .init();
        tracing::info!("dataselectie debug log started, tail -f /tmp/dataselectie-debug.log");
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter("info"))
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug)?;

    let config = Config::load(cli.config.as_deref())?;
    let source = DataSource {
        fixtures: cli.data,
        elastic: cli.elastic,
    };

    match cli.command {
        Command::Serve => {
            let state = build_state(config, &source)?;
            dataselectie::api::serve(Arc::new(state)).await
        }
        Command::List { surface, params } => {
            let state = build_state(config, &source)?;
            let surface = state.surfaces.get(&surface)?;
            let params = parse_params(&params)?;
            let hydrator = Hydrator::new(state.backend.as_ref(), state.store.as_ref(), &state.config.search);
            let listing = hydrator.list(&surface, &params).await?;
            println!("{}", serde_json::to_string_pretty(&listing)?);
            Ok(())
        }
        Command::Export { surface, params } => {
            let state = build_state(config, &source)?;
            let surface = state.surfaces.get(&surface)?;
            let params = parse_params(&params)?;
            let engine = ExportEngine::new(
                Arc::clone(&state.backend),
                Arc::clone(&state.store),
                state.config.export.batch_size,
            );
            let rows = engine.start(surface, &params).await?;
            let chunks = encode_csv(rows, state.config.export.delimiter)?;
            let mut chunks = std::pin::pin!(chunks);
            let mut out = tokio::io::stdout();
            while let Some(chunk) = chunks.try_next().await? {
                out.write_all(&chunk).await?;
            }
            out.flush().await?;
            Ok(())
        }
        Command::Explain { surface, params, export } => {
            let surfaces = dataselectie::pipeline::Surfaces::from_config(&config)?;
            let surface = surfaces.get(&surface)?;
            let params = parse_params(&params)?;
            let document = if export {
                ExportEngine::document(&surface, &params)
            } else {
                compile_listing(&surface, &params, &config.search).document
            };
            println!("{}", serde_json::to_string_pretty(&document)?);
            Ok(())
        }
    }
}
