use std::io::Write;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::info;

use quotecard::{RenderConfig, RenderRequest, RenderService, MAX_LOAD_TIMEOUT_MS};

/// Render quote cards to PNG with headless Chrome
#[derive(Parser, Debug)]
#[command(name = "quotecard", version, about, args_conflicts_with_subcommands = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    #[command(flatten)]
    serve: ServeArgs,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API (the default)
    Serve(ServeArgs),
    /// Render a single card to a file and exit
    Render(RenderArgs),
}

#[derive(Args, Debug, Clone)]
struct EngineArgs {
    /// Browser binary to launch instead of the auto-detected Chrome
    #[arg(long, env = "CHROME_PATH")]
    chrome_path: Option<PathBuf>,

    /// Run Chrome without its sandbox (needed in most containers)
    #[arg(long, env = "QUOTECARD_NO_SANDBOX")]
    no_sandbox: bool,

    /// Budget for the page to go network-idle, in milliseconds
    #[arg(long, env = "QUOTECARD_LOAD_TIMEOUT_MS", default_value_t = MAX_LOAD_TIMEOUT_MS)]
    load_timeout_ms: u64,
}

impl EngineArgs {
    fn config(&self) -> RenderConfig {
        RenderConfig {
            chrome_path: self.chrome_path.clone(),
            sandbox: !self.no_sandbox,
            load_timeout_ms: self.load_timeout_ms,
            ..Default::default()
        }
    }
}

#[derive(Args, Debug, Clone)]
struct ServeArgs {
    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    host: std::net::IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    port: u16,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Display name
    #[arg(long)]
    name: String,

    /// Handle, with or without the leading @
    #[arg(long)]
    handle: String,

    /// Message text; `\n` sequences are kept as line breaks
    #[arg(long)]
    tweet: String,

    /// Avatar as an http(s) URL or data:image URI
    #[arg(long)]
    profile_image: Option<String>,

    /// Background as an http(s) URL or data:image URI
    #[arg(long)]
    background: Option<String>,

    /// Where to write the PNG
    #[arg(short, long, default_value = "twitter-quote.png")]
    output: PathBuf,

    #[command(flatten)]
    engine: EngineArgs,
}

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {:<5} {}",
                buf.timestamp_millis(),
                record.level(),
                record.args()
            )
        })
        .init();
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let config = args.engine.config();
    let engine = quotecard::new_engine(config.clone()).context("invalid render configuration")?;
    let service = Arc::new(RenderService::new(engine, config.target));
    let app = quotecard::server::router(service);

    let addr = SocketAddr::new(args.host, args.port);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("API running on http://{}", addr);
    info!("Health check: http://{}/", addr);
    info!("Generate endpoint: http://{}/api/generate-tweet", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;
    Ok(())
}

async fn render(args: RenderArgs) -> anyhow::Result<()> {
    let config = args.engine.config();
    let engine = quotecard::new_engine(config.clone()).context("invalid render configuration")?;
    let service = RenderService::new(engine, config.target);

    let mut request = RenderRequest::new(args.name, args.handle, args.tweet.replace("\\n", "\n"));
    request.profile_image = args.profile_image;
    request.background = args.background;

    let image = service.handle(request).await?;
    std::fs::write(&args.output, image.as_bytes())
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    info!("Wrote {} ({} bytes)", args.output.display(), image.len());
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();

    match cli.command {
        Some(Command::Render(args)) => render(args).await,
        Some(Command::Serve(args)) => serve(args).await,
        None => serve(cli.serve).await,
    }
}
