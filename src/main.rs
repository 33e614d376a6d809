// src/main.rs
// Talkwire - streaming support-chat backend

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use talkwire::config::Config;
use talkwire::functions::CallDispatcher;
use talkwire::functions::email::{EmailSender, HttpEmailSender, NoopEmailSender};
use talkwire::llm::pipeline::CompletionPipeline;
use talkwire::llm::provider::OpenAiProvider;
use talkwire::retrieval::{DocumentRetriever, HttpRetriever, NoopRetriever};
use talkwire::db;
use talkwire::server::{AppState, create_router};

#[derive(Parser)]
#[command(name = "talkwire")]
#[command(about = "Streaming support-chat backend")]
#[command(version)]
struct Cli {
    /// Bind host, overrides TALKWIRE_HOST
    #[arg(long)]
    host: Option<String>,

    /// Bind port, overrides TALKWIRE_PORT
    #[arg(short, long)]
    port: Option<u16>,

    /// Log verbosity
    #[arg(long, env = "TALKWIRE_LOG", default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(cli.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = Config::from_env()?;
    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    let config = Arc::new(config);

    let pool = db::create_pool(&config.database_url).await?;
    db::init_schema(&pool).await?;

    let provider = Arc::new(OpenAiProvider::new(
        config.openai_api_key.clone(),
        config.openai_base_url.clone(),
    ));
    let emailer: Arc<dyn EmailSender> =
        match (&config.email_api_url, &config.email_api_key) {
            (Some(url), Some(key)) => Arc::new(HttpEmailSender::new(url.clone(), key.clone())),
            _ => Arc::new(NoopEmailSender),
        };
    let retriever: Arc<dyn DocumentRetriever> =
        match (&config.retrieval_api_url, &config.retrieval_api_key) {
            (Some(url), Some(key)) => Arc::new(HttpRetriever::new(url.clone(), key.clone())),
            _ => Arc::new(NoopRetriever),
        };

    let pipeline = Arc::new(CompletionPipeline::new(
        provider,
        CallDispatcher::new(emailer),
    ));
    let state = AppState::new(pool, config.clone(), pipeline, retriever);
    let router = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("talkwire listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}
