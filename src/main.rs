use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use babelcast::config::Config;
use babelcast::pipeline::{PipelineConfig, Scheduler, StatsMonitor};
use babelcast::session::{RegistryLimits, ServerStats, SessionRegistry};
use babelcast::translate::{
    GoogleProvider, MyMemoryProvider, RouterConfig, TranslationProvider, TranslationRouter,
};
use babelcast::ws::{create_router, AppState};
use babelcast::RemoteWhisperEngine;

#[derive(Parser, Debug)]
#[command(name = "babelcast", about = "Real-time multilingual meeting server")]
struct Cli {
    /// Config file path (extension resolved by the loader)
    #[arg(long, default_value = "config/babelcast")]
    config: String,

    /// Override the bind address from the config file
    #[arg(long)]
    host: Option<String>,

    /// Override the listen port from the config file
    #[arg(long)]
    port: Option<u16>,

    /// Override the session capacity from the config file
    #[arg(long)]
    max_sessions: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)
        .with_context(|| format!("failed to load config '{}'", cli.config))?;

    let bind = cli.host.unwrap_or(cfg.service.ws.bind);
    let port = cli.port.unwrap_or(cfg.service.ws.port);
    let max_sessions = cli.max_sessions.unwrap_or(cfg.limits.max_sessions);

    info!("{} starting", cfg.service.name);
    info!("engine endpoint: {} (model {})", cfg.engine.base_url, cfg.engine.model);

    let stats = Arc::new(ServerStats::new());
    let registry = Arc::new(SessionRegistry::new(
        RegistryLimits {
            max_sessions,
            queue_capacity: cfg.limits.queue_capacity,
        },
        Arc::clone(&stats),
    ));

    // The engine is required; the server has nothing to do without it.
    let engine = Arc::new(
        RemoteWhisperEngine::new(&cfg.engine).context("failed to build speech engine client")?,
    );

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.translation.request_timeout_secs))
        .build()
        .context("failed to build translation HTTP client")?;
    let providers: Vec<Arc<dyn TranslationProvider>> = vec![
        Arc::new(GoogleProvider::new(http.clone())),
        Arc::new(MyMemoryProvider::new(http)),
    ];
    let translator = Arc::new(TranslationRouter::new(
        providers,
        RouterConfig {
            cache_capacity: cfg.translation.cache_capacity,
            request_timeout: Duration::from_secs(cfg.translation.request_timeout_secs),
        },
    ));

    let scheduler = Arc::new(Scheduler::new(
        Arc::clone(&registry),
        engine,
        Arc::clone(&translator),
        Arc::clone(&stats),
        PipelineConfig {
            batch_size: cfg.limits.batch_size,
            workers: cfg.limits.workers,
            min_quality: cfg.audio.min_quality,
            sample_rate: cfg.audio.sample_rate,
            engine_timeout: Duration::from_secs(cfg.engine.timeout_secs),
            ..PipelineConfig::default()
        },
    ));
    tokio::spawn(Arc::clone(&scheduler).run());

    let monitor = StatsMonitor::new(Arc::clone(&registry), Arc::clone(&stats));
    tokio::spawn(monitor.run());

    let state = AppState {
        registry,
        stats,
        translator,
        model: cfg.engine.model,
    };
    let app = create_router(state);

    let addr = format!("{}:{}", bind, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("listening on ws://{}/ws", addr);

    axum::serve(listener, app)
        .await
        .context("server terminated")?;

    Ok(())
}
