use anyhow::{Context, Result};
use clap::Parser;
use qwiz_hub::{
    create_router, AppState, Config, DisabledGenerator, GeminiGenerator, MemoryStore,
    QuestionGenerator, QuizService, SessionHub, SessionStore,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "qwiz-hub", version, about = "Live lecture quiz hub")]
struct Args {
    /// Config file path (extension optional)
    #[arg(long, default_value = "config/qwiz-hub")]
    config: String,

    /// Override the bind address
    #[arg(long)]
    bind: Option<String>,

    /// Override the HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let mut cfg = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config))?;

    if let Some(bind) = args.bind {
        cfg.service.http.bind = bind;
    }
    if let Some(port) = args.port {
        cfg.service.http.port = port;
    }

    info!("Qwiz Hub v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let generator: Arc<dyn QuestionGenerator> = match cfg.llm.api_key.clone() {
        Some(key) if !key.trim().is_empty() => Arc::new(GeminiGenerator::new(&cfg.llm, key)),
        _ => {
            warn!("No LLM API key configured, question generation is disabled");
            Arc::new(DisabledGenerator)
        }
    };
    let store: Arc<dyn SessionStore> = Arc::new(MemoryStore::new());
    let quiz = Arc::new(QuizService::new(
        Arc::new(SessionHub::new()),
        store,
        generator,
        &cfg.session,
    ));

    let idle_timeout = Duration::from_secs(cfg.session.idle_timeout_secs);
    let reap_every = Duration::from_secs(cfg.session.reap_interval_secs.max(1));
    let reaper = Arc::clone(&quiz);
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(reap_every);
        loop {
            interval.tick().await;
            let reaped = reaper.reap_idle(idle_timeout).await;
            if !reaped.is_empty() {
                info!("Reaped {} idle session(s)", reaped.len());
            }
        }
    });

    let state = AppState::new(quiz).with_allowed_origins(cfg.service.http.allowed_origins.clone());
    let app = create_router(state);

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
        .context("HTTP server error")?;

    Ok(())
}
