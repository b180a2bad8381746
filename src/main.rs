use std::sync::Arc;

use community_bot::archive::{ArchivePipeline, MapResolver, TriggerRegistry};
use community_bot::channels::{Dispatcher, SignatureVerifier, SlackDispatcher};
use community_bot::config::BotConfig;
use community_bot::content::ContentService;
use community_bot::routes::{AppState, app_routes};
use community_bot::store::{LibSqlBackend, Repository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env()?;

    eprintln!("🤖 Community Bot v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Slack API: {}", config.slack_api_base);
    eprintln!("   Events: http://0.0.0.0:{}/slack/events", config.port);

    // ── Database ─────────────────────────────────────────────────────────
    let repo: Arc<dyn Repository> = Arc::new(LibSqlBackend::new_local(&config.db_path).await?);
    eprintln!("   Database: {}", config.db_path.display());

    // ── Collaborators ───────────────────────────────────────────────────
    let resolver = match &config.users_csv {
        Some(path) => MapResolver::from_csv_path(path)?,
        None => MapResolver::default(),
    };
    eprintln!("   Known users: {}", resolver.len());

    let dispatcher: Arc<dyn Dispatcher> = Arc::new(SlackDispatcher::new(
        config.slack_bot_token,
        config.slack_api_base.clone(),
    ));

    // ── Services ────────────────────────────────────────────────────────
    let content = Arc::new(
        ContentService::new(Arc::clone(&repo), Arc::clone(&dispatcher))
            .with_default_pass_count(config.default_pass_count),
    );
    let registry = Arc::new(TriggerRegistry::new(Arc::clone(&repo)));
    let pipeline = Arc::new(
        ArchivePipeline::new(
            Arc::clone(&repo),
            Arc::clone(&registry),
            Arc::new(resolver),
            Arc::clone(&dispatcher),
        )
        .with_reaction(config.archive_reaction.clone()),
    );

    let app = app_routes(AppState {
        content,
        registry,
        pipeline,
        verifier: Arc::new(SignatureVerifier::new(config.slack_signing_secret)),
    });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    tracing::info!(port = config.port, "HTTP server started");
    axum::serve(listener, app).await?;

    Ok(())
}
