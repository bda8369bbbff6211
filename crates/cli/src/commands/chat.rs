//! `planbot chat` — Interactive or single-message chat mode.

use std::sync::Arc;

use planbot_agent::{Bot, CommandInterceptor, planner};
use planbot_capabilities::{AzureSearchIndex, BingWebSearch, CapabilityServices, SqliteSqlBackend};
use planbot_channels::{CLI_CHAT_ID, CliChannel, cli::parse_line};
use planbot_config::AppConfig;
use planbot_core::channel::{Channel, Replier};
use planbot_core::service::SqlBackend;
use planbot_core::store::InMemoryConversationStore;
use planbot_providers::AzureTranslator;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::languages::language_table;

/// Wire the external services named in configuration.
///
/// Services that are not configured are left out; a SQL database that
/// cannot be opened is logged and left out too.
pub async fn build_services(config: &AppConfig) -> Result<CapabilityServices, Box<dyn std::error::Error>> {
    let router = planbot_providers::build_from_config(config);
    let provider = router.default().ok_or("No default provider configured")?;
    let images = router
        .image_generator(&config.image_model)
        .ok_or("No provider available for image generation")?;

    let sql: Option<Arc<dyn SqlBackend>> = match &config.sql.database_url {
        Some(url) => match SqliteSqlBackend::connect(url).await {
            Ok(backend) => Some(Arc::new(backend)),
            Err(e) => {
                warn!(error = %e, "SQL backend unavailable, query_database disabled");
                None
            }
        },
        None => None,
    };

    let documents = AzureSearchIndex::from_config(&config.search);
    let embedder = documents.as_ref().map(|_| provider.clone());

    Ok(CapabilityServices {
        provider,
        chat_model: config.chat_model.clone(),
        system_message: config.bot.system_message.clone(),
        images,
        sql,
        documents,
        embedder,
        embedding_model: config.embedding_model.clone(),
        web: BingWebSearch::from_config(&config.web_search),
    })
}

/// Assemble the bot from configuration.
pub async fn build_bot(config: &AppConfig) -> Result<Bot, Box<dyn std::error::Error>> {
    let services = build_services(config).await?;
    let planner = planner::from_config(config, services.provider.clone());

    let translator = AzureTranslator::from_config(&config.translator);
    if translator.is_none() {
        info!("Translator not configured, translation commands will be declined");
    }
    let interceptor = CommandInterceptor::new(Arc::new(language_table(config)), translator);

    Ok(Bot::new(
        &config.bot,
        services,
        planner,
        interceptor,
        Arc::new(InMemoryConversationStore::new()),
    ))
}

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Check for API key early — give a clear error
    if !config.has_api_key() {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    PLANBOT_API_KEY = 'sk-...'");
        eprintln!("    OPENAI_API_KEY  = 'sk-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let bot = Arc::new(build_bot(&config).await?);
    let channel: Arc<dyn Channel> = Arc::new(CliChannel::new());
    let cancel = CancellationToken::new();

    if let Some(text) = message {
        // Single message mode
        let msg = parse_line(channel.id(), &text).ok_or("Message is empty")?;
        let replier = Replier::new(channel.clone(), CLI_CHAT_ID);
        bot.handle_message(&msg, &replier, &cancel).await;
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  planbot — Interactive Mode");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.chat_model);
    println!("  Planner:   {:?}", config.bot.planner);
    println!();
    println!("  Type your message and press Enter.");
    println!("  '/upload <path>' attaches a file. Type 'exit' or Ctrl+C to quit.");
    println!();

    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            interrupt.cancel();
        }
    });

    bot.run(channel, cancel).await?;

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}
