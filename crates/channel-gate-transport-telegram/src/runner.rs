use crate::bot::handlers::{
    self, handle_channel_post, handle_recheck_callback, Command,
};
use crate::config::BotSettings;
use crate::platform::TelegramPlatform;
use channel_gate_core::gateway::AccessGateway;
use channel_gate_core::membership::{MembershipCache, MembershipOracle, RetryPolicy};
use channel_gate_core::registry::MediaRegistry;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use tracing::{error, info};

/// Run the Telegram transport runtime.
pub async fn run_bot(settings: Arc<BotSettings>) {
    let bot = Bot::new(settings.telegram.telegram_token.clone());
    let platform = Arc::new(TelegramPlatform::new(bot.clone(), &settings.gate));
    let gateway = init_gateway(&settings, platform.clone());
    let handler = setup_handler();

    let gate = &settings.gate;
    info!("Main channel: {}", gate.gated_channel().label());
    info!("Content channel ID: {}", gate.content_channel_id);
    info!("Bot username: @{}", gate.bot_username.trim_start_matches('@'));
    info!("Bot is running...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![settings, platform, gateway])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

fn init_gateway(settings: &BotSettings, platform: Arc<TelegramPlatform>) -> Arc<AccessGateway> {
    let gate = &settings.gate;
    info!(
        "Initializing MembershipCache (ttl: {}s, max_size: {})",
        gate.membership_cache_ttl_secs, gate.membership_cache_max_size
    );
    let cache = Arc::new(MembershipCache::new(
        gate.membership_cache_ttl_secs,
        gate.membership_cache_max_size,
    ));
    let oracle = Arc::new(MembershipOracle::new(
        platform.clone(),
        cache,
        RetryPolicy::from_settings(gate),
    ));
    let registry = Arc::new(MediaRegistry::new(gate.content_channel_id));

    Arc::new(AccessGateway::new(oracle, registry, platform, gate.clone()))
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(Update::filter_channel_post().endpoint(handle_post))
        .branch(
            Update::filter_message()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    gateway: Arc<AccessGateway>,
    platform: Arc<TelegramPlatform>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start(payload) => handlers::start(msg, payload, gateway).await,
        Command::Debug => handlers::debug_info(bot, msg, gateway, platform).await,
        Command::TestChannel => handlers::test_channel(bot, msg, platform).await,
        Command::ClearCache => handlers::clear_cache(bot, msg, gateway).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    gateway: Arc<AccessGateway>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handle_recheck_callback(bot, q, gateway).await {
        error!("Callback handler error: {}", e);
    }
    respond(())
}

async fn handle_post(msg: Message, gateway: Arc<AccessGateway>) -> Result<(), teloxide::RequestError> {
    if let Err(e) = handle_channel_post(msg, gateway).await {
        error!("Channel post handler error: {}", e);
    }
    respond(())
}
