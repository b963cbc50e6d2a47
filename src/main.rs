use axum::http::Method;
use axum::Json;
use cogbot::commands::{self, general};
use cogbot::gateway::HttpGateway;
use cogbot::host::PluginHost;
use cogbot::plugins::{self, Deps};
use cogbot::supervisor::TaskSupervisor;
use cogbot::{config::Config, Data};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = Config::from_env()?;
    info!("Configuration loaded: {:?}", config);
    let discord_token = config.discord_token.clone();

    let http_client = reqwest::Client::builder()
        .timeout(config.http_timeout())
        .build()?;
    let discord = Arc::new(serenity::Http::new(&discord_token));

    // Plugins register their routes and tasks here; nothing runs until serve/start
    let gateway = HttpGateway::new();
    let supervisor = Arc::new(TaskSupervisor::new());
    let deps = Deps {
        config: &config,
        http_client: http_client.clone(),
        discord,
    };
    let (plugins, report) = plugins::load_all(PluginHost::new(&gateway, &supervisor), &deps).await;

    let health_supervisor = supervisor.clone();
    let health_report = report.clone();
    gateway.register(Method::GET, "/health", move || {
        let supervisor = health_supervisor.clone();
        let report = health_report.clone();
        async move {
            Json(serde_json::json!({
                "status": "ok",
                "plugins": report,
                "tasks": supervisor.snapshot(),
            }))
        }
    })?;

    // The bot keeps running without its HTTP side
    match config.http_addr() {
        Ok(addr) => {
            if let Err(e) = gateway.serve(addr).await {
                error!("HTTP gateway failed to start: {}", e);
            }
        }
        Err(e) => error!("HTTP gateway disabled: {}", e),
    }

    let mut command_list = vec![general::hello(), general::plugins()];
    command_list.extend(plugins.commands());
    let prefix = config.command_prefix.clone();

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: command_list,
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(prefix),
                ..Default::default()
            },
            on_error: |error| Box::pin(commands::on_error(error)),
            event_handler: |ctx, event, _framework, data| {
                Box::pin(async move {
                    for plugin in &data.plugins.loaded {
                        if let Err(e) = plugin.on_event(ctx, event, data).await {
                            error!(
                                "Plugin {} failed on {}: {}",
                                plugin.name(),
                                event.snake_case_name(),
                                e
                            );
                        }
                    }
                    Ok(())
                })
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Bot is ready as {}", ready.user.name);
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                if let Err(e) = supervisor.start().await {
                    error!("Scheduled tasks failed to start: {:#}", e);
                }

                Ok(Data {
                    config,
                    http_client,
                    bot_id: ready.user.id.get(),
                    plugins,
                    load_report: report,
                })
            })
        })
        .build();

    let intents = serenity::GatewayIntents::non_privileged()
        | serenity::GatewayIntents::MESSAGE_CONTENT
        | serenity::GatewayIntents::GUILD_MESSAGES;

    let mut client = serenity::ClientBuilder::new(&discord_token, intents)
        .framework(framework)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create client: {}", e))?;

    info!("Starting bot...");
    if let Err(why) = client.start().await {
        error!("Client error: {:?}", why);
    }

    Ok(())
}
