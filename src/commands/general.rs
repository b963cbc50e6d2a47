use poise::serenity_prelude::CreateEmbed;

use crate::{Context, Error};

/// Check that the bot is alive
#[poise::command(slash_command, prefix_command)]
pub async fn hello(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say(format!("👋 Hello {}, I'm up and running!", ctx.author().name))
        .await?;
    Ok(())
}

/// Show which plugins loaded at startup
#[poise::command(slash_command, prefix_command)]
pub async fn plugins(ctx: Context<'_>) -> Result<(), Error> {
    let report = &ctx.data().load_report;

    let loaded = if report.loaded.is_empty() {
        "none".to_string()
    } else {
        report
            .loaded
            .iter()
            .map(|name| format!("✅ `{}`", name))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let mut embed = CreateEmbed::new()
        .title("🧩 Plugins")
        .color(0x5865f2)
        .field("Loaded", loaded, false);
    if !report.skipped.is_empty() {
        let skipped = report
            .skipped
            .iter()
            .map(|s| format!("⛔ `{}`: {}", s.name, s.reason))
            .collect::<Vec<_>>()
            .join("\n");
        embed = embed.field("Skipped", skipped, false);
    }

    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}
