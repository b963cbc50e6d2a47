use poise::serenity_prelude::Attachment;

use super::loaded;
use crate::discord_text::split_for_discord;
use crate::{Context, Error};

/// Chat with the assistant, optionally about an image
#[poise::command(slash_command, prefix_command)]
pub async fn chat(
    ctx: Context<'_>,
    #[description = "An image for the assistant to look at"] image: Option<Attachment>,
    #[description = "Your message to the assistant"]
    #[rest]
    message: Option<String>,
) -> Result<(), Error> {
    let text = message.unwrap_or_default();
    if text.trim().is_empty() && image.is_none() {
        ctx.say("💬 Tell me something, or attach an image!").await?;
        return Ok(());
    }

    let plugin = loaded(&ctx.data().plugins.chat, "chat")?;
    ctx.defer().await?;

    let attachments: Vec<Attachment> = image.into_iter().collect();
    let answer = plugin.ask(&text, &attachments).await;
    for chunk in split_for_discord(&answer) {
        ctx.say(chunk).await?;
    }
    Ok(())
}
