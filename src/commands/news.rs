use chrono::Utc;

use super::loaded;
use crate::broadcast::news::headline_embed;
use crate::services::news::HeadlineSource;
use crate::{Context, Error};

/// Latest headlines, optionally about a keyword
#[poise::command(slash_command, prefix_command)]
pub async fn news(
    ctx: Context<'_>,
    #[description = "Search keyword"]
    #[rest]
    keyword: Option<String>,
) -> Result<(), Error> {
    let plugin = loaded(&ctx.data().plugins.news, "news")?;
    ctx.defer().await?;

    let keyword = keyword.map(|k| k.trim().to_string()).filter(|k| !k.is_empty());
    let headlines = match plugin.service.headlines(keyword.as_deref()).await {
        Ok(headlines) => headlines,
        Err(e) => {
            tracing::warn!("News: search failed: {}", e);
            ctx.say("⚠️ The news feed is unavailable right now.").await?;
            return Ok(());
        }
    };
    if headlines.is_empty() {
        ctx.say("🤷 No news found.").await?;
        return Ok(());
    }

    let title = match &keyword {
        Some(k) => format!("🔎 News about {}", k),
        None => "📰 Top headlines".to_string(),
    };
    let today = Utc::now()
        .with_timezone(&ctx.data().config.utc_offset())
        .date_naive();
    let embed = headline_embed(&title, &headlines, today);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}
