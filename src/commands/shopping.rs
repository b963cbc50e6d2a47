use super::{loaded, reply_from};
use crate::plugins::shopping::ShoppingPlugin;
use crate::{Context, Error};

/// Search PChome for products
#[poise::command(slash_command, prefix_command)]
pub async fn shop(
    ctx: Context<'_>,
    #[description = "What to look for"]
    #[rest]
    keyword: String,
) -> Result<(), Error> {
    let plugin = loaded(&ctx.data().plugins.shopping, "shopping")?;
    let keyword = keyword.trim();
    if keyword.is_empty() {
        ctx.say("🛒 What should I look for?").await?;
        return Ok(());
    }
    ctx.defer().await?;

    let products = match plugin.search(keyword).await {
        Ok(products) => products,
        Err(e) => {
            tracing::warn!("Shopping: search for {:?} failed: {}", keyword, e);
            ctx.say("⚠️ The shop search is unavailable right now.").await?;
            return Ok(());
        }
    };
    if products.is_empty() {
        ctx.say(format!("❌ Nothing found for “{}”.", keyword)).await?;
        return Ok(());
    }

    let (pager, post) = ShoppingPlugin::first_page(products);
    let handle = ctx.send(reply_from(post)).await?;
    let message = handle.message().await?;
    plugin.track(message.id, pager);
    Ok(())
}
