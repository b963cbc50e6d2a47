use poise::serenity_prelude::{CreateEmbed, User};
use std::time::Duration;

use super::loaded;
use crate::services::economy::{EconomyError, GambleOutcome, WorkOutcome};
use crate::{Context, Error};

/// Show a wallet balance
#[poise::command(slash_command, prefix_command)]
pub async fn balance(
    ctx: Context<'_>,
    #[description = "Whose wallet (defaults to yours)"] user: Option<User>,
) -> Result<(), Error> {
    let plugin = loaded(&ctx.data().plugins.economy, "economy")?;
    let user = user.as_ref().unwrap_or_else(|| ctx.author());
    let balance = plugin.service.balance(user.id.get()).await?;

    let embed = CreateEmbed::new()
        .title(format!("💰 {}'s wallet", user.name))
        .description(format!("**{}** credits", balance))
        .thumbnail(user.face())
        .color(0xf1c40f);
    ctx.send(poise::CreateReply::default().embed(embed)).await?;
    Ok(())
}

/// Work for a few credits
#[poise::command(slash_command, prefix_command)]
pub async fn work(ctx: Context<'_>) -> Result<(), Error> {
    let plugin = loaded(&ctx.data().plugins.economy, "economy")?;
    let reply = match plugin.service.work(ctx.author().id.get()).await? {
        WorkOutcome::Paid { earned, balance } => format!(
            "💼 You worked hard and earned **{}** credits. Balance: **{}**",
            earned, balance
        ),
        WorkOutcome::CoolingDown { remaining } => {
            let wait = Duration::from_secs(remaining.as_secs().max(1));
            format!(
                "⏳ You're worn out, rest for another {}.",
                humantime::format_duration(wait)
            )
        }
    };
    ctx.say(reply).await?;
    Ok(())
}

/// Bet credits on a coin flip
#[poise::command(slash_command, prefix_command)]
pub async fn gamble(
    ctx: Context<'_>,
    #[description = "How many credits to stake"] amount: i64,
) -> Result<(), Error> {
    let plugin = loaded(&ctx.data().plugins.economy, "economy")?;
    let reply = match plugin.service.gamble(ctx.author().id.get(), amount).await {
        Ok(GambleOutcome::Won { amount, balance }) => {
            format!("🎉 You won **{}** credits! Balance: **{}**", amount, balance)
        }
        Ok(GambleOutcome::Lost { amount, balance }) => {
            format!("💸 You lost **{}** credits. Balance: **{}**", amount, balance)
        }
        Err(EconomyError::NonPositiveStake) => "❌ The stake must be more than 0.".to_string(),
        Err(EconomyError::InsufficientFunds { balance, .. }) => {
            format!("❌ Not enough credits, you only have **{}**.", balance)
        }
        Err(e) => return Err(e.into()),
    };
    ctx.say(reply).await?;
    Ok(())
}
