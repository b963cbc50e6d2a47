use super::{loaded, reply_from};
use crate::error::BotError;
use crate::plugins::todo::TodoPlugin;
use crate::services::todo::TodoError;
use crate::{Context, Error};
use std::sync::Arc;

fn todo_plugin(ctx: &Context<'_>) -> Result<Arc<TodoPlugin>, Error> {
    loaded(&ctx.data().plugins.todo, "todo")
}

/// Turns user mistakes into a reply and lets storage failures through.
fn user_facing(err: TodoError) -> Result<String, Error> {
    match err {
        TodoError::Io(_) | TodoError::Json(_) => Err(err.into()),
        other => Ok(format!("❌ {}", other)),
    }
}

/// Manage the shared to-do board
#[poise::command(
    slash_command,
    prefix_command,
    subcommands("add", "sub", "done", "delete", "list", "panel")
)]
pub async fn todo(ctx: Context<'_>) -> Result<(), Error> {
    ctx.say("Use `/todo add`, `sub`, `done`, `delete`, `list` or `panel`.")
        .await?;
    Ok(())
}

/// Add a task
#[poise::command(slash_command, prefix_command)]
pub async fn add(
    ctx: Context<'_>,
    #[description = "The task"] text: String,
    #[description = "Who owns it (defaults to you)"] owner: Option<String>,
) -> Result<(), Error> {
    let plugin = todo_plugin(&ctx)?;
    let owner = owner.unwrap_or_else(|| ctx.author().name.clone());
    let reply = match plugin.add(&text, &owner, None).await {
        Ok((at, item)) => format!("✅ Added `{}.` {}", at, item.text),
        Err(e) => user_facing(e)?,
    };
    ctx.say(reply).await?;
    plugin.refresh_quietly().await;
    Ok(())
}

/// Add a sub-task under an existing task
#[poise::command(slash_command, prefix_command)]
pub async fn sub(
    ctx: Context<'_>,
    #[description = "Parent position, e.g. 2 or 2.1"] parent: String,
    #[description = "The sub-task"]
    #[rest]
    text: String,
) -> Result<(), Error> {
    let plugin = todo_plugin(&ctx)?;
    let owner = ctx.author().name.clone();
    let reply = match plugin.add(&text, &owner, Some(&parent)).await {
        Ok((at, item)) => format!("✅ Added `{}.` {}", at, item.text),
        Err(e) => user_facing(e)?,
    };
    ctx.say(reply).await?;
    plugin.refresh_quietly().await;
    Ok(())
}

/// Mark a task as done
#[poise::command(slash_command, prefix_command)]
pub async fn done(
    ctx: Context<'_>,
    #[description = "Position, e.g. 2 or 2.1"] position: String,
) -> Result<(), Error> {
    let plugin = todo_plugin(&ctx)?;
    let reply = match plugin.complete(&position).await {
        Ok(item) => format!("🎉 Done: {}", item.text),
        Err(e) => user_facing(e)?,
    };
    ctx.say(reply).await?;
    plugin.refresh_quietly().await;
    Ok(())
}

/// Delete a task and its sub-tasks
#[poise::command(slash_command, prefix_command)]
pub async fn delete(
    ctx: Context<'_>,
    #[description = "Position, e.g. 2 or 2.1"] position: String,
) -> Result<(), Error> {
    let plugin = todo_plugin(&ctx)?;
    let reply = match plugin.delete(&position).await {
        Ok(item) => format!("🗑️ Removed: {}", item.text),
        Err(e) => user_facing(e)?,
    };
    ctx.say(reply).await?;
    plugin.refresh_quietly().await;
    Ok(())
}

/// Show the board here
#[poise::command(slash_command, prefix_command)]
pub async fn list(ctx: Context<'_>) -> Result<(), Error> {
    let plugin = todo_plugin(&ctx)?;
    let post = plugin.snapshot().await?;
    ctx.send(reply_from(post)).await?;
    Ok(())
}

/// Post or refresh the dashboard in the to-do channel
#[poise::command(slash_command, prefix_command)]
pub async fn panel(ctx: Context<'_>) -> Result<(), Error> {
    let plugin = todo_plugin(&ctx)?;
    let reply = match plugin.refresh_dashboard().await {
        Ok(message) => format!("📌 Dashboard is up to date (message {}).", message),
        Err(BotError::MissingConfig(key)) => format!("❌ {} is not set.", key),
        Err(BotError::NotFound(_)) => "❌ The to-do channel does not exist.".to_string(),
        Err(e) => return Err(e.into()),
    };
    ctx.send(poise::CreateReply::default().content(reply).ephemeral(true))
        .await?;
    Ok(())
}
