pub mod animals;
pub mod chat;
pub mod economy;
pub mod general;
pub mod news;
pub mod shopping;
pub mod todo;
pub mod weather;

use std::sync::Arc;
use tracing::{error, warn};

use crate::poster::Post;
use crate::{Data, Error};

/// Looks up a loaded plugin. Commands are only registered for loaded plugins, so a miss
/// means the command list and the plugin table disagree.
pub(crate) fn loaded<T>(slot: &Option<Arc<T>>, name: &str) -> Result<Arc<T>, Error> {
    slot.clone()
        .ok_or_else(|| format!("the {} plugin is not loaded", name).into())
}

pub(crate) fn reply_from(post: Post) -> poise::CreateReply {
    let mut reply = poise::CreateReply::default().components(post.components);
    if let Some(content) = post.content {
        reply = reply.content(content);
    }
    for embed in post.embeds {
        reply = reply.embed(embed);
    }
    reply
}

/// Logs every command failure and answers with a generic apology.
pub async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!("Command /{} failed: {}", ctx.command().qualified_name, error);
            let _ = ctx
                .send(
                    poise::CreateReply::default()
                        .content("⚠️ Something went wrong, please try again later.")
                        .ephemeral(true),
                )
                .await;
        }
        poise::FrameworkError::ArgumentParse { error, input, ctx, .. } => {
            warn!("Bad arguments for /{}: {:?} ({})", ctx.command().qualified_name, input, error);
            let _ = ctx
                .say(format!("❌ I couldn't read that: {}", error))
                .await;
        }
        other => {
            if let Err(e) = poise::builtins::on_error(other).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}
