use poise::serenity_prelude::CreateEmbed;

use super::loaded;
use crate::services::animals::Animal;
use crate::{Context, Error};

async fn send_animal(ctx: Context<'_>, animal: Animal) -> Result<(), Error> {
    let plugin = loaded(&ctx.data().plugins.animals, "animals")?;
    ctx.defer().await?;

    let (title, color) = match animal {
        Animal::Cat => ("🐱 Meow!", 0xe67e22),
        Animal::Dog => ("🐶 Woof!", 0x8b4513),
    };
    match plugin.service.random_image(animal).await {
        Ok(url) => {
            let embed = CreateEmbed::new().title(title).image(url).color(color);
            ctx.send(poise::CreateReply::default().embed(embed)).await?;
        }
        Err(e) => {
            tracing::warn!("Animals: {:?} image failed: {}", animal, e);
            ctx.say("😿 No picture this time, try again in a moment.").await?;
        }
    }
    Ok(())
}

/// A random cat picture
#[poise::command(slash_command, prefix_command)]
pub async fn cat(ctx: Context<'_>) -> Result<(), Error> {
    send_animal(ctx, Animal::Cat).await
}

/// A random dog picture
#[poise::command(slash_command, prefix_command)]
pub async fn dog(ctx: Context<'_>) -> Result<(), Error> {
    send_animal(ctx, Animal::Dog).await
}
