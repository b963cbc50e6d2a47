use super::loaded;
use crate::broadcast::weather::forecast_embed;
use crate::services::weather::{ForecastSource, Place};
use crate::{Context, Error};

/// Today's forecast for a city (defaults to the first configured location)
#[poise::command(slash_command, prefix_command)]
pub async fn weather(
    ctx: Context<'_>,
    #[description = "City name"]
    #[rest]
    city: Option<String>,
) -> Result<(), Error> {
    let plugin = loaded(&ctx.data().plugins.weather, "weather")?;
    ctx.defer().await?;

    let city = city.map(|c| c.trim().to_string()).filter(|c| !c.is_empty());
    let place = match city {
        Some(name) => match plugin.service.geocode(&name).await? {
            Some(place) => place,
            None => {
                ctx.say(format!("🗺️ I couldn't find a place called {}.", name))
                    .await?;
                return Ok(());
            }
        },
        None => match ctx.data().config.broadcasts.weather.first() {
            Some(location) => Place {
                name: location.name.clone(),
                lat: location.lat,
                lon: location.lon,
            },
            None => {
                ctx.say("🗺️ Tell me which city, e.g. `/weather Taipei`.").await?;
                return Ok(());
            }
        },
    };

    let forecast = match plugin.service.today(place.lat, place.lon).await {
        Ok(forecast) => forecast,
        Err(e) => {
            tracing::warn!("Weather: forecast for {} failed: {}", place.name, e);
            ctx.say("⚠️ The weather service is unavailable right now.").await?;
            return Ok(());
        }
    };
    let title = format!("🌤️ Weather for {} ({})", place.name, forecast.date);
    ctx.send(poise::CreateReply::default().embed(forecast_embed(&title, &forecast, 0x3498db)))
        .await?;
    Ok(())
}
