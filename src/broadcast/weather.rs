use async_trait::async_trait;
use serenity::all::{ChannelId, CreateEmbed, CreateEmbedFooter};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::{Broadcaster, FeedDiff, SeenCache, TickOutcome};
use crate::config::WeatherLocation;
use crate::poster::{ChannelPoster, Post};
use crate::services::weather::{Forecast, ForecastSource};

pub fn forecast_embed(title: &str, forecast: &Forecast, color: u32) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(title)
        .color(color)
        .field("Conditions", forecast.condition, false)
        .field(
            "Temperature",
            format!("{}°C ~ {}°C", forecast.temp_min, forecast.temp_max),
            true,
        )
        .field("Chance of rain", format!("{}%", forecast.rain_chance), true);
    if forecast.needs_umbrella() {
        embed = embed.footer(CreateEmbedFooter::new("☔ Bring an umbrella!"));
    }
    embed
}

struct Target {
    location: WeatherLocation,
    channel: ChannelId,
}

/// Morning forecast for each configured location, once per forecast date.
pub struct WeatherDigest {
    source: Arc<dyn ForecastSource>,
    poster: Arc<dyn ChannelPoster>,
    targets: Vec<Target>,
    pause: Duration,
    seen: SeenCache,
}

impl WeatherDigest {
    /// Locations without their own channel post to `default_channel`; if neither is set
    /// the location is left out.
    pub fn new(
        source: Arc<dyn ForecastSource>,
        poster: Arc<dyn ChannelPoster>,
        locations: Vec<WeatherLocation>,
        default_channel: Option<u64>,
        pause: Duration,
    ) -> Self {
        let targets = locations
            .into_iter()
            .filter_map(|location| {
                let Some(channel) = location.channel_id.or(default_channel) else {
                    warn!("Weather: no channel for {}, skipping it", location.name);
                    return None;
                };
                Some(Target {
                    location,
                    channel: ChannelId::new(channel),
                })
            })
            .collect();

        Self {
            source,
            poster,
            targets,
            pause,
            seen: SeenCache::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    async fn poll(&self, target: &Target) -> anyhow::Result<TickOutcome> {
        let location = &target.location;
        let forecast = self.source.today(location.lat, location.lon).await?;

        match self.seen.diff(&location.name, vec![forecast], |f| f.date.as_str()) {
            FeedDiff::Seed(_) => Ok(TickOutcome::Seeded),
            FeedDiff::Unchanged => Ok(TickOutcome::Skipped),
            FeedDiff::Fresh(forecasts) => {
                let mut sent = 0;
                for forecast in forecasts {
                    let title = format!("📅 Good morning! Today's weather ({})", location.name);
                    let embed = forecast_embed(&title, &forecast, 0xff9900);
                    self.poster.post(target.channel, Post::embed(embed)).await?;
                    self.seen.record(&location.name, &forecast.date);
                    info!("Weather: sent {} forecast for {}", location.name, forecast.date);
                    sent += 1;
                }
                Ok(TickOutcome::Dispatched(sent))
            }
        }
    }
}

#[async_trait]
impl Broadcaster for WeatherDigest {
    fn name(&self) -> &'static str {
        "weather"
    }

    async fn tick(&self) -> anyhow::Result<TickOutcome> {
        let mut outcome = TickOutcome::Skipped;
        let mut failures = 0;

        for (i, target) in self.targets.iter().enumerate() {
            if i > 0 && !self.pause.is_zero() {
                tokio::time::sleep(self.pause).await;
            }
            match self.poll(target).await {
                Ok(o) => outcome = outcome.combine(o),
                Err(e) => {
                    warn!("Weather: {} failed: {:#}", target.location.name, e);
                    failures += 1;
                }
            }
        }

        if failures > 0 && failures == self.targets.len() {
            anyhow::bail!("weather failed for all {} location(s)", failures);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use crate::test_support::RecordingPoster;
    use std::sync::Mutex;

    struct FakeForecast {
        date: Mutex<&'static str>,
        rain: u32,
    }

    #[async_trait]
    impl ForecastSource for FakeForecast {
        async fn today(&self, _lat: f64, _lon: f64) -> Result<Forecast, BotError> {
            Ok(Forecast {
                date: self.date.lock().unwrap().to_string(),
                condition: "🌧️ Rain",
                temp_min: 21.0,
                temp_max: 26.5,
                rain_chance: self.rain,
            })
        }
    }

    fn location(name: &str, channel_id: Option<u64>) -> WeatherLocation {
        WeatherLocation {
            name: name.to_string(),
            lat: 25.0,
            lon: 121.5,
            channel_id,
        }
    }

    #[tokio::test]
    async fn test_one_forecast_per_location_and_date() {
        let source = Arc::new(FakeForecast {
            date: Mutex::new("2026-10-15"),
            rain: 80,
        });
        let poster = Arc::new(RecordingPoster::new());
        let digest = WeatherDigest::new(
            source.clone(),
            poster.clone(),
            vec![location("Taipei", None), location("Keelung", Some(77))],
            Some(5),
            Duration::ZERO,
        );

        assert_eq!(digest.tick().await.unwrap(), TickOutcome::Seeded);
        assert_eq!(digest.tick().await.unwrap(), TickOutcome::Skipped);

        *source.date.lock().unwrap() = "2026-10-16";
        assert_eq!(digest.tick().await.unwrap(), TickOutcome::Dispatched(2));

        let posts = poster.posts();
        assert_eq!(posts.iter().map(|(c, _)| *c).collect::<Vec<_>>(), vec![5, 77]);
        let embed = serde_json::to_value(&posts[0].1.embeds[0]).unwrap();
        assert_eq!(embed["footer"]["text"], "☔ Bring an umbrella!");
    }

    #[test]
    fn test_locations_without_channel_are_dropped() {
        let source = Arc::new(FakeForecast {
            date: Mutex::new("2026-10-15"),
            rain: 0,
        });
        let digest = WeatherDigest::new(
            source,
            Arc::new(RecordingPoster::new()),
            vec![location("Nowhere", None)],
            None,
            Duration::ZERO,
        );
        assert!(digest.is_empty());
    }

    #[test]
    fn test_dry_day_has_no_umbrella_footer() {
        let forecast = Forecast {
            date: "2026-10-15".into(),
            condition: "☀️ Clear",
            temp_min: 20.0,
            temp_max: 28.0,
            rain_chance: 10,
        };
        let embed = serde_json::to_value(forecast_embed("t", &forecast, 0)).unwrap();
        assert!(embed.get("footer").map_or(true, |f| f.is_null()));
    }
}
