use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::Deps;
use crate::broadcast::weather::WeatherDigest;
use crate::config::WeatherLocation;
use crate::host::{HostContext, Plugin};
use crate::poster::ChannelPoster;
use crate::services::weather::WeatherService;
use crate::supervisor::Schedule;
use crate::Command;

const LOCATION_PAUSE: Duration = Duration::from_secs(3);

pub struct WeatherPlugin {
    pub service: Arc<WeatherService>,
    poster: Arc<dyn ChannelPoster>,
    locations: Vec<WeatherLocation>,
    default_channel: Option<u64>,
    time: chrono::NaiveTime,
}

impl WeatherPlugin {
    pub fn build(deps: &Deps<'_>) -> Self {
        let config = deps.config;
        Self {
            service: Arc::new(WeatherService::new(deps.http_client.clone())),
            poster: deps.poster(),
            locations: config.broadcasts.weather.clone(),
            default_channel: config.weather_channel_id,
            time: config.weather_time,
        }
    }
}

#[async_trait]
impl Plugin for WeatherPlugin {
    fn name(&self) -> &'static str {
        "weather"
    }

    async fn init(self: Arc<Self>, host: &HostContext<'_>) -> anyhow::Result<()> {
        let digest = WeatherDigest::new(
            self.service.clone(),
            self.poster.clone(),
            self.locations.clone(),
            self.default_channel,
            LOCATION_PAUSE,
        );
        if digest.is_empty() {
            warn!("No weather location has a channel, daily forecast disabled");
            return Ok(());
        }
        host.supervisor
            .register(Arc::new(digest), Schedule::DailyAt(vec![self.time]));
        Ok(())
    }

    fn commands(&self) -> Vec<Command> {
        vec![crate::commands::weather::weather()]
    }
}
