use async_trait::async_trait;
use serenity::all::ChannelId;
use std::sync::Arc;
use tracing::warn;

use super::Deps;
use crate::broadcast::news::NewsDigest;
use crate::host::{HostContext, Plugin};
use crate::poster::ChannelPoster;
use crate::services::news::NewsService;
use crate::supervisor::Schedule;
use crate::Command;

pub struct NewsPlugin {
    pub service: Arc<NewsService>,
    poster: Arc<dyn ChannelPoster>,
    channel: Option<u64>,
    times: Vec<chrono::NaiveTime>,
    utc_offset: chrono::FixedOffset,
}

impl NewsPlugin {
    pub fn build(deps: &Deps<'_>) -> Self {
        let config = deps.config;
        Self {
            service: Arc::new(NewsService::new(
                deps.http_client.clone(),
                &config.news_language,
                &config.news_region,
                &config.news_edition,
            )),
            poster: deps.poster(),
            channel: config.news_channel_id,
            times: config.news_times.clone(),
            utc_offset: config.utc_offset(),
        }
    }
}

#[async_trait]
impl Plugin for NewsPlugin {
    fn name(&self) -> &'static str {
        "news"
    }

    async fn init(self: Arc<Self>, host: &HostContext<'_>) -> anyhow::Result<()> {
        let Some(channel) = self.channel else {
            warn!("NEWS_CHANNEL_ID not set, daily digest disabled");
            return Ok(());
        };
        if self.times.is_empty() {
            warn!("NEWS_TIMES is empty, daily digest disabled");
            return Ok(());
        }
        let digest = NewsDigest::new(
            self.service.clone(),
            self.poster.clone(),
            ChannelId::new(channel),
            self.utc_offset,
        );
        host.supervisor
            .register(Arc::new(digest), Schedule::DailyAt(self.times.clone()));
        Ok(())
    }

    fn commands(&self) -> Vec<Command> {
        vec![crate::commands::news::news()]
    }
}
