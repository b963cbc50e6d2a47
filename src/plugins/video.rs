use async_trait::async_trait;
use serenity::all::ChannelId;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::Deps;
use crate::broadcast::video::VideoWatcher;
use crate::config::YoutubeChannel;
use crate::host::{HostContext, Plugin};
use crate::poster::ChannelPoster;
use crate::services::youtube::YoutubeService;
use crate::supervisor::Schedule;

pub struct VideoPlugin {
    feed: Arc<YoutubeService>,
    poster: Arc<dyn ChannelPoster>,
    channel: Option<u64>,
    watched: Vec<YoutubeChannel>,
    interval: Duration,
}

impl VideoPlugin {
    pub fn build(deps: &Deps<'_>) -> Self {
        let config = deps.config;
        Self {
            feed: Arc::new(YoutubeService::new(deps.http_client.clone())),
            poster: deps.poster(),
            channel: config.video_channel_id,
            watched: config.broadcasts.youtube.clone(),
            interval: Duration::from_secs(config.video_poll_interval_secs),
        }
    }
}

#[async_trait]
impl Plugin for VideoPlugin {
    fn name(&self) -> &'static str {
        "video"
    }

    async fn init(self: Arc<Self>, host: &HostContext<'_>) -> anyhow::Result<()> {
        let Some(channel) = self.channel else {
            warn!("VIDEO_CHANNEL_ID not set, upload announcements disabled");
            return Ok(());
        };
        if self.watched.is_empty() {
            warn!("No YouTube channels configured, upload announcements disabled");
            return Ok(());
        }
        info!(
            "Video: watching {} channel(s) every {}",
            self.watched.len(),
            humantime::format_duration(self.interval)
        );
        let watcher = VideoWatcher::new(
            self.feed.clone(),
            self.poster.clone(),
            ChannelId::new(channel),
            self.watched.clone(),
        );
        host.supervisor
            .register(Arc::new(watcher), Schedule::Every(self.interval));
        Ok(())
    }
}
