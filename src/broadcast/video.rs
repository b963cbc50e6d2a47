use async_trait::async_trait;
use serenity::all::ChannelId;
use std::sync::Arc;
use tracing::{info, warn};

use super::{Broadcaster, FeedDiff, SeenCache, TickOutcome};
use crate::config::YoutubeChannel;
use crate::poster::{ChannelPoster, Post};
use crate::services::youtube::{Video, VideoFeed};

pub fn announcement(channel_name: &str, video: &Video) -> String {
    format!("📢 **{}** published a new video!\n{}", channel_name, video.link)
}

/// Watches YouTube channels and announces each new upload.
pub struct VideoWatcher {
    feed: Arc<dyn VideoFeed>,
    poster: Arc<dyn ChannelPoster>,
    channel: ChannelId,
    watched: Vec<YoutubeChannel>,
    seen: SeenCache,
}

impl VideoWatcher {
    pub fn new(
        feed: Arc<dyn VideoFeed>,
        poster: Arc<dyn ChannelPoster>,
        channel: ChannelId,
        watched: Vec<YoutubeChannel>,
    ) -> Self {
        Self {
            feed,
            poster,
            channel,
            watched,
            seen: SeenCache::new(),
        }
    }

    async fn poll_channel(&self, watched: &YoutubeChannel) -> anyhow::Result<TickOutcome> {
        let uploads = self.feed.uploads(&watched.channel_id).await?;

        match self.seen.diff(&watched.channel_id, uploads, |v| v.id.as_str()) {
            FeedDiff::Seed(_) => Ok(TickOutcome::Seeded),
            FeedDiff::Unchanged => Ok(TickOutcome::Skipped),
            FeedDiff::Fresh(videos) => {
                let mut sent = 0;
                for video in videos {
                    info!("Video: new upload from {}: {}", watched.name, video.title);
                    self.poster
                        .post(self.channel, Post::text(announcement(&watched.name, &video)))
                        .await?;
                    self.seen.record(&watched.channel_id, &video.id);
                    sent += 1;
                }
                Ok(TickOutcome::Dispatched(sent))
            }
        }
    }
}

#[async_trait]
impl Broadcaster for VideoWatcher {
    fn name(&self) -> &'static str {
        "video"
    }

    async fn tick(&self) -> anyhow::Result<TickOutcome> {
        let mut outcome = TickOutcome::Skipped;
        let mut failures = 0;

        for watched in &self.watched {
            match self.poll_channel(watched).await {
                Ok(o) => outcome = outcome.combine(o),
                Err(e) => {
                    // Keep polling the remaining feeds
                    warn!("Video: {} ({}) failed: {:#}", watched.name, watched.channel_id, e);
                    failures += 1;
                }
            }
        }

        if failures > 0 && failures == self.watched.len() {
            anyhow::bail!("all {} video feeds failed", failures);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use crate::test_support::RecordingPoster;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeFeed {
        uploads: Mutex<HashMap<String, Vec<&'static str>>>,
    }

    impl FakeFeed {
        fn set(&self, channel: &str, ids: Vec<&'static str>) {
            self.uploads.lock().unwrap().insert(channel.to_string(), ids);
        }
    }

    #[async_trait]
    impl VideoFeed for FakeFeed {
        async fn uploads(&self, channel_id: &str) -> Result<Vec<Video>, BotError> {
            let ids = self
                .uploads
                .lock()
                .unwrap()
                .get(channel_id)
                .cloned()
                .ok_or_else(|| BotError::Upstream("feed down".into()))?;
            Ok(ids
                .into_iter()
                .map(|id| Video {
                    id: id.to_string(),
                    title: format!("Video {}", id),
                    link: format!("https://www.youtube.com/watch?v={}", id),
                })
                .collect())
        }
    }

    fn watcher(feed: Arc<FakeFeed>, poster: Arc<RecordingPoster>, channels: &[&str]) -> VideoWatcher {
        let watched = channels
            .iter()
            .map(|id| YoutubeChannel {
                name: format!("Channel {}", id),
                channel_id: id.to_string(),
            })
            .collect();
        VideoWatcher::new(feed, poster, ChannelId::new(10), watched)
    }

    #[tokio::test]
    async fn test_first_poll_seeds_then_announces_once() {
        let feed = Arc::new(FakeFeed::default());
        let poster = Arc::new(RecordingPoster::new());
        let watcher = watcher(feed.clone(), poster.clone(), &["UC1"]);

        feed.set("UC1", vec!["A123"]);
        assert_eq!(watcher.tick().await.unwrap(), TickOutcome::Seeded);
        assert!(poster.sent().is_empty());

        assert_eq!(watcher.tick().await.unwrap(), TickOutcome::Skipped);
        assert!(poster.sent().is_empty());

        feed.set("UC1", vec!["B456", "A123"]);
        assert_eq!(watcher.tick().await.unwrap(), TickOutcome::Dispatched(1));
        let posts = poster.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].0, 10);
        assert_eq!(
            posts[0].1.content.as_deref(),
            Some("📢 **Channel UC1** published a new video!\nhttps://www.youtube.com/watch?v=B456")
        );

        // Nothing new on the next poll
        assert_eq!(watcher.tick().await.unwrap(), TickOutcome::Skipped);
        assert_eq!(poster.posts().len(), 1);
    }

    #[tokio::test]
    async fn test_one_failing_feed_does_not_block_others() {
        let feed = Arc::new(FakeFeed::default());
        let poster = Arc::new(RecordingPoster::new());
        let watcher = watcher(feed.clone(), poster.clone(), &["down", "UC2"]);

        feed.set("UC2", vec!["X1"]);
        assert_eq!(watcher.tick().await.unwrap(), TickOutcome::Seeded);
        feed.set("UC2", vec!["X2", "X1"]);
        assert_eq!(watcher.tick().await.unwrap(), TickOutcome::Dispatched(1));
    }

    #[tokio::test]
    async fn test_all_feeds_failing_is_an_error() {
        let feed = Arc::new(FakeFeed::default());
        let poster = Arc::new(RecordingPoster::new());
        let watcher = watcher(feed, poster, &["down"]);
        assert!(watcher.tick().await.is_err());
    }

    #[tokio::test]
    async fn test_failed_send_is_retried_next_tick() {
        let feed = Arc::new(FakeFeed::default());
        let poster = Arc::new(RecordingPoster::new());
        let watcher = watcher(feed.clone(), poster.clone(), &["UC1"]);

        feed.set("UC1", vec!["A"]);
        watcher.tick().await.unwrap();
        feed.set("UC1", vec!["B", "A"]);

        poster.missing_channels.lock().unwrap().insert(10);
        assert!(watcher.tick().await.is_err());
        poster.missing_channels.lock().unwrap().clear();

        assert_eq!(watcher.tick().await.unwrap(), TickOutcome::Dispatched(1));
    }
}
