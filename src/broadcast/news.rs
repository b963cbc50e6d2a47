use async_trait::async_trait;
use chrono::{FixedOffset, NaiveDate, Timelike, Utc};
use serenity::all::{ChannelId, CreateEmbed, CreateEmbedFooter};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::info;

use super::{Broadcaster, TickOutcome};
use crate::config::DISCORD_EMBED_LIMIT;
use crate::discord_text::truncate_chars;
use crate::poster::{ChannelPoster, Post};
use crate::services::news::{Headline, HeadlineSource};

const DIGEST_LIMIT: usize = 6;
const NEWS_THUMBNAIL: &str = "https://cdn-icons-png.flaticon.com/512/2965/2965879.png";
const GOOGLE_NEWS_ICON: &str = "https://upload.wikimedia.org/wikipedia/commons/thumb/d/da/Google_News_icon.svg/1200px-Google_News_icon.svg.png";

pub fn greeting(local_hour: u32) -> &'static str {
    match local_hour {
        5..=10 => "🌅 Good morning!",
        11..=13 => "🍱 Good afternoon!",
        _ => "🌆 Good evening!",
    }
}

/// One embed listing up to six headlines with relative timestamps.
pub fn headline_embed(title: &str, headlines: &[Headline], today: NaiveDate) -> CreateEmbed {
    let mut body = format!("📅 **{} | Latest highlights**\n\n", today.format("%Y-%m-%d"));
    for (i, item) in headlines.iter().take(DIGEST_LIMIT).enumerate() {
        body.push_str(&format!(
            "{}. **[{}]({})**\n   └── 🕒 <t:{}:R>\n\n",
            i + 1,
            item.title,
            item.link,
            item.published.timestamp()
        ));
    }

    CreateEmbed::new()
        .title(title)
        .description(truncate_chars(&body, DISCORD_EMBED_LIMIT))
        .color(0x2b2d31)
        .thumbnail(NEWS_THUMBNAIL)
        .footer(CreateEmbedFooter::new("News powered by Google RSS").icon_url(GOOGLE_NEWS_ICON))
}

/// Posts a digest of headlines that were not in any earlier poll.
pub struct NewsDigest {
    source: Arc<dyn HeadlineSource>,
    poster: Arc<dyn ChannelPoster>,
    channel: ChannelId,
    utc_offset: FixedOffset,
    seen: Mutex<Option<HashSet<String>>>,
}

impl NewsDigest {
    pub fn new(
        source: Arc<dyn HeadlineSource>,
        poster: Arc<dyn ChannelPoster>,
        channel: ChannelId,
        utc_offset: FixedOffset,
    ) -> Self {
        Self {
            source,
            poster,
            channel,
            utc_offset,
            seen: Mutex::new(None),
        }
    }

    fn remember(&self, headlines: &[Headline]) {
        if let Ok(mut seen) = self.seen.lock() {
            *seen = Some(headlines.iter().map(|h| h.id.clone()).collect());
        }
    }
}

#[async_trait]
impl Broadcaster for NewsDigest {
    fn name(&self) -> &'static str {
        "news"
    }

    async fn tick(&self) -> anyhow::Result<TickOutcome> {
        let headlines = self.source.headlines(None).await?;

        let fresh: Option<Vec<Headline>> = {
            let seen = self
                .seen
                .lock()
                .map_err(|_| anyhow::anyhow!("news cache poisoned"))?;
            seen.as_ref().map(|seen| {
                headlines
                    .iter()
                    .filter(|h| !seen.contains(&h.id))
                    .cloned()
                    .collect()
            })
        };

        let Some(fresh) = fresh else {
            self.remember(&headlines);
            return Ok(TickOutcome::Seeded);
        };
        if fresh.is_empty() {
            return Ok(TickOutcome::Skipped);
        }

        let now = Utc::now().with_timezone(&self.utc_offset);
        let title = format!("{} Daily headlines", greeting(now.hour()));
        let embed = headline_embed(&title, &fresh, now.date_naive());
        self.poster.post(self.channel, Post::embed(embed)).await?;

        info!("News: posted digest with {} new headline(s)", fresh.len().min(DIGEST_LIMIT));
        self.remember(&headlines);
        Ok(TickOutcome::Dispatched(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BotError;
    use crate::test_support::RecordingPoster;

    #[derive(Default)]
    struct FakeNews {
        ids: Mutex<Vec<&'static str>>,
    }

    #[async_trait]
    impl HeadlineSource for FakeNews {
        async fn headlines(&self, _keyword: Option<&str>) -> Result<Vec<Headline>, BotError> {
            Ok(self
                .ids
                .lock()
                .unwrap()
                .iter()
                .map(|id| Headline {
                    id: id.to_string(),
                    title: format!("Story {}", id),
                    link: format!("https://news.example/{}", id),
                    published: Utc::now(),
                })
                .collect())
        }
    }

    #[test]
    fn test_greeting_by_hour() {
        assert_eq!(greeting(5), "🌅 Good morning!");
        assert_eq!(greeting(10), "🌅 Good morning!");
        assert_eq!(greeting(11), "🍱 Good afternoon!");
        assert_eq!(greeting(14), "🌆 Good evening!");
        assert_eq!(greeting(2), "🌆 Good evening!");
    }

    #[tokio::test]
    async fn test_digest_only_carries_new_headlines() {
        let source = Arc::new(FakeNews::default());
        let poster = Arc::new(RecordingPoster::new());
        let digest = NewsDigest::new(
            source.clone(),
            poster.clone(),
            ChannelId::new(5),
            FixedOffset::east_opt(8 * 3600).unwrap(),
        );

        *source.ids.lock().unwrap() = vec!["a", "b"];
        assert_eq!(digest.tick().await.unwrap(), TickOutcome::Seeded);
        assert_eq!(digest.tick().await.unwrap(), TickOutcome::Skipped);
        assert!(poster.sent().is_empty());

        *source.ids.lock().unwrap() = vec!["c", "a", "b"];
        assert_eq!(digest.tick().await.unwrap(), TickOutcome::Dispatched(1));
        let posts = poster.posts();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].1.embeds.len(), 1);
        let embed = serde_json::to_value(&posts[0].1.embeds[0]).unwrap();
        let description = embed["description"].as_str().unwrap();
        assert!(description.contains("Story c"));
        assert!(!description.contains("Story a"));

        assert_eq!(digest.tick().await.unwrap(), TickOutcome::Skipped);
    }
}
