use crate::error::BotError;
use crate::services::ensure_success;
use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Clone, PartialEq)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub link: String,
}

#[derive(Deserialize)]
struct AtomFeed {
    #[serde(rename = "entry", default)]
    entries: Vec<AtomEntry>,
}

#[derive(Deserialize)]
struct AtomEntry {
    id: String,
    #[serde(default)]
    title: String,
    #[serde(rename = "link", default)]
    links: Vec<AtomLink>,
}

#[derive(Deserialize)]
struct AtomLink {
    #[serde(rename = "@href")]
    href: String,
}

/// Lists a channel's uploads, newest first.
#[async_trait]
pub trait VideoFeed: Send + Sync {
    async fn uploads(&self, channel_id: &str) -> Result<Vec<Video>, BotError>;
}

pub struct YoutubeService {
    client: reqwest::Client,
}

impl YoutubeService {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl VideoFeed for YoutubeService {
    async fn uploads(&self, channel_id: &str) -> Result<Vec<Video>, BotError> {
        let url = Url::parse_with_params(
            "https://www.youtube.com/feeds/videos.xml",
            [("channel_id", channel_id)],
        )
        .map_err(|e| BotError::InvalidInput(e.to_string()))?;
        let response = self.client.get(url).send().await?;
        let body = ensure_success("YouTube feed", response)?.text().await?;
        parse_feed(&body)
    }
}

pub fn parse_feed(xml: &str) -> Result<Vec<Video>, BotError> {
    let feed: AtomFeed = quick_xml::de::from_str(xml)
        .map_err(|e| BotError::Upstream(format!("unreadable Atom feed: {}", e)))?;

    Ok(feed
        .entries
        .into_iter()
        .map(|entry| {
            let id = entry
                .id
                .strip_prefix("yt:video:")
                .unwrap_or(&entry.id)
                .to_string();
            let link = entry
                .links
                .into_iter()
                .next()
                .map(|l| l.href)
                .unwrap_or_else(|| format!("https://www.youtube.com/watch?v={}", id));
            Video {
                id,
                title: entry.title,
                link,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns:media="http://search.yahoo.com/mrss/" xmlns="http://www.w3.org/2005/Atom">
 <link rel="self" href="http://www.youtube.com/feeds/videos.xml?channel_id=UC123"/>
 <id>yt:channel:UC123</id>
 <title>Test Channel</title>
 <entry>
  <id>yt:video:B456</id>
  <yt:videoId>B456</yt:videoId>
  <title>Newest upload</title>
  <link rel="alternate" href="https://www.youtube.com/watch?v=B456"/>
  <published>2026-10-14T10:00:00+00:00</published>
 </entry>
 <entry>
  <id>yt:video:A123</id>
  <yt:videoId>A123</yt:videoId>
  <title>Older upload</title>
  <published>2026-10-01T10:00:00+00:00</published>
 </entry>
</feed>"#;

    #[test]
    fn test_parse_feed() {
        let videos = parse_feed(SAMPLE).unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].id, "B456");
        assert_eq!(videos[0].link, "https://www.youtube.com/watch?v=B456");
        assert_eq!(videos[1].title, "Older upload");
        // Missing link is rebuilt from the id
        assert_eq!(videos[1].link, "https://www.youtube.com/watch?v=A123");
    }

    #[test]
    fn test_empty_feed() {
        let xml = r#"<feed xmlns="http://www.w3.org/2005/Atom"><title>Empty</title></feed>"#;
        assert!(parse_feed(xml).unwrap().is_empty());
    }
}
