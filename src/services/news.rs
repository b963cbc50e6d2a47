use crate::error::BotError;
use crate::services::ensure_success;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;
use url::Url;

const HEADLINE_LIMIT: usize = 8;

#[derive(Debug, Clone, PartialEq)]
pub struct Headline {
    /// Feed guid, falling back to the link
    pub id: String,
    pub title: String,
    pub link: String,
    pub published: DateTime<Utc>,
}

#[derive(Deserialize)]
struct Rss {
    channel: RssChannel,
}

#[derive(Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Deserialize)]
struct RssItem {
    title: String,
    link: String,
    #[serde(default)]
    guid: Option<Guid>,
    #[serde(rename = "pubDate", default)]
    pub_date: Option<String>,
}

#[derive(Deserialize)]
struct Guid {
    #[serde(rename = "$text")]
    value: String,
}

/// Anything that can list the current headlines, newest first.
#[async_trait]
pub trait HeadlineSource: Send + Sync {
    async fn headlines(&self, keyword: Option<&str>) -> Result<Vec<Headline>, BotError>;
}

pub struct NewsService {
    client: reqwest::Client,
    language: String,
    region: String,
    edition: String,
}

impl NewsService {
    pub fn new(client: reqwest::Client, language: &str, region: &str, edition: &str) -> Self {
        Self {
            client,
            language: language.to_string(),
            region: region.to_string(),
            edition: edition.to_string(),
        }
    }

    pub fn feed_url(&self, keyword: Option<&str>) -> Result<Url, BotError> {
        let locale = [
            ("hl", self.language.as_str()),
            ("gl", self.region.as_str()),
            ("ceid", self.edition.as_str()),
        ];
        let url = match keyword.map(str::trim).filter(|k| !k.is_empty()) {
            Some(keyword) => {
                let mut params = vec![("q", keyword)];
                params.extend(locale);
                Url::parse_with_params("https://news.google.com/rss/search", params)
            }
            None => Url::parse_with_params("https://news.google.com/rss", locale),
        };
        url.map_err(|e| BotError::InvalidInput(e.to_string()))
    }
}

#[async_trait]
impl HeadlineSource for NewsService {
    async fn headlines(&self, keyword: Option<&str>) -> Result<Vec<Headline>, BotError> {
        let url = self.feed_url(keyword)?;
        debug!("News: fetching {}", url);
        let response = self.client.get(url).send().await?;
        let body = ensure_success("Google News", response)?.text().await?;
        let mut headlines = parse_rss(&body)?;
        headlines.truncate(HEADLINE_LIMIT);
        Ok(headlines)
    }
}

pub fn parse_rss(xml: &str) -> Result<Vec<Headline>, BotError> {
    let rss: Rss = quick_xml::de::from_str(xml)
        .map_err(|e| BotError::Upstream(format!("unreadable RSS: {}", e)))?;

    Ok(rss
        .channel
        .items
        .into_iter()
        .map(|item| {
            // Unparseable dates fall back to now
            let published = item
                .pub_date
                .as_deref()
                .and_then(|d| DateTime::parse_from_rfc2822(d.trim()).ok())
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(Utc::now);
            Headline {
                id: item.guid.map(|g| g.value).unwrap_or_else(|| item.link.clone()),
                title: item.title,
                link: item.link,
                published,
            }
        })
        .collect())
}
