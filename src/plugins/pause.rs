//! `POST /pause`: a browser extension reports where the user paused a video.
//!
//! Repeated pauses on the same video update one message instead of flooding the channel.

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde::Deserialize;
use serenity::all::{ChannelId, Colour, CreateEmbed, CreateEmbedFooter, MessageId};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};
use url::Url;

use super::Deps;
use crate::discord_text::truncate_chars;
use crate::error::BotError;
use crate::host::{HostContext, Plugin};
use crate::poster::{ChannelPoster, Post};

#[derive(Debug, Deserialize)]
struct PauseReport {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: String,
    #[serde(default)]
    time: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct LastBroadcast {
    message_id: MessageId,
    canonical_url: String,
}

/// Reduces the many YouTube URL shapes to `https://www.youtube.com/watch?v=ID`.
/// Other URLs come back trimmed but otherwise unchanged.
pub fn canonicalize(raw: &str) -> String {
    let raw = raw.trim();
    let Ok(url) = Url::parse(raw) else {
        return raw.to_string();
    };
    let host = url.host_str().unwrap_or_default();
    let host = host.strip_prefix("www.").unwrap_or(host);
    let host = host.strip_prefix("m.").unwrap_or(host);
    let host = host.strip_prefix("music.").unwrap_or(host);

    let id = match host {
        "youtu.be" => url.path_segments().and_then(|mut s| s.next()).map(str::to_string),
        "youtube.com" => {
            let mut segments = url.path_segments().into_iter().flatten();
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(k, _)| k == "v")
                    .map(|(_, v)| v.into_owned()),
                Some("shorts" | "live" | "embed") => segments.next().map(str::to_string),
                _ => None,
            }
        }
        _ => None,
    };

    match id.filter(|id| !id.is_empty()) {
        Some(id) => format!("https://www.youtube.com/watch?v={}", id),
        None => raw.to_string(),
    }
}

fn pause_embed(report: &PauseReport) -> CreateEmbed {
    let title = report
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .unwrap_or("Untitled");
    let time = report.time.as_deref().unwrap_or("0:00");
    CreateEmbed::new()
        .title("⏸️ Now watching")
        .description(format!("[{}]({})", truncate_chars(title, 200), report.url))
        .colour(Colour::RED)
        .field("Paused at", format!("`{}`", time), true)
        .footer(CreateEmbedFooter::new("From the browser extension"))
}

pub struct PausePlugin {
    poster: Arc<dyn ChannelPoster>,
    channel: ChannelId,
    last: Mutex<Option<LastBroadcast>>,
}

impl PausePlugin {
    pub fn build(deps: &Deps<'_>) -> anyhow::Result<Self> {
        let channel = deps
            .config
            .pause_channel_id
            .ok_or_else(|| anyhow::anyhow!("PAUSE_CHANNEL_ID is not set"))?;
        Ok(Self::new(deps.poster(), channel))
    }

    pub fn new(poster: Arc<dyn ChannelPoster>, channel: u64) -> Self {
        Self {
            poster,
            channel: ChannelId::new(channel),
            last: Mutex::new(None),
        }
    }

    /// Handles one `/pause` request body.
    pub async fn relay(&self, body: &str) -> (StatusCode, &'static str) {
        let report: PauseReport = match serde_json::from_str(body) {
            Ok(report) => report,
            Err(e) => {
                error!("Pause: bad request body: {}", e);
                return (StatusCode::INTERNAL_SERVER_ERROR, "Error");
            }
        };

        match self.broadcast(&report).await {
            Ok(reply) => (StatusCode::OK, reply),
            Err(e) if e.is_not_found() => {
                error!("Pause: channel {} not found", self.channel);
                (StatusCode::NOT_FOUND, "Channel Not Found")
            }
            Err(e) => {
                error!("Pause: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Error")
            }
        }
    }

    async fn broadcast(&self, report: &PauseReport) -> Result<&'static str, BotError> {
        let canonical_url = canonicalize(&report.url);
        let post = Post::embed(pause_embed(report));
        let mut last = self.last.lock().await;

        if let Some(previous) = last.as_ref().filter(|l| l.canonical_url == canonical_url) {
            match self
                .poster
                .edit(self.channel, previous.message_id, post.clone())
                .await
            {
                Ok(()) => {
                    info!("Pause: updated {} for {}", previous.message_id, canonical_url);
                    return Ok("Message Updated");
                }
                Err(e) if e.is_not_found() => {
                    info!("Pause: message {} is gone, sending a new one", previous.message_id)
                }
                Err(e) => return Err(e),
            }
        }

        let message_id = self.poster.post(self.channel, post).await?;
        info!("Pause: sent {} for {}", message_id, canonical_url);
        *last = Some(LastBroadcast {
            message_id,
            canonical_url,
        });
        Ok("Message Sent")
    }
}

#[async_trait]
impl Plugin for PausePlugin {
    fn name(&self) -> &'static str {
        "pause"
    }

    async fn init(self: Arc<Self>, host: &HostContext<'_>) -> anyhow::Result<()> {
        let plugin = self.clone();
        host.gateway
            .register(Method::POST, "/pause", move |body: String| {
                let plugin = plugin.clone();
                async move { plugin.relay(&body).await }
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingPoster, Sent};

    fn body(url: &str, time: &str) -> String {
        serde_json::json!({ "title": "Talk", "url": url, "time": time }).to_string()
    }

    #[test]
    fn test_canonicalize_youtube_shapes() {
        let expected = "https://www.youtube.com/watch?v=abc123";
        assert_eq!(canonicalize("https://www.youtube.com/watch?v=abc123&t=42s"), expected);
        assert_eq!(canonicalize("https://youtu.be/abc123?si=xyz"), expected);
        assert_eq!(canonicalize("https://m.youtube.com/shorts/abc123"), expected);
        assert_eq!(canonicalize(" https://example.com/video "), "https://example.com/video");
        assert_eq!(canonicalize("not a url"), "not a url");
    }

    #[tokio::test]
    async fn test_same_video_updates_the_last_message() {
        let poster = Arc::new(RecordingPoster::new());
        let pause = PausePlugin::new(poster.clone(), 3);

        let first = pause.relay(&body("https://youtu.be/abc123", "1:00")).await;
        assert_eq!(first, (StatusCode::OK, "Message Sent"));
        let second = pause
            .relay(&body("https://www.youtube.com/watch?v=abc123&t=90", "1:30"))
            .await;
        assert_eq!(second, (StatusCode::OK, "Message Updated"));
        let other = pause.relay(&body("https://youtu.be/zzz", "0:10")).await;
        assert_eq!(other, (StatusCode::OK, "Message Sent"));

        let sent = poster.sent();
        assert_eq!(sent.len(), 3);
        assert!(matches!(sent[1], Sent::Edit { id: 1000, .. }));
        assert!(matches!(sent[2], Sent::Post { id: 1001, .. }));
    }

    #[tokio::test]
    async fn test_deleted_message_is_replaced() {
        let poster = Arc::new(RecordingPoster::new());
        let pause = PausePlugin::new(poster.clone(), 3);

        pause.relay(&body("https://youtu.be/abc123", "1:00")).await;
        poster.missing_messages.lock().unwrap().insert(1000);
        let reply = pause.relay(&body("https://youtu.be/abc123", "2:00")).await;
        assert_eq!(reply, (StatusCode::OK, "Message Sent"));
        assert_eq!(poster.posts().len(), 2);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        let poster = Arc::new(RecordingPoster::new());
        poster.missing_channels.lock().unwrap().insert(3);
        let pause = PausePlugin::new(poster, 3);

        assert_eq!(
            pause.relay(&body("https://youtu.be/a", "0:01")).await,
            (StatusCode::NOT_FOUND, "Channel Not Found")
        );
        assert_eq!(
            pause.relay("{not json").await,
            (StatusCode::INTERNAL_SERVER_ERROR, "Error")
        );
    }
}
