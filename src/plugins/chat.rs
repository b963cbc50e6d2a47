use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::{Attachment, CreateMessage};
use std::sync::Arc;
use tracing::{debug, warn};

use super::Deps;
use crate::discord_text::{split_for_discord, strip_bot_mentions};
use crate::host::Plugin;
use crate::llm::{ChatSession, GeminiClient, ImagePayload};
use crate::{Command, Data, Error};

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

pub fn is_image(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn mime_for(filename: &str, declared: Option<&str>) -> String {
    if let Some(mime) = declared.filter(|m| m.starts_with("image/")) {
        return mime.to_string();
    }
    match filename.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()) {
        Some(ext) if ext == "png" => "image/png".into(),
        Some(ext) if ext == "gif" => "image/gif".into(),
        Some(ext) if ext == "webp" => "image/webp".into(),
        _ => "image/jpeg".into(),
    }
}

pub struct ChatPlugin {
    session: ChatSession,
    http_client: reqwest::Client,
    auto_channel: Option<u64>,
    prefix: String,
}

impl ChatPlugin {
    pub fn build(deps: &Deps<'_>) -> anyhow::Result<Self> {
        let config = deps.config;
        let model = GeminiClient::from_config(config, deps.http_client.clone())
            .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY is not set"))?;
        Ok(Self {
            session: ChatSession::new(Arc::new(model), &config.system_prompt, config.utc_offset()),
            http_client: deps.http_client.clone(),
            auto_channel: config.auto_chat_channel_id,
            prefix: config.command_prefix.clone(),
        })
    }

    /// Downloads image attachments. Failed downloads are skipped.
    pub async fn fetch_images(&self, attachments: &[Attachment]) -> Vec<ImagePayload> {
        let mut images = Vec::new();
        for attachment in attachments.iter().filter(|a| is_image(&a.filename)) {
            let bytes = match self.http_client.get(&attachment.url).send().await {
                Ok(resp) if resp.status().is_success() => resp.bytes().await,
                Ok(resp) => {
                    warn!("Chat: attachment {} returned {}", attachment.filename, resp.status());
                    continue;
                }
                Err(e) => Err(e),
            };
            match bytes {
                Ok(data) => images.push(ImagePayload {
                    mime_type: mime_for(&attachment.filename, attachment.content_type.as_deref()),
                    data: data.to_vec(),
                }),
                Err(e) => warn!("Chat: failed to download {}: {}", attachment.filename, e),
            }
        }
        images
    }

    pub async fn ask(&self, text: &str, attachments: &[Attachment]) -> String {
        let images = self.fetch_images(attachments).await;
        let text = if text.trim().is_empty() {
            "(sent only an image)"
        } else {
            text
        };
        self.session.respond(text, images).await
    }

    fn should_answer(&self, message: &serenity::Message, bot_id: u64) -> bool {
        should_answer(
            &Incoming {
                author_bot: message.author.bot,
                content: &message.content,
                has_attachments: !message.attachments.is_empty(),
                channel_id: message.channel_id.get(),
                mentions_bot: message.mentions_user_id(serenity::UserId::new(bot_id)),
            },
            self.auto_channel,
            &self.prefix,
        )
    }
}

/// The parts of a guild message that decide whether the assistant replies.
struct Incoming<'a> {
    author_bot: bool,
    content: &'a str,
    has_attachments: bool,
    channel_id: u64,
    mentions_bot: bool,
}

fn should_answer(message: &Incoming<'_>, auto_channel: Option<u64>, prefix: &str) -> bool {
    if message.author_bot {
        return false;
    }
    let content = message.content.trim();
    if content.is_empty() && !message.has_attachments {
        return false;
    }
    if content.starts_with(prefix) {
        return false;
    }
    auto_channel == Some(message.channel_id) || message.mentions_bot
}

#[async_trait]
impl Plugin for ChatPlugin {
    fn name(&self) -> &'static str {
        "chat"
    }

    fn commands(&self) -> Vec<Command> {
        vec![crate::commands::chat::chat()]
    }

    async fn on_event(
        &self,
        ctx: &serenity::Context,
        event: &serenity::FullEvent,
        data: &Data,
    ) -> Result<(), Error> {
        let serenity::FullEvent::Message { new_message } = event else {
            return Ok(());
        };
        if !self.should_answer(new_message, data.bot_id) {
            return Ok(());
        }

        debug!("Chat: answering message {}", new_message.id);
        let text = strip_bot_mentions(&new_message.content, data.bot_id);
        if let Err(e) = new_message.channel_id.broadcast_typing(&ctx.http).await {
            warn!("Chat: typing indicator failed in {}: {}", new_message.channel_id, e);
        }
        let answer = self.ask(&text, &new_message.attachments).await;

        let mut chunks = split_for_discord(&answer).into_iter();
        if let Some(first) = chunks.next() {
            new_message.reply(&ctx.http, first).await?;
        }
        for chunk in chunks {
            new_message
                .channel_id
                .send_message(&ctx.http, CreateMessage::new().content(chunk))
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_image() {
        assert!(is_image("cat.PNG"));
        assert!(is_image("photo.final.jpeg"));
        assert!(is_image("anim.webp"));
        assert!(!is_image("notes.txt"));
        assert!(!is_image("png"));
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("a.gif", None), "image/gif");
        assert_eq!(mime_for("a.jpg", None), "image/jpeg");
        assert_eq!(mime_for("a.png", Some("image/png")), "image/png");
        assert_eq!(mime_for("a.webp", Some("application/octet-stream")), "image/webp");
    }

    const AUTO: u64 = 77;

    fn incoming(content: &str) -> Incoming<'_> {
        Incoming {
            author_bot: false,
            content,
            has_attachments: false,
            channel_id: 5,
            mentions_bot: false,
        }
    }

    #[test]
    fn test_auto_reply_gate() {
        let answer = |m: &Incoming<'_>| should_answer(m, Some(AUTO), "!");

        let in_auto = Incoming { channel_id: AUTO, ..incoming("what's up") };
        assert!(answer(&in_auto));

        let mentioned = Incoming { mentions_bot: true, ..incoming("<@1> hi") };
        assert!(answer(&mentioned));

        assert!(!answer(&incoming("just chatting")));

        let from_bot = Incoming { author_bot: true, ..in_auto };
        assert!(!answer(&from_bot));

        let command = Incoming { channel_id: AUTO, ..incoming("!chat hello") };
        assert!(!answer(&command));

        let empty = Incoming { channel_id: AUTO, ..incoming("   ") };
        assert!(!answer(&empty));

        let image_only = Incoming { has_attachments: true, ..empty };
        assert!(answer(&image_only));
    }

    #[test]
    fn test_no_auto_channel_needs_a_mention() {
        let message = Incoming { channel_id: AUTO, ..incoming("hello") };
        assert!(!should_answer(&message, None, "!"));
        let mentioned = Incoming { mentions_bot: true, ..message };
        assert!(should_answer(&mentioned, None, "!"));
    }
}
