//! Outbound messages to fixed channels.
//!
//! Broadcasters and HTTP routes only ever post into statically configured channels, so
//! they depend on this small trait instead of a full serenity context.

use async_trait::async_trait;
use serenity::all::{
    ChannelId, CreateActionRow, CreateEmbed, CreateMessage, EditMessage, Http, MessageId,
};

use crate::error::{classify_discord, BotError};

/// Message body shared by sends and edits.
#[derive(Debug, Clone, Default)]
pub struct Post {
    pub content: Option<String>,
    pub embeds: Vec<CreateEmbed>,
    pub components: Vec<CreateActionRow>,
}

impl Post {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn embed(embed: CreateEmbed) -> Self {
        Self {
            embeds: vec![embed],
            ..Default::default()
        }
    }

    pub fn with_components(mut self, components: Vec<CreateActionRow>) -> Self {
        self.components = components;
        self
    }

    fn into_create(self) -> CreateMessage {
        let mut builder = CreateMessage::new()
            .embeds(self.embeds)
            .components(self.components);
        if let Some(content) = self.content {
            builder = builder.content(content);
        }
        builder
    }

    fn into_edit(self) -> EditMessage {
        // An edit replaces content, embeds and components wholesale.
        EditMessage::new()
            .content(self.content.unwrap_or_default())
            .embeds(self.embeds)
            .components(self.components)
    }
}

#[async_trait]
pub trait ChannelPoster: Send + Sync {
    async fn post(&self, channel: ChannelId, post: Post) -> Result<MessageId, BotError>;

    async fn edit(
        &self,
        channel: ChannelId,
        message: MessageId,
        post: Post,
    ) -> Result<(), BotError>;

    async fn delete(&self, channel: ChannelId, message: MessageId) -> Result<(), BotError>;
}

#[async_trait]
impl ChannelPoster for Http {
    async fn post(&self, channel: ChannelId, post: Post) -> Result<MessageId, BotError> {
        let message = channel
            .send_message(self, post.into_create())
            .await
            .map_err(|e| classify_discord(channel.get(), e))?;
        Ok(message.id)
    }

    async fn edit(
        &self,
        channel: ChannelId,
        message: MessageId,
        post: Post,
    ) -> Result<(), BotError> {
        channel
            .edit_message(self, message, post.into_edit())
            .await
            .map_err(|e| classify_discord(message.get(), e))?;
        Ok(())
    }

    async fn delete(&self, channel: ChannelId, message: MessageId) -> Result<(), BotError> {
        channel
            .delete_message(self, message)
            .await
            .map_err(|e| classify_discord(message.get(), e))
    }
}
