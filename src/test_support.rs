//! Fakes shared by unit tests.

use async_trait::async_trait;
use serenity::all::{ChannelId, MessageId};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::error::BotError;
use crate::poster::{ChannelPoster, Post};

#[derive(Debug, Clone)]
pub enum Sent {
    Post { channel: u64, id: u64, post: Post },
    Edit { channel: u64, id: u64, post: Post },
    Delete { channel: u64, id: u64 },
}

/// Records every outbound call. Channels and messages listed as missing answer 404.
#[derive(Default)]
pub struct RecordingPoster {
    pub sent: Mutex<Vec<Sent>>,
    next_id: AtomicU64,
    pub missing_channels: Mutex<HashSet<u64>>,
    pub missing_messages: Mutex<HashSet<u64>>,
}

impl RecordingPoster {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1000),
            ..Default::default()
        }
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<(u64, Post)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Post { channel, post, .. } => Some((channel, post)),
                _ => None,
            })
            .collect()
    }

    pub fn edits(&self) -> Vec<(u64, Post)> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Edit { id, post, .. } => Some((id, post)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl ChannelPoster for RecordingPoster {
    async fn post(&self, channel: ChannelId, post: Post) -> Result<MessageId, BotError> {
        if self.missing_channels.lock().unwrap().contains(&channel.get()) {
            return Err(BotError::NotFound(channel.get()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.sent.lock().unwrap().push(Sent::Post {
            channel: channel.get(),
            id,
            post,
        });
        Ok(MessageId::new(id))
    }

    async fn edit(&self, channel: ChannelId, message: MessageId, post: Post) -> Result<(), BotError> {
        if self.missing_messages.lock().unwrap().contains(&message.get()) {
            return Err(BotError::NotFound(message.get()));
        }
        self.sent.lock().unwrap().push(Sent::Edit {
            channel: channel.get(),
            id: message.get(),
            post,
        });
        Ok(())
    }

    async fn delete(&self, channel: ChannelId, message: MessageId) -> Result<(), BotError> {
        self.sent.lock().unwrap().push(Sent::Delete {
            channel: channel.get(),
            id: message.get(),
        });
        Ok(())
    }
}
