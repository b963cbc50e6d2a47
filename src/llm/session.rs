//! The bot's single shared conversation with the model.

use chrono::{DateTime, FixedOffset, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use super::gemini::{GenerativeModel, ImagePayload, ModelError, Role, Turn};

pub const QUOTA_MESSAGE: &str = "💀 The AI quota is used up (429), please wait a moment.";
pub const FAILURE_MESSAGE: &str = "I couldn't make sense of that, or something went wrong...";
/// Oldest exchanges are dropped beyond this many turns.
const MAX_TURNS: usize = 40;

/// Prefixes the user's text with the local wall-clock time.
pub fn timestamped(text: &str, now: DateTime<FixedOffset>) -> String {
    format!("(Current time: {}) User says: {}", now.format("%Y-%m-%d %H:%M"), text)
}

pub struct ChatSession {
    model: Arc<dyn GenerativeModel>,
    system_instruction: String,
    history: Mutex<Vec<Turn>>,
    utc_offset: FixedOffset,
}

impl ChatSession {
    pub fn new(model: Arc<dyn GenerativeModel>, system_instruction: &str, utc_offset: FixedOffset) -> Self {
        Self {
            model,
            system_instruction: system_instruction.to_string(),
            history: Mutex::new(Vec::new()),
            utc_offset,
        }
    }

    /// Sends one user message and returns the text to show.
    ///
    /// Requests are serialised by the history lock. A rate-limited request leaves the
    /// history as it was; any other failure keeps the user turn but adds no reply.
    pub async fn respond(&self, user_text: &str, images: Vec<ImagePayload>) -> String {
        let mut history = self.history.lock().await;

        let now = Utc::now().with_timezone(&self.utc_offset);
        let mut turn = Turn::user(timestamped(user_text, now));
        if !images.is_empty() {
            info!("Chat: sending {} image(s) to the model", images.len());
        }
        turn.images = images;
        history.push(turn);

        match self.model.generate(&self.system_instruction, &history).await {
            Ok(reply) => {
                // Images are sent once; later requests only carry the text
                if let Some(last) = history.last_mut() {
                    last.images.clear();
                }
                history.push(Turn::model(reply.clone()));
                trim_history(&mut history);
                reply
            }
            Err(ModelError::RateLimited) => {
                warn!("Chat: quota exhausted, dropping the pending turn");
                history.pop();
                QUOTA_MESSAGE.to_string()
            }
            Err(e) => {
                error!("Chat: model request failed: {}", e);
                FAILURE_MESSAGE.to_string()
            }
        }
    }

    pub async fn history_len(&self) -> usize {
        self.history.lock().await.len()
    }
}

/// Drops whole exchanges from the front so the history starts with a user turn.
fn trim_history(history: &mut Vec<Turn>) {
    if history.len() <= MAX_TURNS {
        return;
    }
    let mut cut = history.len() - MAX_TURNS;
    while cut < history.len() && history[cut].role != Role::User {
        cut += 1;
    }
    history.drain(..cut);
}
