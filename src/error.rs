//! Error taxonomy shared by the plugins.
//!
//! Every failure that reaches a user ends up as a short human-readable message; the
//! variants here decide which message and, for HTTP routes, which status code.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BotError {
    /// A third-party API or feed could not be reached or answered garbage.
    #[error("upstream unavailable: {0}")]
    Upstream(String),

    /// The AI endpoint rejected the request because the quota is exhausted.
    #[error("quota exhausted")]
    RateLimited,

    /// A required setting (credential, channel id) is absent.
    #[error("missing configuration: {0}")]
    MissingConfig(&'static str),

    /// User-supplied input failed validation. Nothing was mutated.
    #[error("{0}")]
    InvalidInput(String),

    /// Discord answered 404 for the target channel or message.
    #[error("channel or message {0} not found")]
    NotFound(u64),

    #[error(transparent)]
    Discord(#[from] Box<serenity::Error>),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<serenity::Error> for BotError {
    fn from(err: serenity::Error) -> Self {
        BotError::Discord(Box::new(err))
    }
}

impl BotError {
    /// True when the error is Discord telling us the target does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BotError::NotFound(_))
    }
}

/// Maps a serenity error to `NotFound` when Discord answered 404.
pub fn classify_discord(target: u64, err: serenity::Error) -> BotError {
    use serenity::http::HttpError;

    if let serenity::Error::Http(HttpError::UnsuccessfulRequest(response)) = &err {
        if response.status_code.as_u16() == 404 {
            return BotError::NotFound(target);
        }
    }
    BotError::from(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_detection() {
        assert!(BotError::NotFound(1).is_not_found());
        assert!(!BotError::RateLimited.is_not_found());
        assert!(!BotError::MissingConfig("MAP_CHANNEL_ID").is_not_found());
    }

    #[test]
    fn test_display_messages() {
        assert_eq!(
            BotError::MissingConfig("MAP_CHANNEL_ID").to_string(),
            "missing configuration: MAP_CHANNEL_ID"
        );
        assert_eq!(
            BotError::InvalidInput("bad coordinates".into()).to_string(),
            "bad coordinates"
        );
    }
}
