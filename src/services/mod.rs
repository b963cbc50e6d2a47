pub mod animals;
pub mod economy;
pub mod news;
pub mod shopping;
pub mod todo;
pub mod weather;
pub mod youtube;

use crate::error::BotError;

/// Fails with `Upstream` on any non-success status.
pub(crate) fn ensure_success(
    source: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, BotError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(BotError::Upstream(format!("{} returned {}", source, status)))
    }
}
