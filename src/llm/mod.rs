pub mod gemini;
pub mod session;

pub use gemini::{GeminiClient, GenerativeModel, ImagePayload, ModelError, Role, Turn};
pub use session::ChatSession;
