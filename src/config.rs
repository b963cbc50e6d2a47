use chrono::{FixedOffset, NaiveTime, Offset, Utc};
use dotenvy::dotenv;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::warn;

#[derive(Clone, Deserialize)]
pub struct Config {
    pub discord_token: String,
    pub command_prefix: String,

    // Generative-language API
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub system_prompt: String,

    // Embedded HTTP gateway
    pub http_bind: String,
    pub http_port: u16,
    pub http_timeout_secs: u64,

    /// Offset used for every locally displayed time (Asia/Taipei by default)
    pub utc_offset_hours: i32,

    // Destination channels; `None` disables the feature that posts there
    pub auto_chat_channel_id: Option<u64>,
    pub news_channel_id: Option<u64>,
    pub weather_channel_id: Option<u64>,
    pub video_channel_id: Option<u64>,
    pub pause_channel_id: Option<u64>,
    pub map_channel_id: Option<u64>,
    pub shopping_channel_id: Option<u64>,
    pub todo_channel_id: Option<u64>,

    // Stores
    pub database_url: String,
    pub todo_file: String,

    // Economy
    pub work_cooldown_secs: u64,

    // Broadcast schedules (UTC)
    pub video_poll_interval_secs: u64,
    pub news_times: Vec<NaiveTime>,
    pub weather_time: NaiveTime,
    pub news_language: String,
    pub news_region: String,
    pub news_edition: String,
    pub broadcasts: BroadcastLists,
}

/// YouTube channels and weather locations, loaded from `broadcasts.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BroadcastLists {
    #[serde(default)]
    pub youtube: Vec<YoutubeChannel>,
    #[serde(default)]
    pub weather: Vec<WeatherLocation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct YoutubeChannel {
    pub name: String,
    pub channel_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeatherLocation {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// Overrides `WEATHER_CHANNEL_ID` for this location
    #[serde(default)]
    pub channel_id: Option<u64>,
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a Discord assistant. Keep answers concise. \
If the user sends an image, answer based on what the image shows.";

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok();
        Self::build()
    }

    fn build() -> anyhow::Result<Self> {
        Ok(Config {
            discord_token: env::var("DISCORD_TOKEN")
                .map_err(|_| anyhow::anyhow!("DISCORD_TOKEN must be set"))?,
            command_prefix: env::var("COMMAND_PREFIX").unwrap_or_else(|_| "!".to_string()),
            gemini_api_key: env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty()),
            gemini_model: env::var("GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            gemini_api_base: env::var("GEMINI_API_BASE").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta".to_string()
            }),
            system_prompt: env::var("SYSTEM_PROMPT")
                .unwrap_or_else(|_| DEFAULT_SYSTEM_PROMPT.to_string()),
            http_bind: env::var("HTTP_BIND").unwrap_or_else(|_| "0.0.0.0".to_string()),
            http_port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .unwrap_or(30),
            utc_offset_hours: env::var("UTC_OFFSET_HOURS")
                .unwrap_or_else(|_| "8".to_string())
                .parse()
                .unwrap_or(8),
            auto_chat_channel_id: channel_var("AUTO_CHAT_CHANNEL_ID"),
            news_channel_id: channel_var("NEWS_CHANNEL_ID"),
            weather_channel_id: channel_var("WEATHER_CHANNEL_ID"),
            video_channel_id: channel_var("VIDEO_CHANNEL_ID"),
            pause_channel_id: channel_var("PAUSE_CHANNEL_ID"),
            map_channel_id: channel_var("MAP_CHANNEL_ID"),
            shopping_channel_id: channel_var("SHOPPING_CHANNEL_ID"),
            todo_channel_id: channel_var("TODO_CHANNEL_ID"),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "data/economy.db".to_string()),
            todo_file: env::var("TODO_FILE")
                .unwrap_or_else(|_| "data/todo_board.json".to_string()),
            work_cooldown_secs: env::var("WORK_COOLDOWN_SECS")
                .unwrap_or_else(|_| "60".to_string())
                .parse()
                .unwrap_or(60),
            video_poll_interval_secs: env::var("VIDEO_POLL_INTERVAL")
                .ok()
                .and_then(|v| humantime::parse_duration(v.trim()).ok())
                .map(|d| d.as_secs().max(60))
                .unwrap_or(600),
            news_times: parse_times(
                &env::var("NEWS_TIMES").unwrap_or_else(|_| "01:00,04:00,10:00".to_string()),
            )?,
            weather_time: parse_time(
                &env::var("WEATHER_TIME").unwrap_or_else(|_| "22:00".to_string()),
            )?,
            news_language: env::var("NEWS_LANGUAGE").unwrap_or_else(|_| "zh-TW".to_string()),
            news_region: env::var("NEWS_REGION").unwrap_or_else(|_| "TW".to_string()),
            news_edition: env::var("NEWS_EDITION").unwrap_or_else(|_| "TW:zh-Hant".to_string()),
            broadcasts: Self::load_broadcasts(
                &env::var("BROADCASTS_FILE").unwrap_or_else(|_| "broadcasts.toml".to_string()),
            ),
        })
    }

    /// Reads the broadcast lists file, falling back to the built-in lists.
    pub fn load_broadcasts(path: &str) -> BroadcastLists {
        match fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<BroadcastLists>(&content) {
                Ok(lists) => lists,
                Err(e) => {
                    warn!("Ignoring invalid {}: {}", path, e);
                    BroadcastLists::default()
                }
            },
            Err(_) => BroadcastLists::default(),
        }
    }

    pub fn http_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.http_bind, self.http_port)
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid HTTP_BIND/PORT: {}", e))
    }

    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600).unwrap_or_else(|| Utc.fix())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

impl Default for BroadcastLists {
    fn default() -> Self {
        let youtube = [
            ("Modern Wisdom", "UCIaH-gZIVC432YRjNVvnyCA"),
            ("Andrew Huberman", "UC2D2CMWXMOVWx7giW1n3LIg"),
            ("Hamza Ahmed", "UCWsslCoN3b_wBaFVWK_ye_A"),
            ("The Diary of a CEO", "UCGq-a57w-aPwyi3pW7XLiHw"),
            ("HealthyGamerGG", "UClHVl2N3jPEbkNJVx-ItQIQ"),
            ("Mark Manson", "UC0TnW9acNxqeojxXDMbohcA"),
        ]
        .into_iter()
        .map(|(name, channel_id)| YoutubeChannel {
            name: name.to_string(),
            channel_id: channel_id.to_string(),
        })
        .collect();

        let weather = vec![
            WeatherLocation {
                name: "Taipei City".to_string(),
                lat: 25.0330,
                lon: 121.5654,
                channel_id: None,
            },
            WeatherLocation {
                name: "New Taipei City".to_string(),
                lat: 25.0143,
                lon: 121.4672,
                channel_id: None,
            },
        ];

        Self { youtube, weather }
    }
}

fn channel_var(key: &str) -> Option<u64> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse::<u64>() {
        Ok(id) if id != 0 => Some(id),
        _ => {
            warn!("{} is not a valid channel id: {:?}", key, raw);
            None
        }
    }
}

fn parse_time(raw: &str) -> anyhow::Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| anyhow::anyhow!("Invalid time of day {:?}, expected HH:MM", raw))
}

fn parse_times(raw: &str) -> anyhow::Result<Vec<NaiveTime>> {
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(parse_time)
        .collect()
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("discord_token", &"[REDACTED]")
            .field("command_prefix", &self.command_prefix)
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("gemini_model", &self.gemini_model)
            .field("gemini_api_base", &self.gemini_api_base)
            .field("system_prompt", &self.system_prompt)
            .field("http_bind", &self.http_bind)
            .field("http_port", &self.http_port)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("utc_offset_hours", &self.utc_offset_hours)
            .field("auto_chat_channel_id", &self.auto_chat_channel_id)
            .field("news_channel_id", &self.news_channel_id)
            .field("weather_channel_id", &self.weather_channel_id)
            .field("video_channel_id", &self.video_channel_id)
            .field("pause_channel_id", &self.pause_channel_id)
            .field("map_channel_id", &self.map_channel_id)
            .field("shopping_channel_id", &self.shopping_channel_id)
            .field("todo_channel_id", &self.todo_channel_id)
            .field("database_url", &self.database_url)
            .field("todo_file", &self.todo_file)
            .field("work_cooldown_secs", &self.work_cooldown_secs)
            .field("video_poll_interval_secs", &self.video_poll_interval_secs)
            .field("news_times", &self.news_times)
            .field("weather_time", &self.weather_time)
            .field("news_language", &self.news_language)
            .field("news_region", &self.news_region)
            .field("news_edition", &self.news_edition)
            .field("broadcasts", &self.broadcasts)
            .finish()
    }
}

/// Discord message limit is 2000 characters
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;
/// Embed description limit is 4096 characters
pub const DISCORD_EMBED_LIMIT: usize = 4096;

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_config_logic() {
        // 1. Test missing vars
        env::remove_var("DISCORD_TOKEN");
        let result = Config::build();
        assert!(result.is_err(), "Should fail when DISCORD_TOKEN is missing");

        // 2. Test defaults
        env::set_var("DISCORD_TOKEN", "test_token");
        env::remove_var("MAP_CHANNEL_ID");
        let config = Config::build().unwrap();
        assert_eq!(config.discord_token, "test_token");
        assert_eq!(config.http_port, 8080);
        assert_eq!(config.work_cooldown_secs, 60);
        assert_eq!(config.map_channel_id, None);
        assert_eq!(config.news_times.len(), 3);
        assert_eq!(config.utc_offset().local_minus_utc(), 8 * 3600);

        // 3. Optional channel ids
        env::set_var("MAP_CHANNEL_ID", "1234");
        env::set_var("TODO_CHANNEL_ID", "not-a-number");
        let config = Config::build().unwrap();
        assert_eq!(config.map_channel_id, Some(1234));
        assert_eq!(config.todo_channel_id, None);

        // 4. Test debug redaction
        env::set_var("GEMINI_API_KEY", "secret_api_key");
        let config_redacted = Config::build().unwrap();
        let debug_output = format!("{:?}", config_redacted);
        assert!(!debug_output.contains("test_token"));
        assert!(!debug_output.contains("secret_api_key"));
        assert!(debug_output.contains("[REDACTED]"));

        // Cleanup
        env::remove_var("DISCORD_TOKEN");
        env::remove_var("MAP_CHANNEL_ID");
        env::remove_var("TODO_CHANNEL_ID");
        env::remove_var("GEMINI_API_KEY");
    }

    #[test]
    fn test_parse_times() {
        let times = parse_times("01:00, 04:30,10:00").unwrap();
        assert_eq!(times[1], NaiveTime::from_hms_opt(4, 30, 0).unwrap());
        assert!(parse_times("25:00").is_err());
    }

    #[test]
    fn test_broadcast_lists_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broadcasts.toml");
        fs::write(
            &path,
            r#"
[[youtube]]
name = "Test Channel"
channel_id = "UC123"

[[weather]]
name = "Kaohsiung"
lat = 22.62
lon = 120.30
channel_id = 42
"#,
        )
        .unwrap();

        let lists = Config::load_broadcasts(path.to_str().unwrap());
        assert_eq!(lists.youtube.len(), 1);
        assert_eq!(lists.youtube[0].channel_id, "UC123");
        assert_eq!(lists.weather[0].channel_id, Some(42));

        // Missing file falls back to the built-in lists
        let fallback = Config::load_broadcasts("/nonexistent/broadcasts.toml");
        assert_eq!(fallback, BroadcastLists::default());
        assert!(!fallback.youtube.is_empty());
    }
}
