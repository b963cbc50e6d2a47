pub mod broadcast;
pub mod commands;
pub mod config;
pub mod db;
pub mod discord_text;
pub mod error;
pub mod gateway;
pub mod host;
pub mod llm;
pub mod pager;
pub mod plugins;
pub mod poster;
pub mod services;
pub mod supervisor;

#[cfg(test)]
pub(crate) mod test_support;

/// Custom data passed to all commands
pub struct Data {
    pub config: config::Config,
    pub http_client: reqwest::Client,
    /// Bot's own user ID, used for mention detection
    pub bot_id: u64,
    pub plugins: plugins::Plugins,
    pub load_report: host::LoadReport,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;
pub type Command = poise::Command<Data, Error>;
