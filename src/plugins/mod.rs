//! Every feature of the bot is a plugin. `load_all` declares the load order.

pub mod animals;
pub mod chat;
pub mod economy;
pub mod map;
pub mod news;
pub mod pause;
pub mod shopping;
pub mod todo;
pub mod video;
pub mod weather;

use poise::serenity_prelude as serenity;
use std::sync::Arc;

use crate::config::Config;
use crate::host::{LoadReport, Plugin, PluginHost};
use crate::poster::ChannelPoster;
use crate::Command;

/// Shared handles the plugins are built from.
pub struct Deps<'a> {
    pub config: &'a Config,
    pub http_client: reqwest::Client,
    pub discord: Arc<serenity::Http>,
}

impl Deps<'_> {
    pub fn poster(&self) -> Arc<dyn ChannelPoster> {
        self.discord.clone()
    }
}

/// A reply only the clicking user sees.
pub(crate) fn ephemeral(content: impl Into<String>) -> serenity::CreateInteractionResponse {
    serenity::CreateInteractionResponse::Message(
        serenity::CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    )
}

/// The loaded plugins, by concrete type for the commands that need them.
#[derive(Default)]
pub struct Plugins {
    pub loaded: Vec<Arc<dyn Plugin>>,
    pub chat: Option<Arc<chat::ChatPlugin>>,
    pub animals: Option<Arc<animals::AnimalsPlugin>>,
    pub news: Option<Arc<news::NewsPlugin>>,
    pub weather: Option<Arc<weather::WeatherPlugin>>,
    pub video: Option<Arc<video::VideoPlugin>>,
    pub economy: Option<Arc<economy::EconomyPlugin>>,
    pub todo: Option<Arc<todo::TodoPlugin>>,
    pub shopping: Option<Arc<shopping::ShoppingPlugin>>,
    pub map: Option<Arc<map::MapPlugin>>,
    pub pause: Option<Arc<pause::PausePlugin>>,
}

impl Plugins {
    pub fn commands(&self) -> Vec<Command> {
        self.loaded.iter().flat_map(|p| p.commands()).collect()
    }
}

pub async fn load_all(mut host: PluginHost<'_>, deps: &Deps<'_>) -> (Plugins, LoadReport) {
    let chat = host.load("chat", chat::ChatPlugin::build(deps)).await;
    let animals = host.load("animals", Ok(animals::AnimalsPlugin::build(deps))).await;
    let news = host.load("news", Ok(news::NewsPlugin::build(deps))).await;
    let weather = host.load("weather", Ok(weather::WeatherPlugin::build(deps))).await;
    let video = host.load("video", Ok(video::VideoPlugin::build(deps))).await;
    let economy = host.load("economy", economy::EconomyPlugin::build(deps)).await;
    let todo = host.load("todo", Ok(todo::TodoPlugin::build(deps))).await;
    let shopping = host.load("shopping", Ok(shopping::ShoppingPlugin::build(deps))).await;
    let map = host.load("map", map::MapPlugin::build(deps)).await;
    let pause = host.load("pause", pause::PausePlugin::build(deps)).await;

    let (loaded, report) = host.finish();
    let plugins = Plugins {
        loaded,
        chat,
        animals,
        news,
        weather,
        video,
        economy,
        todo,
        shopping,
        map,
        pause,
    };
    (plugins, report)
}
