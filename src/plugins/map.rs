//! `POST /recommend`: turns a GPS fix into a browsable list of nearby places.

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::{
    ChannelId, ComponentInteraction, CreateActionRow, CreateButton, CreateEmbed,
    CreateEmbedFooter, CreateInteractionResponse, CreateInteractionResponseMessage,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use url::Url;

use super::{ephemeral, Deps};
use crate::config::DISCORD_EMBED_LIMIT;
use crate::discord_text::truncate_chars;
use crate::error::BotError;
use crate::host::{HostContext, Plugin};
use crate::llm::{GeminiClient, GenerativeModel, Turn};
use crate::pager::{nav_row, PagerAction, PagerStore, Paginator};
use crate::poster::{ChannelPoster, Post};
use crate::{Data, Error};

pub const PREFIX: &str = "map";
const PLACE_COUNT: usize = 5;
const PAGER_CAPACITY: usize = 100;
const PAGER_TTL: Duration = Duration::from_secs(60 * 60);
const MAPS_SEARCH: &str = "https://www.google.com/maps/search/";
/// Stands in for blank columns; Discord rejects empty embed fields.
const BLANK: &str = "-";

#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub name: String,
    pub description: String,
    pub category: String,
    pub tags: String,
}

fn or_blank(value: String) -> String {
    if value.trim().is_empty() {
        BLANK.to_string()
    } else {
        value
    }
}

/// Parses `name|description|category|#tags` lines. Anything else is ignored.
pub fn parse_places(text: &str) -> Vec<Place> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim().trim_start_matches(['-', '*', ' ']);
            let parts: Vec<&str> = line.split('|').map(str::trim).collect();
            if parts.len() < 4 || parts[0].is_empty() {
                return None;
            }
            Some(Place {
                name: parts[0].trim_matches('*').trim().to_string(),
                description: or_blank(parts[1].to_string()),
                category: or_blank(parts[2].to_string()),
                tags: or_blank(parts[3..].join(" ").trim().to_string()),
            })
        })
        .collect()
}

pub fn maps_link(name: &str) -> String {
    Url::parse_with_params(MAPS_SEARCH, [("api", "1"), ("query", name)])
        .map(String::from)
        .unwrap_or_else(|_| MAPS_SEARCH.to_string())
}

fn coordinate(value: Option<&Value>) -> Result<f64, &'static str> {
    match value {
        None | Some(Value::Null) => Err("No GPS Data"),
        Some(Value::Number(n)) => n.as_f64().ok_or("Invalid GPS Data"),
        Some(Value::String(s)) if s.trim().is_empty() => Err("No GPS Data"),
        Some(Value::String(s)) => s.trim().parse().map_err(|_| "Invalid GPS Data"),
        Some(_) => Err("Invalid GPS Data"),
    }
}

/// Reads `{lat, lon}` where each is a number or a numeric string.
pub fn parse_coordinates(body: &str) -> Result<(f64, f64), &'static str> {
    let json: Value = serde_json::from_str(body).map_err(|_| "Invalid JSON")?;
    let lat = coordinate(json.get("lat"))?;
    let lon = coordinate(json.get("lon"))?;
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
        return Err("Invalid GPS Data");
    }
    Ok((lat, lon))
}

fn prompt(lat: f64, lon: f64) -> String {
    format!(
        "The user is at coordinates {lat},{lon}. Recommend {PLACE_COUNT} nearby places \
         (food or sights). Answer with one place per line and nothing else, formatted as: \
         name|short description|category|#tags"
    )
}

/// One place per page, with a Google Maps button for it.
pub fn place_post(pager: &Paginator<Place>) -> Post {
    let Some(place) = pager.current().first() else {
        return Post::text("😵 No places to show.");
    };
    let emoji = if place.category.to_lowercase().contains("food") {
        "🍴"
    } else {
        "🎉"
    };
    let embed = CreateEmbed::new()
        .title(format!("📍 {}", place.name))
        .description(truncate_chars(&place.description, DISCORD_EMBED_LIMIT))
        .color(0x3498db)
        .field("Category", format!("{} {}", emoji, place.category), true)
        .field("Tags", &place.tags, true)
        .footer(CreateEmbedFooter::new(format!(
            "Recommended by Gemini · {}/{}",
            pager.page() + 1,
            pager.page_count()
        )));
    let link = CreateActionRow::Buttons(vec![
        CreateButton::new_link(maps_link(&place.name)).label("🚀 Open in Google Maps")
    ]);
    Post::embed(embed).with_components(vec![
        nav_row(PREFIX, pager.page(), pager.page_count(), false),
        link,
    ])
}

pub struct MapPlugin {
    model: Arc<dyn GenerativeModel>,
    poster: Arc<dyn ChannelPoster>,
    channel: Option<u64>,
    pagers: PagerStore<Place>,
}

impl MapPlugin {
    pub fn build(deps: &Deps<'_>) -> anyhow::Result<Self> {
        let model = GeminiClient::from_config(deps.config, deps.http_client.clone())
            .ok_or_else(|| anyhow::anyhow!("GEMINI_API_KEY is not set"))?;
        Ok(Self::new(
            Arc::new(model),
            deps.poster(),
            deps.config.map_channel_id,
        ))
    }

    pub fn new(
        model: Arc<dyn GenerativeModel>,
        poster: Arc<dyn ChannelPoster>,
        channel: Option<u64>,
    ) -> Self {
        Self {
            model,
            poster,
            channel,
            pagers: PagerStore::new(PAGER_CAPACITY, PAGER_TTL),
        }
    }

    /// Handles one `/recommend` request body.
    pub async fn recommend(&self, body: &str) -> (StatusCode, String) {
        let (lat, lon) = match parse_coordinates(body) {
            Ok(coords) => coords,
            Err(reason) => return (StatusCode::BAD_REQUEST, reason.to_string()),
        };
        let Some(channel) = self.channel.map(ChannelId::new) else {
            error!("Map: MAP_CHANNEL_ID is not set");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Server Config Error: MAP_CHANNEL_ID not set".to_string(),
            );
        };

        let thinking = Post::text(format!(
            "🛰️ Got coordinates ({}, {}), looking for places nearby...",
            lat, lon
        ));
        let message = match self.poster.post(channel, thinking).await {
            Ok(id) => id,
            Err(e) if e.is_not_found() => {
                return (StatusCode::NOT_FOUND, "Channel Not Found".to_string())
            }
            Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        match self.fill(channel, message, lat, lon).await {
            Ok(0) => (StatusCode::OK, "No Data".to_string()),
            Ok(n) => {
                info!("Map: recommended {} place(s) near {},{}", n, lat, lon);
                (StatusCode::OK, "OK".to_string())
            }
            Err(e) => {
                error!("Map: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
            }
        }
    }

    async fn fill(
        &self,
        channel: ChannelId,
        message: serenity::MessageId,
        lat: f64,
        lon: f64,
    ) -> Result<usize, BotError> {
        let answer = match self.model.generate("", &[Turn::user(prompt(lat, lon))]).await {
            Ok(answer) => answer,
            Err(e) => {
                let notice = Post::text("😵 The recommender is unavailable right now.");
                self.poster.edit(channel, message, notice).await?;
                return Err(BotError::Upstream(e.to_string()));
            }
        };

        let places = parse_places(&answer);
        if places.is_empty() {
            warn!("Map: model answer had no usable lines");
            let notice = Post::text("😵 This area looks deserted, no places were found.");
            self.poster.edit(channel, message, notice).await?;
            return Ok(0);
        }

        let count = places.len();
        let pager = Paginator::new(places, 1);
        let mut post = place_post(&pager);
        post.content = Some(format!("📍 Places near ({:.4}, {:.4}):", lat, lon));
        self.poster.edit(channel, message, post).await?;
        self.pagers.insert(message.get(), pager);
        Ok(count)
    }

    async fn on_component(
        &self,
        ctx: &serenity::Context,
        component: &ComponentInteraction,
    ) -> Result<(), Error> {
        let Some(action) = PagerAction::parse(PREFIX, &component.data.custom_id) else {
            return Ok(());
        };
        let post = self.pagers.with(component.message.id.get(), |pager| {
            match action {
                PagerAction::Prev => pager.prev(),
                _ => pager.next(),
            }
            place_post(pager)
        });
        let response = match post {
            Some(post) => CreateInteractionResponse::UpdateMessage(
                CreateInteractionResponseMessage::new()
                    .embeds(post.embeds)
                    .components(post.components),
            ),
            None => ephemeral("⌛ This list has expired, share your location again."),
        };
        component.create_response(&ctx.http, response).await?;
        Ok(())
    }
}

#[async_trait]
impl Plugin for MapPlugin {
    fn name(&self) -> &'static str {
        "map"
    }

    async fn init(self: Arc<Self>, host: &HostContext<'_>) -> anyhow::Result<()> {
        if self.channel.is_none() {
            warn!("MAP_CHANNEL_ID not set, /recommend will answer 500");
        }
        let plugin = self.clone();
        host.gateway
            .register(Method::POST, "/recommend", move |body: String| {
                let plugin = plugin.clone();
                async move { plugin.recommend(&body).await }
            })?;
        Ok(())
    }

    async fn on_event(
        &self,
        ctx: &serenity::Context,
        event: &serenity::FullEvent,
        _data: &Data,
    ) -> Result<(), Error> {
        if let serenity::FullEvent::InteractionCreate { interaction } = event {
            if let Some(component) = interaction.as_message_component() {
                self.on_component(ctx, component).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ModelError;
    use crate::test_support::{RecordingPoster, Sent};

    struct Scripted(Result<&'static str, ()>);

    #[async_trait]
    impl GenerativeModel for Scripted {
        async fn generate(&self, _system: &str, _turns: &[Turn]) -> Result<String, ModelError> {
            self.0
                .map(str::to_string)
                .map_err(|_| ModelError::Upstream("boom".into()))
        }
    }

    const ANSWER: &str = "Here you go:\n\
        Din Tai Fung|Famous dumplings|Food|#dumplings #classic\n\
        - Elephant Mountain | Short hike with a skyline view | Sight | #hike\n\
        not a place line";

    fn plugin(answer: Result<&'static str, ()>, channel: Option<u64>) -> (MapPlugin, Arc<RecordingPoster>) {
        let poster = Arc::new(RecordingPoster::new());
        let map = MapPlugin::new(Arc::new(Scripted(answer)), poster.clone(), channel);
        (map, poster)
    }

    #[test]
    fn test_parse_places() {
        let places = parse_places(ANSWER);
        assert_eq!(places.len(), 2);
        assert_eq!(places[0].name, "Din Tai Fung");
        assert_eq!(places[1].name, "Elephant Mountain");
        assert_eq!(places[1].tags, "#hike");

        let sparse = parse_places("A|b|c|\nB| |food|#x");
        assert_eq!(sparse[0].tags, "-");
        assert_eq!(sparse[0].category, "c");
        assert_eq!(sparse[1].description, "-");
        let card = serde_json::to_value(&place_post(&Paginator::new(sparse, 1)).embeds[0]).unwrap();
        assert_eq!(card["fields"][1]["value"], "-");
    }

    #[test]
    fn test_coordinates_accept_numbers_and_strings() {
        assert_eq!(parse_coordinates(r#"{"lat":25.03,"lon":"121.56"}"#), Ok((25.03, 121.56)));
        assert_eq!(parse_coordinates(r#"{"lon":121.5}"#), Err("No GPS Data"));
        assert_eq!(parse_coordinates(r#"{"lat":"north","lon":1}"#), Err("Invalid GPS Data"));
        assert_eq!(parse_coordinates("not json"), Err("Invalid JSON"));
    }

    #[test]
    fn test_maps_link_is_encoded() {
        assert_eq!(
            maps_link("Din Tai Fung 101"),
            "https://www.google.com/maps/search/?api=1&query=Din+Tai+Fung+101"
        );
    }

    #[tokio::test]
    async fn test_recommend_posts_then_edits_into_stepper() {
        let (map, poster) = plugin(Ok(ANSWER), Some(7));
        let (status, body) = map.recommend(r#"{"lat":"25.03","lon":121.56}"#).await;
        assert_eq!((status, body.as_str()), (StatusCode::OK, "OK"));

        let sent = poster.sent();
        assert!(matches!(sent[0], Sent::Post { channel: 7, .. }));
        let edits = poster.edits();
        assert_eq!(edits.len(), 1);
        let (message_id, post) = &edits[0];
        assert_eq!(post.components.len(), 2);
        let embed = serde_json::to_value(&post.embeds[0]).unwrap();
        assert_eq!(embed["title"], "📍 Din Tai Fung");

        let next = map.pagers.with(*message_id, |p| {
            p.next();
            p.next();
            p.page()
        });
        assert_eq!(next, Some(0));
    }

    #[tokio::test]
    async fn test_recommend_error_statuses() {
        let (map, _) = plugin(Ok(ANSWER), Some(7));
        assert_eq!(map.recommend("{}").await.0, StatusCode::BAD_REQUEST);

        let (unset, _) = plugin(Ok(ANSWER), None);
        let (status, body) = unset.recommend(r#"{"lat":1,"lon":2}"#).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, "Server Config Error: MAP_CHANNEL_ID not set");

        let (gone, poster) = plugin(Ok(ANSWER), Some(7));
        poster.missing_channels.lock().unwrap().insert(7);
        let (status, body) = gone.recommend(r#"{"lat":1,"lon":2}"#).await;
        assert_eq!((status, body.as_str()), (StatusCode::NOT_FOUND, "Channel Not Found"));
    }

    #[tokio::test]
    async fn test_recommend_without_places() {
        let (map, poster) = plugin(Ok("sorry, nothing here"), Some(7));
        let (status, body) = map.recommend(r#"{"lat":1,"lon":2}"#).await;
        assert_eq!((status, body.as_str()), (StatusCode::OK, "No Data"));
        assert_eq!(poster.edits().len(), 1);

        let (failing, _) = plugin(Err(()), Some(7));
        assert_eq!(
            failing.recommend(r#"{"lat":1,"lon":2}"#).await.0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
