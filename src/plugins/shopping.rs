use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::{
    ChannelId, ComponentInteraction, CreateEmbed, CreateEmbedFooter, CreateInteractionResponse,
    CreateInteractionResponseMessage, MessageId,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{ephemeral, Deps};
use crate::error::BotError;
use crate::host::Plugin;
use crate::pager::{nav_row, PagerAction, PagerStore, Paginator};
use crate::poster::{ChannelPoster, Post};
use crate::services::shopping::{Product, ShoppingService};
use crate::{Command, Data, Error};

pub const PREFIX: &str = "shop";
const PER_PAGE: usize = 5;
const PAGER_CAPACITY: usize = 200;
const PAGER_TTL: Duration = Duration::from_secs(30 * 60);

fn product_card(product: &Product) -> CreateEmbed {
    let mut embed = CreateEmbed::new()
        .title(if product.name.is_empty() { "Unknown product" } else { product.name.as_str() })
        .url(product.link())
        .color(0xea1717)
        .description(format!("💰 **{}**", product.price_label()));
    if let Some(image) = product.image_url() {
        embed = embed.thumbnail(image);
    }
    embed
}

/// One card per product on the current page; the last card carries the page footer.
pub fn page_post(pager: &Paginator<Product>) -> Post {
    let mut embeds: Vec<CreateEmbed> = pager.current().iter().map(product_card).collect();
    if let Some(last) = embeds.pop() {
        embeds.push(last.footer(CreateEmbedFooter::new(format!(
            "Page {} / {} ({} results)",
            pager.page() + 1,
            pager.page_count(),
            pager.len()
        ))));
    }
    Post {
        content: None,
        embeds,
        components: vec![nav_row(PREFIX, pager.page(), pager.page_count(), true)],
    }
}

pub struct ShoppingPlugin {
    service: ShoppingService,
    poster: Arc<dyn ChannelPoster>,
    channel: Option<u64>,
    prefix: String,
    pagers: PagerStore<Product>,
}

impl ShoppingPlugin {
    pub fn build(deps: &Deps<'_>) -> Self {
        Self {
            service: ShoppingService::new(deps.http_client.clone()),
            poster: deps.poster(),
            channel: deps.config.shopping_channel_id,
            prefix: deps.config.command_prefix.clone(),
            pagers: PagerStore::new(PAGER_CAPACITY, PAGER_TTL),
        }
    }

    pub async fn search(&self, keyword: &str) -> Result<Vec<Product>, BotError> {
        self.service.search(keyword).await
    }

    /// Starts a pager over `products` and returns its first page.
    pub fn first_page(products: Vec<Product>) -> (Paginator<Product>, Post) {
        let pager = Paginator::new(products, PER_PAGE);
        let post = page_post(&pager);
        (pager, post)
    }

    /// Remembers the pager shown by `message`.
    pub fn track(&self, message: MessageId, pager: Paginator<Product>) {
        self.pagers.insert(message.get(), pager);
    }

    async fn search_in_channel(&self, channel: ChannelId, keyword: &str) -> Result<(), BotError> {
        let progress = self
            .poster
            .post(channel, Post::text(format!("🔍 Searching PChome for {}…", keyword)))
            .await?;

        let products = match self.search(keyword).await {
            Ok(products) => products,
            Err(e) => {
                self.poster
                    .edit(channel, progress, Post::text("⚠️ The shop search is unavailable right now."))
                    .await?;
                return Err(e);
            }
        };
        if products.is_empty() {
            self.poster
                .edit(channel, progress, Post::text(format!("❌ Nothing found for “{}”.", keyword)))
                .await?;
            return Ok(());
        }

        info!("Shopping: {} result(s) for {:?}", products.len(), keyword);
        self.poster.delete(channel, progress).await?;
        let (pager, post) = Self::first_page(products);
        let message = self.poster.post(channel, post).await?;
        self.track(message, pager);
        Ok(())
    }

    async fn on_component(
        &self,
        ctx: &serenity::Context,
        component: &ComponentInteraction,
    ) -> Result<(), Error> {
        let Some(action) = PagerAction::parse(PREFIX, &component.data.custom_id) else {
            return Ok(());
        };
        let message_id = component.message.id.get();

        if action == PagerAction::Close {
            self.pagers.remove(message_id);
            component
                .create_response(&ctx.http, CreateInteractionResponse::Acknowledge)
                .await?;
            component.message.delete(&ctx.http).await?;
            return Ok(());
        }

        let post = self.pagers.with(message_id, |pager| {
            match action {
                PagerAction::Next => pager.next(),
                _ => pager.prev(),
            }
            page_post(pager)
        });
        let response = match post {
            Some(post) => CreateInteractionResponse::UpdateMessage(
                CreateInteractionResponseMessage::new()
                    .embeds(post.embeds)
                    .components(post.components),
            ),
            None => ephemeral("⌛ These results have expired, search again."),
        };
        component.create_response(&ctx.http, response).await?;
        Ok(())
    }
}

#[async_trait]
impl Plugin for ShoppingPlugin {
    fn name(&self) -> &'static str {
        "shopping"
    }

    fn commands(&self) -> Vec<Command> {
        vec![crate::commands::shopping::shop()]
    }

    async fn on_event(
        &self,
        ctx: &serenity::Context,
        event: &serenity::FullEvent,
        _data: &Data,
    ) -> Result<(), Error> {
        match event {
            serenity::FullEvent::Message { new_message } => {
                if new_message.author.bot || self.channel != Some(new_message.channel_id.get()) {
                    return Ok(());
                }
                let keyword = new_message.content.trim();
                if keyword.is_empty() || keyword.starts_with(&self.prefix) {
                    return Ok(());
                }
                debug!("Shopping: channel search for {:?}", keyword);
                self.search_in_channel(new_message.channel_id, keyword).await?;
            }
            serenity::FullEvent::InteractionCreate { interaction } => {
                if let Some(component) = interaction.as_message_component() {
                    self.on_component(ctx, component).await?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}
