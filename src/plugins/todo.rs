//! Shared team to-do board with a dashboard message that is kept in sync.
//!
//! The dashboard lives in `TODO_CHANNEL_ID`. Every mutation re-renders it; when the stored
//! dashboard message is gone a new one is posted and its id saved in the document.

use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use poise::serenity_prelude::{
    ActionRowComponent, ButtonStyle, ChannelId, ComponentInteraction,
    ComponentInteractionDataKind, CreateActionRow, CreateButton, CreateEmbed, CreateEmbedFooter,
    CreateInputText, CreateInteractionResponse, CreateInteractionResponseMessage, CreateModal,
    CreateSelectMenu, CreateSelectMenuKind, CreateSelectMenuOption, InputTextStyle, MessageId,
    ModalInteraction, Timestamp,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

use super::{ephemeral, Deps};
use crate::discord_text::truncate_chars;
use crate::error::BotError;
use crate::host::Plugin;
use crate::poster::{ChannelPoster, Post};
use crate::services::todo::{TaskItem, TaskRef, TodoDocument, TodoError, TodoStore};
use crate::{Command, Data, Error};

const ADD: &str = "todo:add";
const ADD_MODAL: &str = "todo:add_modal";
const REMOVE: &str = "todo:remove";
const REMOVE_SELECT: &str = "todo:remove_select";
const REFRESH: &str = "todo:refresh";
const TOGGLE: &str = "todo:toggle";

const FIELD_LIMIT: usize = 1024;
const SELECT_LIMIT: usize = 25;

fn task_label(item: &TaskItem) -> String {
    if item.is_done() {
        format!("~~{}~~ ✅", item.text)
    } else {
        format!("**{}**", item.text)
    }
}

fn render_lines(
    items: &[TaskItem],
    parent: Option<&TaskRef>,
    expanded: &HashSet<u64>,
    out: &mut Vec<String>,
) {
    for (i, item) in items.iter().enumerate() {
        let at = match parent {
            Some(p) => p.child(i),
            None => TaskRef::top(i),
        };
        let indent = if at.depth() > 1 {
            format!("{}└ ", "　".repeat(at.depth() - 2))
        } else {
            String::new()
        };
        let mut line = format!("{}`{}.` {} - *{}*", indent, at, task_label(item), item.owner);

        if item.children.is_empty() {
            out.push(line);
        } else if expanded.contains(&item.id) {
            out.push(line);
            render_lines(&item.children, Some(&at), expanded, out);
        } else {
            line.push_str(&format!(" (+{} sub-task(s))", item.children.len()));
            out.push(line);
        }
    }
}

/// The dashboard body: one embed plus the control rows.
pub fn render(doc: &TodoDocument, expanded: &HashSet<u64>) -> Post {
    let mut embed = CreateEmbed::new()
        .title("🔥 Team to-do board")
        .description("Use the buttons below to manage tasks 👇")
        .color(0xf1c40f)
        .footer(CreateEmbedFooter::new("Last updated"))
        .timestamp(Timestamp::now());

    if doc.tasks.is_empty() {
        embed = embed.field("Status", "🎉 Nothing left to do, nice work everyone!", false);
    } else {
        let mut lines = Vec::new();
        render_lines(&doc.tasks, None, expanded, &mut lines);
        embed = embed.field("Tasks", truncate_chars(&lines.join("\n"), FIELD_LIMIT), false);
    }

    let mut rows = vec![CreateActionRow::Buttons(vec![
        CreateButton::new(ADD)
            .label("➕ Add task")
            .style(ButtonStyle::Success),
        CreateButton::new(REMOVE)
            .label("🗑️ Remove")
            .style(ButtonStyle::Danger),
        CreateButton::new(REFRESH)
            .label("🔄 Refresh")
            .style(ButtonStyle::Secondary),
    ])];

    let parents: Vec<CreateSelectMenuOption> = doc
        .flatten()
        .into_iter()
        .filter(|(_, item)| !item.children.is_empty())
        .take(SELECT_LIMIT)
        .map(|(at, item)| {
            let action = if expanded.contains(&item.id) {
                "Collapse"
            } else {
                "Expand"
            };
            CreateSelectMenuOption::new(
                truncate_chars(&format!("{}. {}", at, item.text), 100),
                item.id.to_string(),
            )
            .description(format!("{} {} sub-task(s)", action, item.children.len()))
        })
        .collect();
    if !parents.is_empty() {
        rows.push(CreateActionRow::SelectMenu(
            CreateSelectMenu::new(TOGGLE, CreateSelectMenuKind::String { options: parents })
                .placeholder("Expand or collapse sub-tasks"),
        ));
    }

    Post::embed(embed).with_components(rows)
}

fn add_modal() -> CreateModal {
    CreateModal::new(ADD_MODAL, "New to-do item").components(vec![
        CreateActionRow::InputText(
            CreateInputText::new(InputTextStyle::Short, "Task", "task")
                .placeholder("e.g. fix the API bug")
                .max_length(100),
        ),
        CreateActionRow::InputText(
            CreateInputText::new(InputTextStyle::Short, "Owner", "owner")
                .placeholder("Who is on it? (optional)")
                .required(false)
                .max_length(20),
        ),
        CreateActionRow::InputText(
            CreateInputText::new(InputTextStyle::Short, "Parent position", "parent")
                .placeholder("e.g. 2 to add a sub-task (optional)")
                .required(false)
                .max_length(10),
        ),
    ])
}

fn modal_value<'a>(modal: &'a ModalInteraction, field: &str) -> Option<&'a str> {
    modal
        .data
        .components
        .iter()
        .flat_map(|row| row.components.iter())
        .find_map(|component| match component {
            ActionRowComponent::InputText(input) if input.custom_id == field => {
                input.value.as_deref()
            }
            _ => None,
        })
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn selected_value(component: &ComponentInteraction) -> Option<&str> {
    match &component.data.kind {
        ComponentInteractionDataKind::StringSelect { values } => {
            values.first().map(String::as_str)
        }
        _ => None,
    }
}

pub struct TodoPlugin {
    store: TodoStore,
    poster: Arc<dyn ChannelPoster>,
    channel: Option<ChannelId>,
    expanded: Mutex<HashSet<u64>>,
}

impl TodoPlugin {
    pub fn build(deps: &Deps<'_>) -> Self {
        let config = deps.config;
        if config.todo_channel_id.is_none() {
            warn!("TODO_CHANNEL_ID not set, the to-do dashboard is disabled");
        }
        Self::new(
            TodoStore::new(&config.todo_file),
            deps.poster(),
            config.todo_channel_id,
        )
    }

    pub fn new(store: TodoStore, poster: Arc<dyn ChannelPoster>, channel: Option<u64>) -> Self {
        Self {
            store,
            poster,
            channel: channel.map(ChannelId::new),
            expanded: Mutex::new(HashSet::new()),
        }
    }

    fn expanded(&self) -> HashSet<u64> {
        self.expanded.lock().map(|set| set.clone()).unwrap_or_default()
    }

    /// Flips one parent between expanded and collapsed.
    pub fn toggle(&self, id: u64) {
        if let Ok(mut set) = self.expanded.lock() {
            if !set.remove(&id) {
                set.insert(id);
            }
        }
    }

    pub async fn add(
        &self,
        text: &str,
        owner: &str,
        parent: Option<&str>,
    ) -> Result<(TaskRef, TaskItem), TodoError> {
        let parent = parent.map(str::parse::<TaskRef>).transpose()?;
        self.store
            .update(|doc| {
                let item = match &parent {
                    Some(parent) => doc.add_child(parent, text, owner)?,
                    None => doc.add(text, owner)?,
                };
                let (at, _) = doc.find(item.id).ok_or(TodoError::NoSuchId(item.id))?;
                Ok((at, item))
            })
            .await
    }

    pub async fn complete(&self, position: &str) -> Result<TaskItem, TodoError> {
        let at: TaskRef = position.parse()?;
        self.store.update(|doc| doc.complete(&at)).await
    }

    pub async fn delete(&self, position: &str) -> Result<TaskItem, TodoError> {
        let at: TaskRef = position.parse()?;
        self.store.update(|doc| doc.remove_at(&at)).await
    }

    pub async fn delete_id(&self, id: u64) -> Result<TaskItem, TodoError> {
        self.store.update(|doc| doc.remove(id)).await
    }

    pub async fn snapshot(&self) -> Result<Post, TodoError> {
        let doc = self.store.load().await?;
        Ok(render(&doc, &self.expanded()))
    }

    /// Edits the dashboard in place, or posts a new one when it is gone.
    pub async fn refresh_dashboard(&self) -> Result<MessageId, BotError> {
        let channel = self
            .channel
            .ok_or(BotError::MissingConfig("TODO_CHANNEL_ID"))?;
        let doc = self.store.load().await.map_err(todo_to_bot)?;
        let post = render(&doc, &self.expanded());

        if let Some(id) = doc.dashboard_message_id {
            let message = MessageId::new(id);
            match self.poster.edit(channel, message, post.clone()).await {
                Ok(()) => return Ok(message),
                Err(e) if e.is_not_found() => {
                    info!("To-do: dashboard {} is gone, posting a new one", id)
                }
                Err(e) => return Err(e),
            }
        }

        let message = self.poster.post(channel, post).await?;
        self.store
            .update(|doc| {
                doc.dashboard_message_id = Some(message.get());
                Ok(())
            })
            .await
            .map_err(todo_to_bot)?;
        Ok(message)
    }

    /// Refreshes after a mutation; a failure only costs a stale dashboard.
    pub async fn refresh_quietly(&self) {
        if self.channel.is_none() {
            return;
        }
        if let Err(e) = self.refresh_dashboard().await {
            warn!("To-do: dashboard refresh failed: {}", e);
        }
    }

    async fn on_component(
        &self,
        ctx: &serenity::Context,
        component: &ComponentInteraction,
    ) -> Result<(), Error> {
        match component.data.custom_id.as_str() {
            ADD => {
                component
                    .create_response(&ctx.http, CreateInteractionResponse::Modal(add_modal()))
                    .await?;
            }
            REMOVE => {
                let doc = self.store.load().await?;
                let response = if doc.tasks.is_empty() {
                    ephemeral("💤 There are no tasks right now.")
                } else {
                    let options = doc
                        .flatten()
                        .into_iter()
                        .take(SELECT_LIMIT)
                        .map(|(at, item)| {
                            CreateSelectMenuOption::new(
                                truncate_chars(&format!("{}. {}", at, item.text), 100),
                                item.id.to_string(),
                            )
                            .description(truncate_chars(&format!("Owner: {}", item.owner), 100))
                        })
                        .collect();
                    let menu = CreateSelectMenu::new(
                        REMOVE_SELECT,
                        CreateSelectMenuKind::String { options },
                    )
                    .placeholder("Pick the task to remove");
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new()
                            .content("Which task should go?")
                            .components(vec![CreateActionRow::SelectMenu(menu)])
                            .ephemeral(true),
                    )
                };
                component.create_response(&ctx.http, response).await?;
            }
            REMOVE_SELECT => {
                let id = selected_value(component).and_then(|v| v.parse::<u64>().ok());
                let content = match id {
                    Some(id) => match self.delete_id(id).await {
                        Ok(item) => format!("🗑️ Removed: {}", item.text),
                        Err(TodoError::NoSuchId(_)) => "❌ That task is already gone.".to_string(),
                        Err(e) => return Err(e.into()),
                    },
                    None => "❌ Nothing was selected.".to_string(),
                };
                component
                    .create_response(
                        &ctx.http,
                        CreateInteractionResponse::UpdateMessage(
                            CreateInteractionResponseMessage::new()
                                .content(content)
                                .components(vec![]),
                        ),
                    )
                    .await?;
                self.refresh_quietly().await;
            }
            REFRESH => {
                component
                    .create_response(&ctx.http, ephemeral("🔄 Dashboard refreshed."))
                    .await?;
                self.refresh_quietly().await;
            }
            TOGGLE => {
                if let Some(id) = selected_value(component).and_then(|v| v.parse::<u64>().ok()) {
                    self.toggle(id);
                }
                let post = self.snapshot().await?;
                component
                    .create_response(
                        &ctx.http,
                        CreateInteractionResponse::UpdateMessage(
                            CreateInteractionResponseMessage::new()
                                .embeds(post.embeds)
                                .components(post.components),
                        ),
                    )
                    .await?;
            }
            _ => {}
        }
        Ok(())
    }

    async fn on_modal(&self, ctx: &serenity::Context, modal: &ModalInteraction) -> Result<(), Error> {
        if modal.data.custom_id != ADD_MODAL {
            return Ok(());
        }
        let text = modal_value(modal, "task").unwrap_or_default();
        let owner = modal_value(modal, "owner").unwrap_or_else(|| modal.user.display_name());
        let parent = modal_value(modal, "parent");

        let reply = match self.add(text, owner, parent).await {
            Ok((at, item)) => format!("✅ Added `{}.` {}", at, item.text),
            Err(e @ (TodoError::Io(_) | TodoError::Json(_))) => return Err(e.into()),
            Err(e) => format!("❌ {}", e),
        };
        modal.create_response(&ctx.http, ephemeral(reply)).await?;
        self.refresh_quietly().await;
        Ok(())
    }
}

fn todo_to_bot(err: TodoError) -> BotError {
    match err {
        TodoError::Io(e) => BotError::Io(e),
        TodoError::Json(e) => BotError::Json(e),
        other => BotError::InvalidInput(other.to_string()),
    }
}

#[async_trait]
impl Plugin for TodoPlugin {
    fn name(&self) -> &'static str {
        "todo"
    }

    fn commands(&self) -> Vec<Command> {
        vec![crate::commands::todo::todo()]
    }

    async fn on_event(
        &self,
        ctx: &serenity::Context,
        event: &serenity::FullEvent,
        _data: &Data,
    ) -> Result<(), Error> {
        let serenity::FullEvent::InteractionCreate { interaction } = event else {
            return Ok(());
        };
        if let Some(component) = interaction.as_message_component() {
            if component.data.custom_id.starts_with("todo:") {
                return self.on_component(ctx, component).await;
            }
        } else if let Some(modal) = interaction.as_modal_submit() {
            return self.on_modal(ctx, modal).await;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{RecordingPoster, Sent};

    fn plugin(poster: Arc<RecordingPoster>, dir: &tempfile::TempDir) -> TodoPlugin {
        TodoPlugin::new(TodoStore::new(dir.path().join("board.json")), poster, Some(9))
    }

    fn tasks_field(post: &Post) -> String {
        let embed = serde_json::to_value(&post.embeds[0]).unwrap();
        embed["fields"][0]["value"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_sub_tasks_follow_expand_state() {
        let dir = tempfile::tempdir().unwrap();
        let todo = plugin(Arc::new(RecordingPoster::new()), &dir);

        todo.add("Ship release", "amy", None).await.unwrap();
        let (at, child) = todo.add("Write notes", "ben", Some("1")).await.unwrap();
        assert_eq!(at.to_string(), "1.1");

        let collapsed = tasks_field(&todo.snapshot().await.unwrap());
        assert!(collapsed.contains("(+1 sub-task(s))"));
        assert!(!collapsed.contains("Write notes"));

        todo.toggle(1);
        let post = todo.snapshot().await.unwrap();
        let expanded = tasks_field(&post);
        assert!(expanded.contains("`1.1.` **Write notes** - *ben*"));
        assert_eq!(post.components.len(), 2);

        todo.complete("1.1").await.unwrap();
        assert!(tasks_field(&todo.snapshot().await.unwrap()).contains("~~Write notes~~ ✅"));
        assert_eq!(child.id, 2);
    }

    #[tokio::test]
    async fn test_bad_parent_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let todo = plugin(Arc::new(RecordingPoster::new()), &dir);

        assert!(matches!(
            todo.add("orphan", "amy", Some("3")).await,
            Err(TodoError::NoSuchPosition(_))
        ));
        assert!(matches!(
            todo.add("orphan", "amy", Some("x")).await,
            Err(TodoError::BadPosition(_))
        ));
        assert!(todo.store.load().await.unwrap().tasks.is_empty());
    }

    #[tokio::test]
    async fn test_dashboard_is_edited_then_reposted_when_gone() {
        let dir = tempfile::tempdir().unwrap();
        let poster = Arc::new(RecordingPoster::new());
        let todo = plugin(poster.clone(), &dir);

        let first = todo.refresh_dashboard().await.unwrap();
        assert_eq!(
            todo.store.load().await.unwrap().dashboard_message_id,
            Some(first.get())
        );

        todo.add("A", "amy", None).await.unwrap();
        assert_eq!(todo.refresh_dashboard().await.unwrap(), first);
        assert_eq!(poster.edits().len(), 1);

        poster.missing_messages.lock().unwrap().insert(first.get());
        let second = todo.refresh_dashboard().await.unwrap();
        assert_ne!(second, first);
        assert_eq!(
            todo.store.load().await.unwrap().dashboard_message_id,
            Some(second.get())
        );
        assert!(matches!(poster.sent().last(), Some(Sent::Post { channel: 9, .. })));
    }

    #[tokio::test]
    async fn test_empty_board_has_no_toggle_row() {
        let dir = tempfile::tempdir().unwrap();
        let todo = plugin(Arc::new(RecordingPoster::new()), &dir);
        let post = todo.snapshot().await.unwrap();
        assert_eq!(post.components.len(), 1);
        let embed = serde_json::to_value(&post.embeds[0]).unwrap();
        assert_eq!(embed["fields"][0]["name"], "Status");
    }
}
