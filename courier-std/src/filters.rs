//! Standard filters.
//!
//! Text filters work on any event implementing [`HasText`]; state filters
//! work on any event and consult the conversation store through
//! [`Context::fsm`]. Events without a conversation have no state.

use courier_core::{BoxError, CallbackQuery, ChatMessage, Context, Filter, InlineQuery};

/// Events carrying user-entered text.
pub trait HasText {
    /// The text, if any.
    fn text(&self) -> Option<&str>;
}

impl HasText for ChatMessage {
    fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }
}

impl HasText for InlineQuery {
    fn text(&self) -> Option<&str> {
        Some(&self.query)
    }
}

/// Passes when the text equals a fixed string.
#[derive(Debug, Clone)]
pub struct TextEq {
    expected: String,
}

/// Passes when the event text equals `expected` exactly.
pub fn text_eq(expected: impl Into<String>) -> TextEq {
    TextEq {
        expected: expected.into(),
    }
}

impl<B, E> Filter<B, E> for TextEq
where
    B: Sync,
    E: HasText + Sync,
{
    async fn test(&self, _ctx: &Context<B>, event: &E) -> Result<bool, BoxError> {
        Ok(event.text() == Some(self.expected.as_str()))
    }

    fn name(&self) -> &str {
        "text_eq"
    }
}

/// Passes when the text starts with a fixed prefix.
#[derive(Debug, Clone)]
pub struct TextStartsWith {
    prefix: String,
}

/// Passes when the event text starts with `prefix`.
pub fn text_starts_with(prefix: impl Into<String>) -> TextStartsWith {
    TextStartsWith {
        prefix: prefix.into(),
    }
}

impl<B, E> Filter<B, E> for TextStartsWith
where
    B: Sync,
    E: HasText + Sync,
{
    async fn test(&self, _ctx: &Context<B>, event: &E) -> Result<bool, BoxError> {
        Ok(event
            .text()
            .is_some_and(|text| text.starts_with(self.prefix.as_str())))
    }

    fn name(&self) -> &str {
        "text_starts_with"
    }
}

/// Passes for a bot command.
#[derive(Debug, Clone)]
pub struct Command {
    name: String,
}

/// Passes for `/name`, `/name@botname` and either followed by arguments.
///
/// A leading `/` in `name` is ignored, so `command("start")` and
/// `command("/start")` are equivalent.
pub fn command(name: impl Into<String>) -> Command {
    let name = name.into();
    Command {
        name: name.trim_start_matches('/').to_owned(),
    }
}

impl Command {
    /// Whether `text` invokes this command.
    pub fn matches(&self, text: &str) -> bool {
        let Some(rest) = text.strip_prefix('/') else {
            return false;
        };
        let token = rest.split_whitespace().next().unwrap_or_default();
        let invoked = token.split_once('@').map_or(token, |(name, _bot)| name);
        invoked == self.name
    }
}

impl<B, E> Filter<B, E> for Command
where
    B: Sync,
    E: HasText + Sync,
{
    async fn test(&self, _ctx: &Context<B>, event: &E) -> Result<bool, BoxError> {
        Ok(event.text().is_some_and(|text| self.matches(text)))
    }

    fn name(&self) -> &str {
        "command"
    }
}

/// Passes when a callback query carries the given data.
#[derive(Debug, Clone)]
pub struct CallbackDataEq {
    expected: String,
}

/// Passes when the callback data equals `expected`.
pub fn callback_data_eq(expected: impl Into<String>) -> CallbackDataEq {
    CallbackDataEq {
        expected: expected.into(),
    }
}

impl<B: Sync> Filter<B, CallbackQuery> for CallbackDataEq {
    async fn test(&self, _ctx: &Context<B>, event: &CallbackQuery) -> Result<bool, BoxError> {
        Ok(event.data.as_deref() == Some(self.expected.as_str()))
    }

    fn name(&self) -> &str {
        "callback_data_eq"
    }
}

/// Passes when the message was sent in a chat of the given type.
#[derive(Debug, Clone)]
pub struct ChatType {
    kind: String,
}

/// Passes when the chat type (`private`, `group`, `supergroup`, `channel`)
/// equals `kind`.
pub fn chat_type(kind: impl Into<String>) -> ChatType {
    ChatType { kind: kind.into() }
}

/// Passes for private chats.
pub fn chat_type_private() -> ChatType {
    chat_type("private")
}

impl<B: Sync> Filter<B, ChatMessage> for ChatType {
    async fn test(&self, _ctx: &Context<B>, event: &ChatMessage) -> Result<bool, BoxError> {
        Ok(event.chat.kind == self.kind)
    }

    fn name(&self) -> &str {
        "chat_type"
    }
}

/// Filters on the conversation state.
#[derive(Debug, Clone)]
pub enum StateFilter {
    /// State equals the given identifier.
    Is(String),
    /// No state is set.
    None,
    /// Some state is set.
    Any,
}

/// Passes when the conversation is in `state`.
pub fn state_is(state: impl Into<String>) -> StateFilter {
    StateFilter::Is(state.into())
}

/// Passes when the conversation has no state.
pub fn state_none() -> StateFilter {
    StateFilter::None
}

/// Passes when the conversation has any state.
pub fn any_state() -> StateFilter {
    StateFilter::Any
}

impl<B, E> Filter<B, E> for StateFilter
where
    B: Sync,
    E: Sync,
{
    async fn test(&self, ctx: &Context<B>, _event: &E) -> Result<bool, BoxError> {
        let state = match ctx.fsm() {
            Some(fsm) => fsm.state().await?,
            None => None,
        };
        Ok(match self {
            Self::Is(expected) => state.as_deref() == Some(expected.as_str()),
            Self::None => state.is_none(),
            Self::Any => state.is_some(),
        })
    }

    fn name(&self) -> &str {
        match self {
            Self::Is(_) => "state_is",
            Self::None => "state_none",
            Self::Any => "any_state",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{storage::MemoryStorage, testing::sample};
    use courier_core::{Category, Storage, StorageKey, UpdateMeta};
    use std::sync::Arc;

    fn ctx_with(storage: Arc<dyn Storage>, key: Option<StorageKey>) -> Context<()> {
        Context::new(
            (),
            UpdateMeta {
                update_id: 1,
                category: Category::Message,
            },
            storage,
            key,
        )
    }

    fn ctx() -> Context<()> {
        ctx_with(Arc::new(MemoryStorage::new()), None)
    }

    #[tokio::test]
    async fn test_text_filters() {
        let msg = sample::message(1, 1, "ping pong");
        assert!(!text_eq("ping").test(&ctx(), &msg).await.unwrap());
        assert!(text_eq("ping pong").test(&ctx(), &msg).await.unwrap());
        assert!(text_starts_with("ping").test(&ctx(), &msg).await.unwrap());
    }

    #[test]
    fn test_command_matching() {
        let start = command("/start");
        assert!(start.matches("/start"));
        assert!(start.matches("/start@courier_bot"));
        assert!(start.matches("/start payload here"));
        assert!(!start.matches("/started"));
        assert!(!start.matches("start"));
        assert!(!start.matches("/help"));
    }

    #[tokio::test]
    async fn test_chat_type_private() {
        let mut msg = sample::message(1, 1, "hi");
        assert!(chat_type_private().test(&ctx(), &msg).await.unwrap());
        msg.chat.kind = "group".into();
        assert!(!chat_type_private().test(&ctx(), &msg).await.unwrap());
    }

    #[tokio::test]
    async fn test_callback_data() {
        let query = sample::callback(1, "yes");
        assert!(callback_data_eq("yes").test(&ctx(), &query).await.unwrap());
        assert!(!callback_data_eq("no").test(&ctx(), &query).await.unwrap());
    }

    #[tokio::test]
    async fn test_state_filters_follow_store() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let key = StorageKey::new(2, 3);
        let ctx = ctx_with(Arc::clone(&storage), Some(key));
        let msg = sample::message(2, 3, "x");

        assert!(state_none().test(&ctx, &msg).await.unwrap());
        assert!(!any_state().test(&ctx, &msg).await.unwrap());

        storage.set_state(key, Some("AGE".into())).await.unwrap();
        assert!(state_is("AGE").test(&ctx, &msg).await.unwrap());
        assert!(!state_is("NAME").test(&ctx, &msg).await.unwrap());
        assert!(any_state().test(&ctx, &msg).await.unwrap());
    }

    #[tokio::test]
    async fn test_events_without_conversation_have_no_state() {
        let poll = sample::poll("p");
        assert!(state_none().test(&ctx(), &poll).await.unwrap());
        assert!(!any_state().test(&ctx(), &poll).await.unwrap());
    }
}
