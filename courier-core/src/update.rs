//! The update model.
//!
//! An [`Update`] mirrors the wire record of the external source: a numeric id
//! plus one optional field per category, of which exactly one is populated.
//! Only the payload fields the dispatch core and the standard filters look
//! at are modelled; unknown fields are ignored on decode.

use crate::{message::Event, message::Message, storage::StorageKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed set of update categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// A new incoming message.
    Message,
    /// A new version of a known message.
    EditedMessage,
    /// A new channel post.
    ChannelPost,
    /// A new version of a known channel post.
    EditedChannelPost,
    /// An incoming inline query.
    InlineQuery,
    /// The result of an inline query chosen by a user.
    ChosenInlineResult,
    /// An incoming callback query.
    CallbackQuery,
    /// An incoming shipping query.
    ShippingQuery,
    /// An incoming pre-checkout query.
    PreCheckoutQuery,
    /// A poll state change.
    Poll,
}

impl Category {
    /// Every category, in classification order.
    pub const ALL: [Category; 10] = [
        Category::Message,
        Category::EditedMessage,
        Category::ChannelPost,
        Category::EditedChannelPost,
        Category::InlineQuery,
        Category::ChosenInlineResult,
        Category::CallbackQuery,
        Category::ShippingQuery,
        Category::PreCheckoutQuery,
        Category::Poll,
    ];

    /// The wire name of the category (also the field name in [`Update`]).
    pub const fn as_str(self) -> &'static str {
        match self {
            Category::Message => "message",
            Category::EditedMessage => "edited_message",
            Category::ChannelPost => "channel_post",
            Category::EditedChannelPost => "edited_channel_post",
            Category::InlineQuery => "inline_query",
            Category::ChosenInlineResult => "chosen_inline_result",
            Category::CallbackQuery => "callback_query",
            Category::ShippingQuery => "shipping_query",
            Category::PreCheckoutQuery => "pre_checkout_query",
            Category::Poll => "poll",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user or bot account.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier.
    pub id: i64,
    /// Whether this account is a bot.
    #[serde(default)]
    pub is_bot: bool,
    /// First name.
    #[serde(default)]
    pub first_name: String,
    /// Username, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// A chat (private, group, supergroup or channel).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Chat {
    /// Unique identifier.
    pub id: i64,
    /// Chat type: `private`, `group`, `supergroup` or `channel`.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Title for groups and channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Username for private chats and public groups/channels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// A chat message or channel post.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Identifier inside the chat.
    pub message_id: i64,
    /// Unix time the message was sent.
    #[serde(default)]
    pub date: i64,
    /// The chat the message belongs to.
    pub chat: Chat,
    /// Sender; absent for channel posts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    /// Text of a text message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Caption of a media message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// An inline query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InlineQuery {
    /// Unique identifier.
    pub id: String,
    /// Sender.
    pub from: User,
    /// Text of the query.
    #[serde(default)]
    pub query: String,
    /// Offset of the results to be returned.
    #[serde(default)]
    pub offset: String,
}

/// A result of an inline query that was chosen by a user.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChosenInlineResult {
    /// Identifier of the chosen result.
    pub result_id: String,
    /// The user that chose the result.
    pub from: User,
    /// The query that was used to obtain the result.
    #[serde(default)]
    pub query: String,
    /// Identifier of the sent inline message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_message_id: Option<String>,
}

/// A callback query from an inline keyboard button.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CallbackQuery {
    /// Unique identifier.
    pub id: String,
    /// Sender.
    pub from: User,
    /// Message the button was attached to, if available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ChatMessage>,
    /// Identifier of the inline message the button was attached to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_message_id: Option<String>,
    /// Global identifier of the chat the message was sent to.
    #[serde(default)]
    pub chat_instance: String,
    /// Data associated with the button.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// An incoming shipping query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ShippingQuery {
    /// Unique identifier.
    pub id: String,
    /// Sender.
    pub from: User,
    /// Bot specified invoice payload.
    #[serde(default)]
    pub invoice_payload: String,
}

/// An incoming pre-checkout query.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PreCheckoutQuery {
    /// Unique identifier.
    pub id: String,
    /// Sender.
    pub from: User,
    /// Three-letter ISO 4217 currency code.
    #[serde(default)]
    pub currency: String,
    /// Total price in the smallest units of the currency.
    #[serde(default)]
    pub total_amount: i64,
    /// Bot specified invoice payload.
    #[serde(default)]
    pub invoice_payload: String,
}

/// A poll.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Poll {
    /// Unique identifier.
    pub id: String,
    /// Poll question.
    #[serde(default)]
    pub question: String,
    /// Total number of users that voted.
    #[serde(default)]
    pub total_voter_count: i64,
    /// Whether the poll is closed.
    #[serde(default)]
    pub is_closed: bool,
}

/// One event emitted by the update source.
///
/// Exactly one payload field is expected to be populated. [`Update::classify`]
/// is total over that invariant and returns `None` when nothing is populated
/// (such updates are dropped silently by the router).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Update {
    /// Monotonically increasing update identifier.
    pub update_id: i64,
    /// Payload of a `message` update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<ChatMessage>,
    /// Payload of an `edited_message` update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_message: Option<ChatMessage>,
    /// Payload of a `channel_post` update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_post: Option<ChatMessage>,
    /// Payload of an `edited_channel_post` update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edited_channel_post: Option<ChatMessage>,
    /// Payload of an `inline_query` update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_query: Option<InlineQuery>,
    /// Payload of a `chosen_inline_result` update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chosen_inline_result: Option<ChosenInlineResult>,
    /// Payload of a `callback_query` update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_query: Option<CallbackQuery>,
    /// Payload of a `shipping_query` update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shipping_query: Option<ShippingQuery>,
    /// Payload of a `pre_checkout_query` update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_checkout_query: Option<PreCheckoutQuery>,
    /// Payload of a `poll` update.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll: Option<Poll>,
}

impl Update {
    /// Returns the category of the populated payload, or `None` if the update
    /// carries nothing the dispatcher knows about.
    pub fn classify(&self) -> Option<Category> {
        let populated = [
            self.message.is_some(),
            self.edited_message.is_some(),
            self.channel_post.is_some(),
            self.edited_channel_post.is_some(),
            self.inline_query.is_some(),
            self.chosen_inline_result.is_some(),
            self.callback_query.is_some(),
            self.shipping_query.is_some(),
            self.pre_checkout_query.is_some(),
            self.poll.is_some(),
        ];
        Category::ALL
            .into_iter()
            .zip(populated)
            .find_map(|(category, present)| present.then_some(category))
    }
}

impl Message for Update {}

// Payload messages

impl Message for ChatMessage {}
impl Message for InlineQuery {}
impl Message for ChosenInlineResult {}
impl Message for CallbackQuery {}
impl Message for ShippingQuery {}
impl Message for PreCheckoutQuery {}
impl Message for Poll {}

// Message-like events key on the chat, and on the sender inside it when known.
impl Event for ChatMessage {
    fn fsm_key(&self) -> Option<StorageKey> {
        let user_id = self.from.as_ref().map_or(self.chat.id, |user| user.id);
        Some(StorageKey::new(self.chat.id, user_id))
    }
}

// Direct interactions key on the sender alone.
macro_rules! sender_keyed {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Event for $ty {
                fn fsm_key(&self) -> Option<StorageKey> {
                    Some(StorageKey::new(self.from.id, self.from.id))
                }
            }
        )*
    };
}

sender_keyed!(
    InlineQuery,
    ChosenInlineResult,
    CallbackQuery,
    ShippingQuery,
    PreCheckoutQuery,
);

// Polls carry neither chat nor user.
impl Event for Poll {
    fn fsm_key(&self) -> Option<StorageKey> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn message(chat_id: i64, from: Option<i64>) -> ChatMessage {
        ChatMessage {
            message_id: 1,
            chat: Chat {
                id: chat_id,
                kind: "private".into(),
                ..Default::default()
            },
            from: from.map(|id| User {
                id,
                ..Default::default()
            }),
            text: Some("hi".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_classify_empty_update() {
        let update = Update {
            update_id: 1,
            ..Default::default()
        };
        assert_eq!(update.classify(), None);
    }

    #[test]
    fn test_classify_callback_query() {
        let update = Update {
            update_id: 2,
            callback_query: Some(CallbackQuery {
                id: "cb".into(),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(update.classify(), Some(Category::CallbackQuery));
    }

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let json = r#"{
            "update_id": 10,
            "message": {
                "message_id": 3,
                "date": 1700000000,
                "chat": {"id": 42, "type": "private", "first_name": "A"},
                "from": {"id": 7, "is_bot": false, "first_name": "A", "language_code": "en"},
                "text": "ping",
                "entities": []
            }
        }"#;
        let update: Update = serde_json::from_str(json).expect("valid update");
        assert_eq!(update.classify(), Some(Category::Message));
        let message = update.message.expect("message payload");
        assert_eq!(message.text.as_deref(), Some("ping"));
        assert_eq!(message.chat.kind, "private");
    }

    #[test]
    fn test_decode_unknown_category_is_unclassified() {
        let json = r#"{"update_id": 11, "chat_join_request": {"chat": {"id": 1}}}"#;
        let update: Update = serde_json::from_str(json).expect("valid update");
        assert_eq!(update.classify(), None);
    }

    #[test]
    fn test_message_fsm_key_prefers_sender() {
        assert_eq!(message(42, Some(7)).fsm_key(), Some(StorageKey::new(42, 7)));
        assert_eq!(message(-100, None).fsm_key(), Some(StorageKey::new(-100, -100)));
    }

    #[test]
    fn test_interaction_fsm_key_uses_sender() {
        let query = CallbackQuery {
            id: "q".into(),
            from: User {
                id: 9,
                ..Default::default()
            },
            message: Some(message(42, Some(9))),
            ..Default::default()
        };
        assert_eq!(query.fsm_key(), Some(StorageKey::new(9, 9)));
    }

    #[test]
    fn test_poll_has_no_fsm_key() {
        assert_eq!(Poll::default().fsm_key(), None);
    }

    #[test]
    fn test_category_wire_names_match_serde() {
        for category in Category::ALL {
            let encoded = serde_json::to_value(category).expect("serializable");
            assert_eq!(encoded, serde_json::Value::String(category.as_str().into()));
        }
    }

    fn update_with(category: Category) -> Update {
        let mut update = Update {
            update_id: 1,
            ..Default::default()
        };
        match category {
            Category::Message => update.message = Some(message(1, Some(1))),
            Category::EditedMessage => update.edited_message = Some(message(1, Some(1))),
            Category::ChannelPost => update.channel_post = Some(message(1, None)),
            Category::EditedChannelPost => update.edited_channel_post = Some(message(1, None)),
            Category::InlineQuery => update.inline_query = Some(InlineQuery::default()),
            Category::ChosenInlineResult => {
                update.chosen_inline_result = Some(ChosenInlineResult::default())
            }
            Category::CallbackQuery => update.callback_query = Some(CallbackQuery::default()),
            Category::ShippingQuery => update.shipping_query = Some(ShippingQuery::default()),
            Category::PreCheckoutQuery => {
                update.pre_checkout_query = Some(PreCheckoutQuery::default())
            }
            Category::Poll => update.poll = Some(Poll::default()),
        }
        update
    }

    proptest! {
        #[test]
        fn classify_returns_the_single_populated_category(index in 0usize..Category::ALL.len()) {
            let category = Category::ALL[index];
            prop_assert_eq!(update_with(category).classify(), Some(category));
        }
    }
}
