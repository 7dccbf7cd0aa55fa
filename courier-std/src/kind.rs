//! Category markers.
//!
//! Each update category is a zero-sized marker type implementing [`Kind`].
//! The marker ties together the category tag, the payload type handlers of
//! that category receive, how the payload is pulled out of an [`Update`],
//! and which chain of the [`HandlerTable`] it is routed to.

use crate::engine::HandlerChain;
use courier_core::{Category, Event, Update};

/// A category of update together with its payload type.
pub trait Kind: Send + Sync + 'static {
    /// Payload handlers of this category receive.
    type Event: Event;

    /// The category tag.
    const CATEGORY: Category;

    /// Take the payload of this category out of `update`.
    fn extract(update: Update) -> Option<Self::Event>;

    /// The chain for this category.
    fn chain<B>(table: &HandlerTable<B>) -> &HandlerChain<B, Self::Event>;

    /// The chain for this category, mutably. Used during registration only.
    fn chain_mut<B>(table: &mut HandlerTable<B>) -> &mut HandlerChain<B, Self::Event>;
}

macro_rules! kinds {
    ($($(#[$doc:meta])* $marker:ident => $field:ident: $event:ty, $category:ident;)*) => {
        /// One handler chain per category.
        pub struct HandlerTable<B> {
            $(
                #[doc = concat!("Handlers for `", stringify!($field), "` updates.")]
                pub $field: HandlerChain<B, $event>,
            )*
        }

        impl<B> Default for HandlerTable<B> {
            fn default() -> Self {
                Self {
                    $($field: HandlerChain::new(),)*
                }
            }
        }

        impl<B> HandlerTable<B> {
            /// Total number of registered entries across all chains.
            pub fn len(&self) -> usize {
                0 $(+ self.$field.len())*
            }

            /// Whether no entries are registered at all.
            pub fn is_empty(&self) -> bool {
                self.len() == 0
            }

            /// Number of entries registered for `category`.
            pub fn count(&self, category: Category) -> usize {
                match category {
                    $(Category::$category => self.$field.len(),)*
                }
            }
        }

        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, Default)]
            pub struct $marker;

            impl Kind for $marker {
                type Event = $event;
                const CATEGORY: Category = Category::$category;

                fn extract(update: Update) -> Option<Self::Event> {
                    update.$field
                }

                fn chain<B>(table: &HandlerTable<B>) -> &HandlerChain<B, Self::Event> {
                    &table.$field
                }

                fn chain_mut<B>(table: &mut HandlerTable<B>) -> &mut HandlerChain<B, Self::Event> {
                    &mut table.$field
                }
            }
        )*
    };
}

kinds! {
    /// New incoming message.
    Message => message: courier_core::ChatMessage, Message;
    /// Edited message.
    EditedMessage => edited_message: courier_core::ChatMessage, EditedMessage;
    /// New channel post.
    ChannelPost => channel_post: courier_core::ChatMessage, ChannelPost;
    /// Edited channel post.
    EditedChannelPost => edited_channel_post: courier_core::ChatMessage, EditedChannelPost;
    /// Inline query.
    InlineQuery => inline_query: courier_core::InlineQuery, InlineQuery;
    /// Chosen inline result.
    ChosenInlineResult => chosen_inline_result: courier_core::ChosenInlineResult, ChosenInlineResult;
    /// Callback query from an inline keyboard.
    CallbackQuery => callback_query: courier_core::CallbackQuery, CallbackQuery;
    /// Shipping query.
    ShippingQuery => shipping_query: courier_core::ShippingQuery, ShippingQuery;
    /// Pre-checkout query.
    PreCheckoutQuery => pre_checkout_query: courier_core::PreCheckoutQuery, PreCheckoutQuery;
    /// Poll state change.
    Poll => poll: courier_core::Poll, Poll;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{engine::HandlerEntry, testing::RecordingHandler};

    #[test]
    fn test_table_counts_per_category() {
        let mut table: HandlerTable<()> = HandlerTable::default();
        CallbackQuery::chain_mut(&mut table).push(HandlerEntry::new(RecordingHandler::new()));
        CallbackQuery::chain_mut(&mut table).push(HandlerEntry::new(RecordingHandler::new()));
        Message::chain_mut(&mut table).push(HandlerEntry::new(RecordingHandler::new()));

        assert_eq!(table.len(), 3);
        assert_eq!(table.count(Category::CallbackQuery), 2);
        assert_eq!(table.count(Category::Message), 1);
        assert_eq!(table.count(Category::EditedMessage), 0);
    }

    #[test]
    fn test_extract_takes_matching_field() {
        let update: Update = serde_json::from_value(serde_json::json!({
            "update_id": 3,
            "poll": { "id": "p1", "question": "?", "total_voter_count": 0, "is_closed": false }
        }))
        .unwrap();

        assert!(Message::extract(update.clone()).is_none());
        assert_eq!(Poll::extract(update).map(|poll| poll.id), Some("p1".to_string()));
        assert_eq!(<Poll as Kind>::CATEGORY, Category::Poll);
    }
}
