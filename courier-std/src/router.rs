//! Update classification and routing.

use crate::{
    engine::DispatchOutcome,
    kind::{self, HandlerTable, Kind},
};
use courier_core::{Category, Context, Event, Storage, Update, UpdateMeta};
use std::{fmt, sync::Arc};
use tracing::debug;

/// Result of routing one update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// No known category field was populated. The update was dropped.
    Unclassified,
    /// No handler of the category matched.
    Unmatched(Category),
    /// The named handler ran to completion.
    Handled {
        /// Category of the update.
        category: Category,
        /// Handler that ran.
        handler: String,
    },
    /// The named handler ran and failed.
    Failed {
        /// Category of the update.
        category: Category,
        /// Handler that failed.
        handler: String,
    },
}

impl RouteOutcome {
    /// Whether a handler body ran, successfully or not.
    pub fn ran(&self) -> bool {
        matches!(self, Self::Handled { .. } | Self::Failed { .. })
    }

    fn from_dispatch(category: Category, outcome: DispatchOutcome) -> Self {
        match outcome {
            DispatchOutcome::Handled { handler } => Self::Handled { category, handler },
            DispatchOutcome::Failed { handler } => Self::Failed { category, handler },
            DispatchOutcome::Unmatched => Self::Unmatched(category),
        }
    }
}

/// Classifies updates and hands each payload to its category's chain.
///
/// Shared by both ingestion modes; immutable once built.
pub struct UpdateRouter<B> {
    table: Arc<HandlerTable<B>>,
    bot: B,
    storage: Arc<dyn Storage>,
}

impl<B> UpdateRouter<B>
where
    B: Clone + Send + Sync + 'static,
{
    /// Create a router over a finished handler table.
    pub fn new(table: HandlerTable<B>, bot: B, storage: Arc<dyn Storage>) -> Self {
        Self {
            table: Arc::new(table),
            bot,
            storage,
        }
    }

    /// The handler table.
    pub fn table(&self) -> &HandlerTable<B> {
        &self.table
    }

    /// The conversation store handed to every context.
    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Classify `update` and dispatch it to the matching chain.
    pub async fn route(&self, update: Update) -> RouteOutcome {
        let Some(category) = update.classify() else {
            debug!(update_id = update.update_id, "dropping unclassified update");
            return RouteOutcome::Unclassified;
        };

        match category {
            Category::Message => self.route_kind::<kind::Message>(update).await,
            Category::EditedMessage => self.route_kind::<kind::EditedMessage>(update).await,
            Category::ChannelPost => self.route_kind::<kind::ChannelPost>(update).await,
            Category::EditedChannelPost => {
                self.route_kind::<kind::EditedChannelPost>(update).await
            }
            Category::InlineQuery => self.route_kind::<kind::InlineQuery>(update).await,
            Category::ChosenInlineResult => {
                self.route_kind::<kind::ChosenInlineResult>(update).await
            }
            Category::CallbackQuery => self.route_kind::<kind::CallbackQuery>(update).await,
            Category::ShippingQuery => self.route_kind::<kind::ShippingQuery>(update).await,
            Category::PreCheckoutQuery => self.route_kind::<kind::PreCheckoutQuery>(update).await,
            Category::Poll => self.route_kind::<kind::Poll>(update).await,
        }
    }

    async fn route_kind<K: Kind>(&self, update: Update) -> RouteOutcome {
        let update_id = update.update_id;
        let Some(event) = K::extract(update) else {
            return RouteOutcome::Unclassified;
        };

        let ctx = Context::new(
            self.bot.clone(),
            UpdateMeta {
                update_id,
                category: K::CATEGORY,
            },
            Arc::clone(&self.storage),
            event.fsm_key(),
        );

        let outcome = K::chain(&self.table).dispatch(ctx, event).await;
        RouteOutcome::from_dispatch(K::CATEGORY, outcome)
    }
}

impl<B> fmt::Debug for UpdateRouter<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateRouter")
            .field("handlers", &self.table.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        engine::HandlerEntry,
        storage::MemoryStorage,
        testing::{RecordingHandler, sample},
    };

    fn router(table: HandlerTable<()>) -> UpdateRouter<()> {
        UpdateRouter::new(table, (), Arc::new(MemoryStorage::new()))
    }

    #[tokio::test]
    async fn test_routes_to_category_chain_only() {
        let messages = RecordingHandler::new();
        let callbacks = RecordingHandler::new();
        let mut table = HandlerTable::default();
        kind::Message::chain_mut(&mut table)
            .push(HandlerEntry::new(messages.clone()).with_name("messages"));
        kind::CallbackQuery::chain_mut(&mut table)
            .push(HandlerEntry::new(callbacks.clone()).with_name("callbacks"));

        let outcome = router(table).route(sample::callback_update(4, 10, "go")).await;
        assert_eq!(
            outcome,
            RouteOutcome::Handled {
                category: Category::CallbackQuery,
                handler: "callbacks".into()
            }
        );
        assert_eq!(messages.count(), 0);
        assert_eq!(callbacks.count(), 1);
    }

    #[tokio::test]
    async fn test_unclassified_update_is_dropped() {
        let messages = RecordingHandler::new();
        let mut table = HandlerTable::default();
        kind::Message::chain_mut(&mut table).push(HandlerEntry::new(messages.clone()));

        let update = Update {
            update_id: 9,
            ..Default::default()
        };
        assert_eq!(router(table).route(update).await, RouteOutcome::Unclassified);
        assert_eq!(messages.count(), 0);
    }

    #[tokio::test]
    async fn test_empty_chain_is_unmatched() {
        let outcome = router(HandlerTable::default())
            .route(sample::text_update(1, 10, "hi"))
            .await;
        assert_eq!(outcome, RouteOutcome::Unmatched(Category::Message));
        assert!(!outcome.ran());
    }

    #[tokio::test]
    async fn test_context_carries_conversation_key() {
        let mut table = HandlerTable::default();
        kind::Message::chain_mut(&mut table).push(HandlerEntry::new(
            |ctx: Context<()>, _msg: courier_core::ChatMessage| async move {
                let fsm = ctx.fsm().ok_or("missing fsm")?;
                fsm.set_state("greeted").await?;
                Ok::<(), courier_core::BoxError>(())
            },
        ));
        let router = router(table);

        let outcome = router.route(sample::text_update(1, 10, "hi")).await;
        assert!(matches!(outcome, RouteOutcome::Handled { .. }));

        let record = router
            .storage()
            .get(courier_core::StorageKey::new(10, 10))
            .await
            .unwrap();
        assert_eq!(record.state.as_deref(), Some("greeted"));
    }
}
