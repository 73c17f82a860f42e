//! Order mutation engine.
//!
//! Every write to an order goes through [`MutationEngine::modify`]:
//!
//! 1. take the engine write lock
//! 2. read the latest order from the store
//! 3. let the caller decide on an [`OrderUpdate`] (or skip)
//! 4. validate the whole update, then merge it and stamp `updated_at`
//! 5. replace the stored order
//!
//! The lock is a `std::sync::Mutex` and is never held across an `.await`,
//! so decisions are synchronous and always made against the newest order.
//! Events are broadcast after the lock is released.

use std::sync::{Arc, Mutex};

use automata_common::status::{
    parse_assembly_status, parse_character_sheet_status, parse_stage, parse_status,
};
use automata_common::{
    AssemblyStatus, CharacterSheet, CharacterSheetStatus, DeliveryInfo, FinalStory, Order,
    OrderStage, OrderStatus, StoryPage, Timestamp, check_page_sequence,
};
use serde::Deserialize;
use tokio::sync::broadcast;

use super::events::{OrderEvent, broadcast_event};
use super::store::OrderStore;
use crate::errors::{OrderError, Result};

/// Partial update of the character sheet. Omitted fields are kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CharacterSheetPatch {
    pub prompt: Option<String>,
    pub status: Option<CharacterSheetStatus>,
    /// `Some(None)` clears the image.
    pub image_url: Option<Option<String>>,
}

impl CharacterSheetPatch {
    /// Put an accepted sheet back to `pending`, keeping prompt and image.
    pub fn reopen() -> Self {
        Self {
            status: Some(CharacterSheetStatus::Pending),
            ..Default::default()
        }
    }
}

/// True when `update` sends the order back to character sheet generation
/// and reopens the sheet, the one change an accepted sheet allows.
fn reopens_sheet(update: &OrderUpdate) -> bool {
    update.stage == Some(OrderStage::CharacterSheetGeneration)
        && update.character_sheet == Some(CharacterSheetPatch::reopen())
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinalStoryPatch {
    pub pdf_url: Option<String>,
    pub assembly_status: Option<AssemblyStatus>,
}

/// Delivery record. `method` and `delivered_at` are mandatory once applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeliveryInfoPatch {
    pub method: Option<String>,
    pub delivered_at: Option<Timestamp>,
    pub download_link: Option<String>,
}

/// A partial order update. Provided fields replace (records: shallow-merge
/// into) the order's fields; omitted fields are untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    pub stage: Option<OrderStage>,
    pub character_sheet: Option<CharacterSheetPatch>,
    pub story_pages: Option<Vec<StoryPage>>,
    pub final_story: Option<FinalStoryPatch>,
    pub delivery_info: Option<DeliveryInfoPatch>,
}

impl OrderUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn stage(mut self, stage: OrderStage) -> Self {
        self.stage = Some(stage);
        self
    }

    pub fn character_sheet(mut self, patch: CharacterSheetPatch) -> Self {
        self.character_sheet = Some(patch);
        self
    }

    pub fn story_pages(mut self, pages: Vec<StoryPage>) -> Self {
        self.story_pages = Some(pages);
        self
    }

    pub fn final_story(mut self, patch: FinalStoryPatch) -> Self {
        self.final_story = Some(patch);
        self
    }

    pub fn delivery_info(mut self, patch: DeliveryInfoPatch) -> Self {
        self.delivery_info = Some(patch);
        self
    }
}

/// String-typed update as received from an operator or a presentation layer.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawOrderUpdate {
    pub status: Option<String>,
    pub stage: Option<String>,
    pub character_sheet_status: Option<String>,
    pub assembly_status: Option<String>,
}

impl TryFrom<RawOrderUpdate> for OrderUpdate {
    type Error = OrderError;

    fn try_from(raw: RawOrderUpdate) -> Result<Self> {
        let mut update = OrderUpdate::new();
        if let Some(status) = raw.status.as_deref() {
            update.status = Some(parse_status(status)?);
        }
        if let Some(stage) = raw.stage.as_deref() {
            update.stage = Some(parse_stage(stage)?);
        }
        if let Some(status) = raw.character_sheet_status.as_deref() {
            update.character_sheet = Some(CharacterSheetPatch {
                status: Some(parse_character_sheet_status(status)?),
                ..Default::default()
            });
        }
        if let Some(status) = raw.assembly_status.as_deref() {
            update.final_story = Some(FinalStoryPatch {
                assembly_status: Some(parse_assembly_status(status)?),
                ..Default::default()
            });
        }
        Ok(update)
    }
}

/// What a `modify` caller wants done with the order it was shown.
pub enum Decision<T> {
    Write(OrderUpdate, T),
    Skip(T),
}

impl Decision<()> {
    pub fn write(update: OrderUpdate) -> Self {
        Decision::Write(update, ())
    }

    pub fn skip() -> Self {
        Decision::Skip(())
    }
}

/// Result of `modify`: the caller's value and the order as written, if any.
#[derive(Debug)]
pub struct Mutation<T> {
    pub value: T,
    pub written: Option<Order>,
}

/// Validate `update` against `current` without changing anything.
pub fn validate_update(current: &Order, update: &OrderUpdate) -> Result<()> {
    if let Some(patch) = &update.character_sheet {
        match &current.character_sheet {
            Some(sheet) if sheet.is_accepted() && !reopens_sheet(update) => {
                return Err(OrderError::invalid_state(
                    &current.id,
                    current.stage,
                    "the accepted character sheet can no longer change",
                ));
            }
            Some(_) => {}
            None => {
                if patch.prompt.as_deref().is_none_or(|p| p.trim().is_empty()) {
                    return Err(OrderError::invalid_value(
                        "characterSheet.prompt",
                        "a new character sheet needs a prompt",
                    ));
                }
            }
        }
    }

    if let Some(pages) = &update.story_pages {
        check_page_sequence(pages).map_err(|m| OrderError::invalid_value("storyPages", m))?;
    }

    if let Some(patch) = &update.delivery_info {
        if patch.method.as_deref().is_none_or(|m| m.trim().is_empty()) {
            return Err(OrderError::invalid_value(
                "deliveryInfo.method",
                "delivery method is required",
            ));
        }
        if patch.delivered_at.is_none() {
            return Err(OrderError::invalid_value(
                "deliveryInfo.deliveredAt",
                "delivery time is required",
            ));
        }
    }

    Ok(())
}

/// Validate, then merge `update` into a copy of `current` stamped with `now`.
pub fn merge_update(current: &Order, update: OrderUpdate, now: Timestamp) -> Result<Order> {
    validate_update(current, &update)?;

    let mut next = current.clone();
    if let Some(status) = update.status {
        next.status = status;
    }
    if let Some(stage) = update.stage {
        next.stage = stage;
    }
    if let Some(patch) = update.character_sheet {
        let mut sheet = next
            .character_sheet
            .take()
            .unwrap_or_else(|| CharacterSheet::new(String::new()));
        if let Some(prompt) = patch.prompt {
            sheet.prompt = prompt;
        }
        if let Some(status) = patch.status {
            sheet.status = status;
        }
        if let Some(image_url) = patch.image_url {
            sheet.image_url = image_url;
        }
        next.character_sheet = Some(sheet);
    }
    if let Some(pages) = update.story_pages {
        next.story_pages = pages;
    }
    if let Some(patch) = update.final_story {
        let mut story = next.final_story.take().unwrap_or(FinalStory {
            pdf_url: None,
            assembly_status: AssemblyStatus::Pending,
        });
        if let Some(pdf_url) = patch.pdf_url {
            story.pdf_url = Some(pdf_url);
        }
        if let Some(status) = patch.assembly_status {
            story.assembly_status = status;
        }
        next.final_story = Some(story);
    }
    if let Some(patch) = update.delivery_info {
        // validate_update guarantees both fields are present.
        let method = patch.method.unwrap_or_default();
        let delivered_at = patch.delivered_at.unwrap_or(now);
        let download_link = patch.download_link.or_else(|| {
            next.delivery_info
                .as_ref()
                .and_then(|d| d.download_link.clone())
        });
        next.delivery_info = Some(DeliveryInfo {
            method,
            delivered_at,
            download_link,
        });
    }
    next.updated_at = now;
    Ok(next)
}

/// Applies validated partial updates to orders and announces the results.
pub struct MutationEngine {
    store: Arc<dyn OrderStore>,
    write_lock: Mutex<()>,
    events: broadcast::Sender<String>,
}

impl MutationEngine {
    pub fn new(store: Arc<dyn OrderStore>, events: broadcast::Sender<String>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
            events,
        }
    }

    pub fn store(&self) -> &Arc<dyn OrderStore> {
        &self.store
    }

    pub fn events(&self) -> &broadcast::Sender<String> {
        &self.events
    }

    pub fn find(&self, order_id: &str) -> Result<Order> {
        self.store
            .find_by_id(order_id)?
            .ok_or_else(|| OrderError::not_found(order_id))
    }

    /// Apply `update` to the latest version of the order. All or nothing.
    pub fn apply_update(&self, order_id: &str, update: OrderUpdate) -> Result<Order> {
        let mutation = self.modify(order_id, |_| Ok(Decision::write(update)))?;
        mutation
            .written
            .ok_or_else(|| OrderError::Other(anyhow::anyhow!("update for {} was not written", order_id)))
    }

    /// Parse a string-typed update through the validators and apply it.
    pub fn apply_raw_update(&self, order_id: &str, raw: RawOrderUpdate) -> Result<Order> {
        let update = OrderUpdate::try_from(raw)?;
        self.apply_update(order_id, update)
    }

    /// Read-decide-write against the latest order under the write lock.
    pub fn modify<T, F>(&self, order_id: &str, decide: F) -> Result<Mutation<T>>
    where
        F: FnOnce(&Order) -> Result<Decision<T>>,
    {
        let (value, previous_stage, written) = {
            let _guard = self
                .write_lock
                .lock()
                .map_err(|e| OrderError::StoreUnavailable(format!("write lock poisoned: {}", e)))?;

            let current = self.find(order_id)?;
            match decide(&current)? {
                Decision::Skip(value) => {
                    return Ok(Mutation {
                        value,
                        written: None,
                    });
                }
                Decision::Write(update, value) => {
                    let next = merge_update(&current, update, automata_common::now())?;
                    self.store.replace(order_id, next.clone())?;
                    (value, current.stage, next)
                }
            }
        };

        if previous_stage != written.stage {
            tracing::info!(
                order_id = %written.id,
                from = %previous_stage,
                to = %written.stage,
                "order stage changed"
            );
            broadcast_event(
                &self.events,
                &OrderEvent::StageChanged {
                    order_id: written.id.clone(),
                    from: previous_stage,
                    to: written.stage,
                },
            );
        }
        broadcast_event(
            &self.events,
            &OrderEvent::OrderUpdated {
                order: written.clone(),
            },
        );

        Ok(Mutation {
            value,
            written: Some(written),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::studio::events::event_channel;
    use crate::studio::seed::blank_order;
    use crate::studio::store::MemoryOrderStore;

    fn engine_with(order: Order) -> MutationEngine {
        let store = Arc::new(MemoryOrderStore::with_orders(vec![order]));
        MutationEngine::new(store, event_channel())
    }

    #[test]
    fn test_unknown_order_is_not_found() {
        let engine = engine_with(blank_order("ord-1"));
        let err = engine
            .apply_update("ghost", OrderUpdate::new().status(OrderStatus::Failed))
            .unwrap_err();
        assert!(matches!(err, OrderError::NotFound { .. }));
    }

    #[test]
    fn test_update_replaces_only_provided_fields_and_stamps_time() {
        let order = blank_order("ord-1");
        let before = order.updated_at;
        let engine = engine_with(order);

        let written = engine
            .apply_update("ord-1", OrderUpdate::new().stage(OrderStage::Failed))
            .unwrap();
        assert_eq!(written.stage, OrderStage::Failed);
        assert_eq!(written.status, OrderStatus::InProgress);
        assert!(written.updated_at >= before);
        assert_eq!(engine.find("ord-1").unwrap(), written);
    }

    #[test]
    fn test_raw_update_with_unknown_stage_changes_nothing() {
        let engine = engine_with(blank_order("ord-1"));
        let before = engine.find("ord-1").unwrap();

        let raw = RawOrderUpdate {
            status: Some("failed".to_string()),
            stage: Some("teleporting".to_string()),
            ..Default::default()
        };
        let err = engine.apply_raw_update("ord-1", raw).unwrap_err();
        assert!(matches!(err, OrderError::InvalidValue { .. }));
        assert_eq!(engine.find("ord-1").unwrap(), before);
    }

    #[test]
    fn test_raw_update_applies_parsed_values() {
        let engine = engine_with(blank_order("ord-1"));
        let raw = RawOrderUpdate {
            status: Some("failed".to_string()),
            stage: Some("failed".to_string()),
            ..Default::default()
        };
        let written = engine.apply_raw_update("ord-1", raw).unwrap();
        assert_eq!(written.status, OrderStatus::Failed);
        assert_eq!(written.stage, OrderStage::Failed);
    }

    #[test]
    fn test_invalid_delivery_info_is_atomic() {
        let engine = engine_with(blank_order("ord-1"));
        let before = engine.find("ord-1").unwrap();

        let update = OrderUpdate::new()
            .status(OrderStatus::Delivered)
            .delivery_info(DeliveryInfoPatch {
                method: Some("email".to_string()),
                delivered_at: None,
                download_link: None,
            });
        let err = engine.apply_update("ord-1", update).unwrap_err();
        assert!(matches!(err, OrderError::InvalidValue { .. }));
        let after = engine.find("ord-1").unwrap();
        assert_eq!(after.status, before.status);
        assert!(after.delivery_info.is_none());
    }

    #[test]
    fn test_malformed_page_sequence_is_rejected() {
        let engine = engine_with(blank_order("ord-1"));
        let pages = vec![StoryPage::blank(2)];
        let err = engine
            .apply_update("ord-1", OrderUpdate::new().story_pages(pages))
            .unwrap_err();
        match err {
            OrderError::InvalidValue { field, .. } => assert_eq!(field, "storyPages"),
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn test_accepted_character_sheet_is_frozen() {
        let mut order = blank_order("ord-1");
        order.character_sheet = Some(CharacterSheet {
            prompt: "sheet".to_string(),
            status: CharacterSheetStatus::Accepted,
            image_url: Some("https://img/sheet.png".to_string()),
        });
        let engine = engine_with(order);
        let err = engine
            .apply_update(
                "ord-1",
                OrderUpdate::new().character_sheet(CharacterSheetPatch {
                    image_url: Some(None),
                    ..Default::default()
                }),
            )
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidState { .. }));
    }

    #[test]
    fn test_accepted_sheet_reopens_only_with_stage_rewind() {
        let mut order = blank_order("ord-1");
        order.stage = OrderStage::FinalReview;
        order.character_sheet = Some(CharacterSheet {
            prompt: "sheet".to_string(),
            status: CharacterSheetStatus::Accepted,
            image_url: Some("https://img/sheet.png".to_string()),
        });
        let engine = engine_with(order);

        let alone = OrderUpdate::new().character_sheet(CharacterSheetPatch::reopen());
        let err = engine.apply_update("ord-1", alone).unwrap_err();
        assert!(matches!(err, OrderError::InvalidState { .. }));

        let rewind = OrderUpdate::new()
            .stage(OrderStage::CharacterSheetGeneration)
            .character_sheet(CharacterSheetPatch::reopen());
        let written = engine.apply_update("ord-1", rewind).unwrap();
        let sheet = written.character_sheet.unwrap();
        assert_eq!(sheet.status, CharacterSheetStatus::Pending);
        assert_eq!(sheet.image_url.as_deref(), Some("https://img/sheet.png"));
    }

    #[test]
    fn test_character_sheet_patch_shallow_merges() {
        let mut order = blank_order("ord-1");
        order.character_sheet = Some(CharacterSheet::new("original prompt"));
        let engine = engine_with(order);
        let written = engine
            .apply_update(
                "ord-1",
                OrderUpdate::new().character_sheet(CharacterSheetPatch {
                    image_url: Some(Some("https://img/sheet.png".to_string())),
                    ..Default::default()
                }),
            )
            .unwrap();
        let sheet = written.character_sheet.unwrap();
        assert_eq!(sheet.prompt, "original prompt");
        assert_eq!(sheet.image_url.as_deref(), Some("https://img/sheet.png"));
    }

    #[test]
    fn test_final_story_patch_creates_record_when_missing() {
        let engine = engine_with(blank_order("ord-1"));
        let written = engine
            .apply_update(
                "ord-1",
                OrderUpdate::new().final_story(FinalStoryPatch {
                    pdf_url: None,
                    assembly_status: Some(AssemblyStatus::NeedsCorrection),
                }),
            )
            .unwrap();
        let story = written.final_story.unwrap();
        assert!(story.pdf_url.is_none());
        assert_eq!(story.assembly_status, AssemblyStatus::NeedsCorrection);
    }

    #[test]
    fn test_skip_leaves_order_untouched() {
        let engine = engine_with(blank_order("ord-1"));
        let before = engine.find("ord-1").unwrap();
        let mutation = engine
            .modify("ord-1", |order| Ok(Decision::Skip(order.stage)))
            .unwrap();
        assert!(mutation.written.is_none());
        assert_eq!(mutation.value, before.stage);
        assert_eq!(engine.find("ord-1").unwrap().updated_at, before.updated_at);
    }

    #[tokio::test]
    async fn test_stage_change_is_broadcast() {
        let engine = engine_with(blank_order("ord-1"));
        let mut rx = engine.events().subscribe();
        engine
            .apply_update(
                "ord-1",
                OrderUpdate::new().stage(OrderStage::StoryContentGeneration),
            )
            .unwrap();

        let first: OrderEvent = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert!(matches!(
            first,
            OrderEvent::StageChanged {
                to: OrderStage::StoryContentGeneration,
                ..
            }
        ));
        let second: OrderEvent = serde_json::from_str(&rx.recv().await.unwrap()).unwrap();
        assert!(matches!(second, OrderEvent::OrderUpdated { .. }));
    }
}
