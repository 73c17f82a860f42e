//! Change notifications for a presentation layer.
//!
//! Every committed order write is announced as a JSON `OrderEvent` on a
//! broadcast channel. Subscribers that lag simply miss messages; the store
//! stays authoritative.

use automata_common::{Order, OrderStage};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::jobs::GenerationTarget;

/// Buffered messages per subscriber before it starts lagging.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum OrderEvent {
    OrderCreated {
        order: Order,
    },
    OrderUpdated {
        order: Order,
    },
    StageChanged {
        order_id: String,
        from: OrderStage,
        to: OrderStage,
    },
    GenerationStarted {
        order_id: String,
        target: GenerationTarget,
    },
    /// `result` is the produced URL, or the text for text regeneration.
    GenerationCompleted {
        order_id: String,
        target: GenerationTarget,
        result: String,
    },
    /// `error_kind` is the stable `OrderError::kind` code.
    GenerationFailed {
        order_id: String,
        target: GenerationTarget,
        error_kind: String,
        error: String,
    },
}

pub fn event_channel() -> broadcast::Sender<String> {
    let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
    tx
}

/// Serialize and broadcast an event. Having no subscribers is not an error.
pub fn broadcast_event(tx: &broadcast::Sender<String>, event: &OrderEvent) {
    match serde_json::to_string(event) {
        Ok(json) => {
            let _ = tx.send(json);
        }
        Err(e) => {
            tracing::error!(error = %e, "failed to serialize order event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::studio::seed::blank_order;

    #[test]
    fn test_order_created_serialization() {
        let msg = OrderEvent::OrderCreated {
            order: blank_order("ord-7"),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"OrderCreated\""));
        assert!(json.contains("\"data\""));
        assert!(json.contains("\"id\":\"ord-7\""));
    }

    #[test]
    fn test_stage_changed_serialization() {
        let msg = OrderEvent::StageChanged {
            order_id: "ord-1".to_string(),
            from: OrderStage::StoryContentGeneration,
            to: OrderStage::VisualContentGeneration,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"StageChanged\""));
        assert!(json.contains("\"from\":\"story_content_generation\""));
        assert!(json.contains("\"to\":\"visual_content_generation\""));
    }

    #[test]
    fn test_generation_target_serialization() {
        let msg = OrderEvent::GenerationStarted {
            order_id: "ord-1".to_string(),
            target: GenerationTarget::PageImage { page: 3 },
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"kind\":\"page_image\""));
        assert!(json.contains("\"page\":3"));
    }

    #[tokio::test]
    async fn test_broadcast_event_reaches_subscriber() {
        let tx = event_channel();
        let mut rx = tx.subscribe();
        broadcast_event(
            &tx,
            &OrderEvent::GenerationFailed {
                order_id: "ord-2".to_string(),
                target: GenerationTarget::CharacterSheet,
                error_kind: "generation_failed".to_string(),
                error: "timeout".to_string(),
            },
        );
        let json = rx.recv().await.unwrap();
        let parsed: OrderEvent = serde_json::from_str(&json).unwrap();
        match parsed {
            OrderEvent::GenerationFailed {
                order_id,
                error_kind,
                error,
                ..
            } => {
                assert_eq!(order_id, "ord-2");
                assert_eq!(error_kind, "generation_failed");
                assert_eq!(error, "timeout");
            }
            other => panic!("Expected GenerationFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_broadcast_without_subscribers_is_silent() {
        let tx = event_channel();
        broadcast_event(
            &tx,
            &OrderEvent::OrderUpdated {
                order: blank_order("ord-3"),
            },
        );
    }
}
