//! Shared domain types for the Automata storybook order pipeline.
//!
//! - [`order`]: the `Order` aggregate and its nested records
//! - [`status`]: enumerated lifecycle values and their validators
//! - [`time`]: the timestamp type used for `createdAt`/`updatedAt`

pub mod order;
pub mod status;
pub mod time;

pub use order::{
    Attachment, CharacterSheet, DeliveryInfo, FinalStory, Order, PLACEHOLDER_PDF_URL, StoryPage,
    check_page_sequence,
};
pub use status::{
    AssemblyStatus, CharacterSheetStatus, OrderStage, OrderStatus, PageItemStatus, UnknownValue,
};
pub use time::{Timestamp, now};
