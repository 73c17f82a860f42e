//! Studio: storybook order pipeline.
//!
//! ## Overview
//!
//! The Studio walks a personalized storybook order through character sheet
//! generation, story writing, illustration, final review and delivery. An
//! operator approves or regenerates each AI-produced artifact; the stage
//! moves forward once every page item of the current step is accepted.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐  calls  ┌──────────────────────────────────────────────────┐
//! │ Operator │ ──────> │  service.rs  (OrderService, NewOrder)            │
//! │  (CLI)   │ <────── │         │                                        │
//! └──────────┘  events │         │ transitions::*  (pure decisions)       │
//!                      │         │ adapters::*     (simulated providers)  │
//!                      │         │ jobs::GenerationJobs (webhook tasks)   │
//!                      │         v                                        │
//!                      │  mutation.rs  (MutationEngine::modify)           │
//!                      │         │  read latest → decide → validate →     │
//!                      │         │  merge → replace, under one write lock │
//!                      │         v                                        │
//!                      │  store.rs     (OrderStore trait, MemoryOrderStore)│
//!                      └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Supporting Modules
//!
//! | Module        | Responsibility                                          |
//! |---------------|---------------------------------------------------------|
//! | `events`      | `OrderEvent` enum + `broadcast_event()` helper          |
//! | `prompts`     | Character sheet template and illustration prompts       |
//! | `seed`        | Sample orders at every stage                            |
//! | `jobs`        | One background completion per `(order, target)`         |
//!
//! ## Typical Flow (accepting the last page illustration)
//!
//! 1. `OrderService::accept_page_image()` pauses for the request latency.
//! 2. `MutationEngine::modify` re-reads the order and asks
//!    `transitions::accept_image` for the update; the page is marked
//!    accepted and written.
//! 3. If every page is now fully accepted, `StoryAssembler` builds the PDF
//!    outside the lock.
//! 4. A second `modify` re-checks readiness and writes the PDF together
//!    with the move to `final_review`.
//! 5. Each write emits `StageChanged` / `OrderUpdated` on the event feed.

pub mod adapters;
pub mod events;
pub mod jobs;
pub mod mutation;
pub mod prompts;
pub mod seed;
pub mod service;
pub mod store;
pub mod transitions;

pub use events::{OrderEvent, event_channel};
pub use jobs::{GenerationJobs, GenerationTarget, JobTicket};
pub use mutation::{MutationEngine, OrderUpdate, RawOrderUpdate};
pub use service::{NewOrder, OrderService, ServiceSettings, text_generator_from_config};
pub use store::{MemoryOrderStore, OrderStore};
