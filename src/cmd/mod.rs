//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module          | Commands handled                                   |
//! |-----------------|----------------------------------------------------|
//! | `orders`        | `Orders`, `Show`                                   |
//! | `demo`          | `Demo`                                             |
//! | `config`        | `Config`                                           |

pub mod config;
pub mod demo;
pub mod orders;

pub use config::cmd_config;
pub use demo::cmd_demo;
pub use orders::{cmd_orders, cmd_show};

use std::sync::Arc;

use anyhow::Result;
use automata::automata_config::AutomataConfig;
use automata::studio::{
    MemoryOrderStore, OrderService, ServiceSettings, event_channel, text_generator_from_config,
};
use automata_common::Order;

/// Build an order service over an in-memory store holding `orders`.
fn build_service(config: &AutomataConfig, orders: Vec<Order>) -> Result<OrderService> {
    let settings = ServiceSettings::from_config(config)?;
    let text = text_generator_from_config(&config.toml.text_generation, settings.latency)?;
    let store = Arc::new(MemoryOrderStore::with_orders(orders));
    Ok(OrderService::new(store, text, event_channel(), settings))
}
