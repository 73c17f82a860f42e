use std::time::Duration;

use automata_common::Order;

use super::simulate_latency;
use crate::errors::{OrderError, Result};

/// Sends the finished story's download link to the customer.
#[derive(Debug, Clone)]
pub struct DeliveryCourier {
    latency: Duration,
}

impl DeliveryCourier {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    pub async fn send(&self, order: &Order, method: &str, download_link: &str) -> Result<()> {
        if !order.email.contains('@') {
            return Err(OrderError::precondition(
                &order.id,
                format!("cannot deliver to '{}'", order.email),
            ));
        }
        simulate_latency(self.latency).await;
        tracing::info!(
            order_id = %order.id,
            method,
            recipient = %order.email,
            link = download_link,
            "story delivered"
        );
        Ok(())
    }
}
