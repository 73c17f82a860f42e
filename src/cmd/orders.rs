//! Order inspection commands: `automata orders` and `automata show`.

use anyhow::{Context, Result};
use automata::automata_config::AutomataConfig;
use automata::studio::seed::sample_orders;
use automata_common::{Order, OrderStatus};

use super::build_service;

fn styled_status(order: &Order) -> console::StyledObject<&'static str> {
    let status = order.status.as_str();
    match order.status {
        OrderStatus::Delivered | OrderStatus::Completed => console::style(status).green(),
        OrderStatus::Failed => console::style(status).red(),
        OrderStatus::InProgress => console::style(status).yellow(),
        OrderStatus::Pending => console::style(status).dim(),
    }
}

fn accepted_pages(order: &Order) -> String {
    if order.story_pages.is_empty() {
        return "-".to_string();
    }
    let done = order
        .story_pages
        .iter()
        .filter(|p| p.is_visually_accepted())
        .count();
    format!("{}/{}", done, order.story_pages.len())
}

pub async fn cmd_orders(config: &AutomataConfig) -> Result<()> {
    let service = build_service(config, sample_orders(automata_common::now()))?;
    let orders = service.list_orders().await?;

    println!();
    println!(
        "{:<12} {:<18} {:<28} {:<7} Status",
        "Order", "Customer", "Stage", "Pages"
    );
    println!(
        "{:<12} {:<18} {:<28} {:<7} ------",
        "------------", "------------------", "----------------------------", "-----"
    );
    for order in &orders {
        println!(
            "{:<12} {:<18} {:<28} {:<7} {}",
            order.id,
            order.customer_name,
            order.stage.label(),
            accepted_pages(order),
            styled_status(order)
        );
    }
    println!();
    println!("{} orders", orders.len());
    println!();
    Ok(())
}

pub async fn cmd_show(config: &AutomataConfig, order_id: &str) -> Result<()> {
    let service = build_service(config, sample_orders(automata_common::now()))?;
    let order = service
        .get_order(order_id)
        .await?
        .with_context(|| format!("Order '{}' not found", order_id))?;
    let json = serde_json::to_string_pretty(&order).context("Failed to serialize order")?;
    println!("{}", json);
    Ok(())
}
