//! End-to-end walkthrough: `automata demo`.
//!
//! Creates one order and drives it through every stage with the operator
//! accepting each artifact, printing stage changes from the event feed.

use std::time::Duration;

use anyhow::{Context, Result};
use automata::automata_config::AutomataConfig;
use automata::studio::{NewOrder, OrderEvent, OrderService};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::broadcast::error::RecvError;

use super::build_service;

fn spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string"),
    );
    bar.set_prefix("Order");
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Print a line to stdout above the spinner, also when the spinner is hidden.
fn say(bar: &ProgressBar, line: String) {
    bar.suspend(|| println!("{}", line));
}

/// Print stage changes and generation failures until the feed closes.
fn spawn_event_printer(service: &OrderService, bar: ProgressBar) -> tokio::task::JoinHandle<()> {
    let mut rx = service.subscribe();
    tokio::spawn(async move {
        loop {
            let message = match rx.recv().await {
                Ok(message) => message,
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            };
            let Ok(event) = serde_json::from_str::<OrderEvent>(&message) else {
                continue;
            };
            match event {
                OrderEvent::StageChanged { from, to, .. } => say(
                    &bar,
                    format!(
                        "  {} {} → {}",
                        style("stage").cyan(),
                        style(from.label()).dim(),
                        style(to.label()).green().bold()
                    ),
                ),
                OrderEvent::GenerationFailed {
                    target,
                    error_kind,
                    error,
                    ..
                } => say(
                    &bar,
                    format!(
                        "  {} {} [{}]: {}",
                        style("failed").red(),
                        target,
                        error_kind,
                        error
                    ),
                ),
                _ => {}
            }
        }
    })
}

async fn walk_order(service: &OrderService, order_id: &str, bar: &ProgressBar) -> Result<()> {
    let order = service
        .get_order(order_id)
        .await?
        .context("Created order disappeared")?;
    let prompt = order
        .character_sheet
        .map(|s| s.prompt)
        .context("New order has no character sheet prompt")?;

    bar.set_message("generating character sheet");
    service
        .generate_character_sheet(order_id, &prompt)
        .await?
        .wait()
        .await?;
    service.accept_character_sheet(order_id).await?;

    let page_count = service.settings().page_count;
    for page in 1..=page_count {
        bar.set_message(format!("writing page {}/{}", page, page_count));
        service.regenerate_page_text(order_id, page).await?;
        service.accept_page_text(order_id, page).await?;
    }

    for page in 1..=page_count {
        bar.set_message(format!("illustrating page {}/{}", page, page_count));
        service.generate_page_image(order_id, page).await?.wait().await?;
        service
            .select_image_quadrant(order_id, page, i64::from(page % 4))
            .await?;
        service.accept_page_image(order_id, page).await?;
    }

    bar.set_message("final review");
    service.approve_final_story(order_id).await?;

    bar.set_message("delivering");
    service.deliver_order(order_id, "email").await?;
    Ok(())
}

pub async fn cmd_demo(
    config: &AutomataConfig,
    customer: &str,
    summary: &str,
    email: &str,
) -> Result<()> {
    let service = build_service(config, Vec::new())?;
    let bar = spinner();
    let printer = spawn_event_printer(&service, bar.clone());

    println!();
    let order_id = service
        .create_order(NewOrder {
            customer_name: customer.to_string(),
            email: email.to_string(),
            order_summary: summary.to_string(),
            ..Default::default()
        })
        .await?;
    say(&bar, format!("Created order {}", style(&order_id).bold()));

    let walked = walk_order(&service, &order_id, &bar).await;
    let delivered = service.get_order(&order_id).await?;
    service.shutdown();
    drop(service);
    let _ = printer.await;
    bar.finish_and_clear();
    walked?;

    let order = delivered.context("Order missing after delivery")?;
    let link = order
        .delivery_info
        .as_ref()
        .and_then(|d| d.download_link.as_deref())
        .unwrap_or("-");
    println!();
    println!(
        "{} order {} for {}",
        style("Delivered").green().bold(),
        order.id,
        order.customer_name
    );
    println!("  pages:    {}", order.story_pages.len());
    println!("  story:    {}", link);
    println!("  sent to:  {}", order.email);
    println!();
    Ok(())
}
