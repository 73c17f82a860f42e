use std::time::Duration;

use automata_common::Order;

use super::{AssetUrls, asset_token, simulate_latency};
use crate::errors::{OrderError, Result};

/// Combines accepted page text and illustrations into the story PDF.
#[derive(Debug, Clone)]
pub struct StoryAssembler {
    latency: Duration,
    assets: AssetUrls,
}

impl StoryAssembler {
    pub fn new(latency: Duration, assets: AssetUrls) -> Self {
        Self { latency, assets }
    }

    pub async fn assemble(&self, order: &Order) -> Result<String> {
        if !order.all_visuals_accepted() {
            return Err(OrderError::precondition(
                &order.id,
                "every page needs accepted text, prompt and illustration before assembly",
            ));
        }
        tracing::info!(order_id = %order.id, pages = order.story_pages.len(), "assembling story pdf");
        simulate_latency(self.latency).await;
        Ok(self.assets.story_pdf(&order.id, &asset_token()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::studio::seed::blank_order;
    use automata_common::{PageItemStatus, StoryPage};

    fn assembler() -> StoryAssembler {
        StoryAssembler::new(Duration::ZERO, AssetUrls::new("https://cdn.example"))
    }

    #[tokio::test]
    async fn test_assemble_requires_accepted_pages() {
        let mut order = blank_order("ord-1");
        order.story_pages = vec![StoryPage::blank(1)];
        let err = assembler().assemble(&order).await.unwrap_err();
        assert!(matches!(err, OrderError::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn test_assemble_returns_pdf_url() {
        let mut order = blank_order("ord-1");
        let mut page = StoryPage::blank(1).with_text("The end.", PageItemStatus::Accepted);
        page.prompt = Some("prompt".into());
        page.prompt_status = PageItemStatus::Accepted;
        page.attach_illustration("https://img/1.png");
        page.image_status = PageItemStatus::Accepted;
        order.story_pages = vec![page];

        let url = assembler().assemble(&order).await.unwrap();
        assert!(url.starts_with("https://cdn.example/orders/ord-1/story-"));
        assert!(url.ends_with(".pdf"));
    }
}
