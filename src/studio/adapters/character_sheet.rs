use std::time::Duration;

use super::{AssetUrls, asset_token, simulate_latency};
use crate::errors::{OrderError, Result};

/// Renders a character sheet image from a prompt.
#[derive(Debug, Clone)]
pub struct CharacterSheetRenderer {
    latency: Duration,
    assets: AssetUrls,
}

impl CharacterSheetRenderer {
    pub fn new(latency: Duration, assets: AssetUrls) -> Self {
        Self { latency, assets }
    }

    pub async fn render(&self, order_id: &str, prompt: &str) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(OrderError::invalid_value(
                "prompt",
                "character sheet prompt is empty",
            ));
        }
        tracing::info!(order_id, "character sheet generation requested");
        simulate_latency(self.latency).await;
        let url = self.assets.character_sheet(order_id, &asset_token());
        tracing::info!(order_id, url = %url, "character sheet generated");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_render_returns_order_scoped_url() {
        let renderer =
            CharacterSheetRenderer::new(Duration::ZERO, AssetUrls::new("https://cdn.example"));
        let url = renderer.render("ord-1", "a brave girl").await.unwrap();
        assert!(url.starts_with("https://cdn.example/orders/ord-1/character-sheet-"));
    }

    #[tokio::test]
    async fn test_render_rejects_blank_prompt() {
        let renderer =
            CharacterSheetRenderer::new(Duration::ZERO, AssetUrls::new("https://cdn.example"));
        let err = renderer.render("ord-1", "  ").await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidValue { .. }));
    }
}
