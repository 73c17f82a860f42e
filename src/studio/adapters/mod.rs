//! Simulated external generation services.
//!
//! | Adapter                  | Stands in for                      | Latency used                 |
//! |--------------------------|------------------------------------|------------------------------|
//! | `CharacterSheetRenderer` | character sheet image service      | `character_sheet`            |
//! | `IllustrationStudio`     | four-up illustration service       | `api_call`, then `webhook`   |
//! | `StoryTextGenerator`     | story text generation service      | `regeneration` (template)    |
//! | `StoryAssembler`         | PDF assembly                       | `assembly`                   |
//! | `DeliveryCourier`        | customer email delivery            | `delivery`                   |
//!
//! Adapters only produce results. Writing them into an order is the
//! service's job, always against a fresh read of the order.

pub mod assembly;
pub mod character_sheet;
pub mod delivery;
pub mod illustration;
pub mod story_text;

use std::time::Duration;

pub use assembly::StoryAssembler;
pub use character_sheet::CharacterSheetRenderer;
pub use delivery::DeliveryCourier;
pub use illustration::{IllustrationJob, IllustrationStudio};
pub use story_text::{
    HttpTextGenerator, StoryPageRequest, StoryPageResponse, StoryTextGenerator,
    TemplateTextGenerator,
};

/// Suspend for a modeled external latency.
pub async fn simulate_latency(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

/// Short random token that keeps generated asset URLs unique.
pub(crate) fn asset_token() -> String {
    let mut token = uuid::Uuid::new_v4().simple().to_string();
    token.truncate(12);
    token
}

/// Builds URLs for simulated generated assets.
#[derive(Debug, Clone)]
pub struct AssetUrls {
    base: String,
}

impl AssetUrls {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
        }
    }

    pub fn character_sheet(&self, order_id: &str, token: &str) -> String {
        format!("{}/orders/{}/character-sheet-{}.png", self.base, order_id, token)
    }

    pub fn composite(&self, order_id: &str, page_number: u32, task_id: &str) -> String {
        format!(
            "{}/orders/{}/pages/{}/composite-{}.png",
            self.base, order_id, page_number, task_id
        )
    }

    /// URL of one cell of a composite grid.
    pub fn quadrant(&self, composite_url: &str, quadrant: u8) -> String {
        match composite_url.strip_suffix(".png") {
            Some(stem) => format!("{}-q{}.png", stem, quadrant),
            None => format!("{}-q{}", composite_url, quadrant),
        }
    }

    pub fn story_pdf(&self, order_id: &str, token: &str) -> String {
        format!("{}/orders/{}/story-{}.pdf", self.base, order_id, token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_urls_trim_trailing_slash() {
        let urls = AssetUrls::new("https://cdn.example/");
        assert_eq!(
            urls.character_sheet("ord-1", "abc"),
            "https://cdn.example/orders/ord-1/character-sheet-abc.png"
        );
    }

    #[test]
    fn test_quadrant_url_derives_from_composite() {
        let urls = AssetUrls::new("https://cdn.example");
        let composite = urls.composite("ord-1", 3, "t1");
        assert_eq!(
            urls.quadrant(&composite, 2),
            "https://cdn.example/orders/ord-1/pages/3/composite-t1-q2.png"
        );
        assert_eq!(urls.quadrant("https://x/grid", 0), "https://x/grid-q0");
    }

    #[test]
    fn test_asset_tokens_are_unique() {
        let a = asset_token();
        let b = asset_token();
        assert_eq!(a.len(), 12);
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_zero_latency_returns_immediately() {
        simulate_latency(Duration::ZERO).await;
    }
}
