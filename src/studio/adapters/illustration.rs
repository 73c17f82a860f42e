use automata_common::{PageItemStatus, StoryPage};

use super::{AssetUrls, asset_token, simulate_latency};
use crate::automata_config::LatencyConfig;
use crate::errors::{OrderError, Result};

/// Number of candidate illustrations in a composite grid.
pub const QUADRANT_COUNT: u8 = 4;

/// A submitted illustration request awaiting its completion callback.
#[derive(Debug, Clone, PartialEq)]
pub struct IllustrationJob {
    pub task_id: String,
    pub order_id: String,
    pub page_number: u32,
    pub prompt: String,
}

/// Four-up illustration service: submit a prompt, receive a composite grid,
/// then pick one quadrant as the page illustration.
#[derive(Debug, Clone)]
pub struct IllustrationStudio {
    latency: LatencyConfig,
    assets: AssetUrls,
}

impl IllustrationStudio {
    pub fn new(latency: LatencyConfig, assets: AssetUrls) -> Self {
        Self { latency, assets }
    }

    /// Check a page can be illustrated and return its prompt.
    pub fn check_request(order_id: &str, page: &StoryPage) -> Result<String> {
        if page.text_status != PageItemStatus::Accepted {
            return Err(OrderError::precondition(
                order_id,
                format!("page {} text must be accepted first", page.page_number),
            ));
        }
        match page.prompt.as_deref().map(str::trim) {
            Some(prompt) if !prompt.is_empty() => Ok(prompt.to_string()),
            _ => Err(OrderError::precondition(
                order_id,
                format!("page {} has no illustration prompt", page.page_number),
            )),
        }
    }

    /// Validate an operator-supplied quadrant index.
    pub fn validate_quadrant(quadrant: i64) -> Result<u8> {
        u8::try_from(quadrant)
            .ok()
            .filter(|q| *q < QUADRANT_COUNT)
            .ok_or_else(|| {
                OrderError::invalid_value(
                    "quadrant",
                    format!("{} is outside 0..={}", quadrant, QUADRANT_COUNT - 1),
                )
            })
    }

    pub async fn submit(&self, order_id: &str, page_number: u32, prompt: &str) -> Result<IllustrationJob> {
        simulate_latency(self.latency.api_call()).await;
        let job = IllustrationJob {
            task_id: asset_token(),
            order_id: order_id.to_string(),
            page_number,
            prompt: prompt.to_string(),
        };
        tracing::info!(order_id, page = page_number, task_id = %job.task_id, "illustration submitted");
        Ok(job)
    }

    /// Wait for the provider callback and return the composite grid URL.
    pub async fn await_completion(&self, job: &IllustrationJob) -> Result<String> {
        simulate_latency(self.latency.webhook()).await;
        let url = self
            .assets
            .composite(&job.order_id, job.page_number, &job.task_id);
        tracing::info!(
            order_id = %job.order_id,
            page = job.page_number,
            task_id = %job.task_id,
            "illustration composite ready"
        );
        Ok(url)
    }

    pub fn quadrant_url(&self, composite_url: &str, quadrant: u8) -> String {
        self.assets.quadrant(composite_url, quadrant)
    }
}
