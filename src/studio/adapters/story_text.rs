//! Story page text generation.
//!
//! The text service is opaque: it takes a [`StoryPageRequest`] and answers
//! with a [`StoryPageResponse`]. `TemplateTextGenerator` writes pages
//! offline from the order details; `HttpTextGenerator` forwards the request
//! together with the rendered writer instructions to a remote endpoint.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use automata_common::{Order, PageItemStatus};
use serde::{Deserialize, Serialize};

use super::simulate_latency;
use crate::errors::OrderError;

/// Input for one page of story text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoryPageRequest {
    pub order_summary: String,
    pub customer_name: String,
    pub page_number: u32,
    pub total_pages: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_type: Option<String>,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_requests: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_page_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoryPageResponse {
    pub generated_text: String,
}

const WRITER_INSTRUCTIONS: &str = "You are a creative and engaging children's story writer. \
Write the text for one page of a personalized storybook.";

impl StoryPageRequest {
    /// Build the request for `page_number` of `order`.
    pub fn for_page(
        order: &Order,
        page_number: u32,
        default_language: &str,
    ) -> Result<Self, OrderError> {
        if order.page(page_number).is_none() {
            return Err(OrderError::PageNotFound {
                order_id: order.id.clone(),
                page: page_number,
            });
        }
        // Only reviewed text is context for the next page.
        let previous_page_text = page_number
            .checked_sub(1)
            .and_then(|n| order.page(n))
            .filter(|p| p.text_status == PageItemStatus::Accepted)
            .map(|p| p.text.trim().to_string())
            .filter(|t| !t.is_empty());

        Ok(Self {
            order_summary: order.order_summary.clone(),
            customer_name: order.customer_name.clone(),
            page_number,
            total_pages: order.story_pages.len() as u32,
            story_type: order.story_type.clone(),
            language: order
                .language
                .clone()
                .filter(|l| !l.trim().is_empty())
                .unwrap_or_else(|| default_language.to_string()),
            special_requests: order.special_requests.clone(),
            previous_page_text,
        })
    }

    /// Writer instructions sent to a language model.
    pub fn render_prompt(&self) -> String {
        let mut prompt = format!(
            "{}\n\n\
             ## Story details\n\
             - Main character: {}\n\
             - Summary: {}\n\
             - Story type: {}\n\
             - Language: {}\n",
            WRITER_INSTRUCTIONS,
            self.customer_name,
            self.order_summary,
            self.story_type.as_deref().unwrap_or("any"),
            self.language,
        );
        if let Some(requests) = &self.special_requests {
            prompt.push_str(&format!("- Special requests: {}\n", requests));
        }
        prompt.push_str(&format!(
            "\n## Current page\nYou are writing page {} of {}.\n",
            self.page_number, self.total_pages
        ));
        if let Some(previous) = &self.previous_page_text {
            prompt.push_str(&format!(
                "Text of page {}: {}\n",
                self.page_number.saturating_sub(1),
                previous
            ));
        }
        prompt.push_str(&format!(
            "\n## Instructions\n\
             1. Write engaging, age-appropriate text for page {page}.\n\
             2. Follow the summary and continue from the previous page if given.\n\
             3. Include the special requests where they fit this page.\n\
             4. Keep the tone of the story type.\n\
             5. Output only the page text, with no \"Page X:\" prefix.\n\
             6. Write in {language}.\n",
            page = self.page_number,
            language = self.language,
        ));
        prompt
    }
}

/// Abstraction over story text generation.
/// Real implementations: `TemplateTextGenerator`, `HttpTextGenerator`.
#[async_trait]
pub trait StoryTextGenerator: Send + Sync {
    async fn generate(&self, request: &StoryPageRequest) -> Result<StoryPageResponse>;
}

/// Offline generator that writes a page from the order details.
pub struct TemplateTextGenerator {
    latency: Duration,
}

impl TemplateTextGenerator {
    pub fn new(latency: Duration) -> Self {
        Self { latency }
    }

    fn compose(request: &StoryPageRequest) -> String {
        let name = request.customer_name.trim();
        let summary = request.order_summary.trim().trim_end_matches('.');
        let mut text = if request.page_number == 1 {
            format!("Once upon a time, {} set out on an adventure: {}.", name, summary)
        } else if request.page_number >= request.total_pages {
            format!(
                "At last, {} came home, happy and a little wiser, dreaming of the next adventure.",
                name
            )
        } else {
            format!(
                "Page by page the adventure grew, and {} discovered something new along the way.",
                name
            )
        };
        if let Some(requests) = request.special_requests.as_deref().map(str::trim)
            && !requests.is_empty()
            && request.page_number == 2
        {
            text.push_str(&format!(" Along came {}.", requests.trim_end_matches('.')));
        }
        text
    }
}

#[async_trait]
impl StoryTextGenerator for TemplateTextGenerator {
    async fn generate(&self, request: &StoryPageRequest) -> Result<StoryPageResponse> {
        simulate_latency(self.latency).await;
        Ok(StoryPageResponse {
            generated_text: Self::compose(request),
        })
    }
}

#[derive(Serialize)]
struct HttpGenerationBody<'a> {
    prompt: String,
    input: &'a StoryPageRequest,
    temperature: f32,
}

/// Text generation over HTTP: POSTs the request and rendered prompt as JSON
/// and expects a `StoryPageResponse` back.
pub struct HttpTextGenerator {
    client: reqwest::Client,
    endpoint: String,
    temperature: f32,
}

impl HttpTextGenerator {
    pub fn new(endpoint: &str, timeout: Duration, temperature: f32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client for text generation")?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
            temperature,
        })
    }
}

#[async_trait]
impl StoryTextGenerator for HttpTextGenerator {
    async fn generate(&self, request: &StoryPageRequest) -> Result<StoryPageResponse> {
        let body = HttpGenerationBody {
            prompt: request.render_prompt(),
            input: request,
            temperature: self.temperature,
        };
        let response: StoryPageResponse = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to reach text generation service at {}", self.endpoint))?
            .error_for_status()
            .context("Text generation service returned an error status")?
            .json()
            .await
            .context("Failed to parse text generation response")?;

        if response.generated_text.trim().is_empty() {
            anyhow::bail!("Text generation service returned empty text");
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::studio::seed::blank_order;
    use automata_common::StoryPage;

    fn order_with_pages() -> Order {
        let mut order = blank_order("ord-1");
        order.customer_name = "Mia".to_string();
        order.order_summary = "Mia befriends a shy dragon.".to_string();
        order.special_requests = Some("a purple umbrella".to_string());
        order.story_pages = vec![
            StoryPage::blank(1).with_text("Mia woke up early.", PageItemStatus::Accepted),
            StoryPage::blank(2),
            StoryPage::blank(3),
        ];
        order
    }

    #[test]
    fn test_request_carries_previous_page_text() {
        let request = StoryPageRequest::for_page(&order_with_pages(), 2, "English").unwrap();
        assert_eq!(request.total_pages, 3);
        assert_eq!(request.language, "English");
        assert_eq!(request.previous_page_text.as_deref(), Some("Mia woke up early."));
    }

    #[test]
    fn test_request_skips_empty_previous_page() {
        let request = StoryPageRequest::for_page(&order_with_pages(), 3, "English").unwrap();
        assert!(request.previous_page_text.is_none());
        let first = StoryPageRequest::for_page(&order_with_pages(), 1, "English").unwrap();
        assert!(first.previous_page_text.is_none());
    }

    #[test]
    fn test_request_skips_unreviewed_previous_page() {
        let mut order = order_with_pages();
        order.story_pages[0] =
            StoryPage::blank(1).with_text("Unreviewed draft", PageItemStatus::Pending);
        let request = StoryPageRequest::for_page(&order, 2, "English").unwrap();
        assert!(request.previous_page_text.is_none());

        order.story_pages[0].text_status = PageItemStatus::Regenerating;
        let request = StoryPageRequest::for_page(&order, 2, "English").unwrap();
        assert!(request.previous_page_text.is_none());
    }

    #[test]
    fn test_request_prefers_order_language() {
        let mut order = order_with_pages();
        order.language = Some("Spanish".to_string());
        let request = StoryPageRequest::for_page(&order, 1, "English").unwrap();
        assert_eq!(request.language, "Spanish");
    }

    #[test]
    fn test_request_for_missing_page_is_not_found() {
        let err = StoryPageRequest::for_page(&order_with_pages(), 9, "English").unwrap_err();
        assert!(matches!(err, OrderError::PageNotFound { page: 9, .. }));
    }

    #[test]
    fn test_request_serializes_camel_case() {
        let request = StoryPageRequest::for_page(&order_with_pages(), 2, "English").unwrap();
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"orderSummary\""));
        assert!(json.contains("\"previousPageText\""));
        assert!(!json.contains("\"storyType\""));
    }

    #[test]
    fn test_rendered_prompt_mentions_page_and_language() {
        let request = StoryPageRequest::for_page(&order_with_pages(), 2, "English").unwrap();
        let prompt = request.render_prompt();
        assert!(prompt.contains("page 2 of 3"));
        assert!(prompt.contains("Special requests: a purple umbrella"));
        assert!(prompt.contains("Text of page 1: Mia woke up early."));
        assert!(prompt.contains("Write in English."));
    }

    #[tokio::test]
    async fn test_template_generator_writes_opening_and_ending() {
        let generator = TemplateTextGenerator::new(Duration::ZERO);
        let order = order_with_pages();

        let first = StoryPageRequest::for_page(&order, 1, "English").unwrap();
        let text = generator.generate(&first).await.unwrap().generated_text;
        assert!(text.starts_with("Once upon a time, Mia"));
        assert!(text.contains("befriends a shy dragon"));

        let second = StoryPageRequest::for_page(&order, 2, "English").unwrap();
        let text = generator.generate(&second).await.unwrap().generated_text;
        assert!(text.contains("a purple umbrella"));

        let last = StoryPageRequest::for_page(&order, 3, "English").unwrap();
        let text = generator.generate(&last).await.unwrap().generated_text;
        assert!(text.starts_with("At last, Mia"));
    }

    #[tokio::test]
    async fn test_http_generator_reports_unreachable_endpoint() {
        let generator =
            HttpTextGenerator::new("http://127.0.0.1:9/story", Duration::from_secs(2), 0.8)
                .unwrap();
        let request = StoryPageRequest::for_page(&order_with_pages(), 1, "English").unwrap();
        let err = generator.generate(&request).await.unwrap_err();
        assert!(err.to_string().contains("Failed to reach text generation service"));
    }
}
