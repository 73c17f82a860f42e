//! Order service: one async operation per operator action.
//!
//! Every operation first pauses for the configured request latency, then
//! funnels its writes through [`MutationEngine::modify`]. Adapter calls
//! happen between writes, never under the engine lock. Two-phase
//! generations (character sheet, page illustration) return a
//! [`JobTicket`] right away; the background job later calls the matching
//! webhook entry point (`complete_character_sheet`, `complete_page_image`).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use automata_common::{
    Attachment, CharacterSheet, Order, OrderStage, OrderStatus, PageItemStatus, StoryPage,
};
use serde::Deserialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use super::adapters::{
    AssetUrls, CharacterSheetRenderer, DeliveryCourier, HttpTextGenerator, IllustrationStudio,
    StoryAssembler, StoryPageRequest, StoryTextGenerator, TemplateTextGenerator,
    simulate_latency,
};
use super::events::{OrderEvent, broadcast_event};
use super::jobs::{GenerationJobs, GenerationTarget, JobTicket};
use super::mutation::{
    CharacterSheetPatch, Decision, MutationEngine, OrderUpdate, RawOrderUpdate, validate_update,
};
use super::prompts;
use super::store::OrderStore;
use super::transitions::{self, PageReview};
use crate::automata_config::{AutomataConfig, LatencyConfig, PipelineSection, TextGenerationSection, TextProvider};
use crate::errors::{OrderError, Result};

/// Knobs the service needs from configuration.
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub page_count: u32,
    pub default_language: String,
    pub asset_base_url: String,
    pub latency: LatencyConfig,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        let pipeline = PipelineSection::default();
        Self {
            page_count: pipeline.page_count,
            default_language: pipeline.default_language,
            asset_base_url: pipeline.asset_base_url,
            latency: LatencyConfig::default(),
        }
    }
}

impl ServiceSettings {
    /// Default settings with every simulated delay set to zero.
    pub fn instant() -> Self {
        Self {
            latency: LatencyConfig::instant(),
            ..Self::default()
        }
    }

    /// Settings from the effective configuration.
    ///
    /// A page count of zero is refused: an order without pages could never
    /// leave story writing.
    pub fn from_config(config: &AutomataConfig) -> anyhow::Result<Self> {
        let pipeline = &config.toml.pipeline;
        if pipeline.page_count == 0 {
            anyhow::bail!("pipeline.page_count must be at least 1");
        }
        Ok(Self {
            page_count: pipeline.page_count,
            default_language: pipeline.default_language.clone(),
            asset_base_url: pipeline.asset_base_url.clone(),
            latency: config.latency(),
        })
    }
}

/// Build the configured story text generator.
pub fn text_generator_from_config(
    section: &TextGenerationSection,
    latency: LatencyConfig,
) -> anyhow::Result<Arc<dyn StoryTextGenerator>> {
    match section.provider {
        TextProvider::Template => Ok(Arc::new(TemplateTextGenerator::new(latency.regeneration()))),
        TextProvider::Http => {
            let endpoint = section.endpoint.as_deref().ok_or_else(|| {
                anyhow::anyhow!("text_generation.endpoint is required for the http provider")
            })?;
            let generator = HttpTextGenerator::new(
                endpoint,
                Duration::from_secs(section.timeout_secs),
                section.temperature,
            )?;
            Ok(Arc::new(generator))
        }
    }
}

/// Intake form for a new order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub customer_name: String,
    pub email: String,
    pub order_summary: String,
    #[serde(default)]
    pub story_type: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub special_requests: Option<String>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl NewOrder {
    pub fn validate(&self) -> Result<()> {
        if self.customer_name.trim().is_empty() {
            return Err(OrderError::invalid_value(
                "customerName",
                "customer name is required",
            ));
        }
        let email = self.email.trim();
        let looks_valid = email
            .split_once('@')
            .is_some_and(|(user, domain)| !user.is_empty() && !domain.is_empty());
        if !looks_valid {
            return Err(OrderError::invalid_value(
                "email",
                format!("'{}' is not an email address", email),
            ));
        }
        if self.order_summary.trim().is_empty() {
            return Err(OrderError::invalid_value(
                "orderSummary",
                "order summary is required",
            ));
        }
        Ok(())
    }

    fn into_order(self, id: String) -> Order {
        let now = automata_common::now();
        let photo = prompts::reference_photo(&self.attachments).map(|a| a.url.clone());
        let prompt = prompts::character_sheet_prompt(&self.customer_name, photo.as_deref());
        Order {
            id,
            customer_name: self.customer_name.trim().to_string(),
            email: self.email.trim().to_string(),
            order_summary: self.order_summary.trim().to_string(),
            story_type: non_blank(self.story_type),
            language: non_blank(self.language),
            special_requests: non_blank(self.special_requests),
            status: OrderStatus::Pending,
            stage: OrderStage::CharacterSheetGeneration,
            created_at: now,
            updated_at: now,
            attachments: self.attachments,
            character_sheet: Some(CharacterSheet::new(prompt)),
            story_pages: Vec::new(),
            final_story: None,
            delivery_info: None,
        }
    }
}

fn page_of<'a>(order: &'a Order, page_number: u32) -> Result<&'a StoryPage> {
    order.page(page_number).ok_or_else(|| OrderError::PageNotFound {
        order_id: order.id.clone(),
        page: page_number,
    })
}

fn require_visual_stage(order: &Order, action: &str) -> Result<()> {
    if order.stage != OrderStage::VisualContentGeneration {
        return Err(OrderError::invalid_state(
            &order.id,
            order.stage,
            format!("{} requires stage {}", action, OrderStage::VisualContentGeneration),
        ));
    }
    Ok(())
}

fn log_skipped_review(order_id: &str, page: u32, item: &str, review: &PageReview) {
    match review {
        PageReview::AlreadyAccepted => {
            tracing::debug!(order_id, page, item, "already accepted, nothing to do");
        }
        PageReview::WrongStage(stage) => {
            tracing::warn!(order_id, page, item, stage = %stage, "acceptance outside its stage ignored");
        }
        PageReview::InFlight => {
            tracing::warn!(order_id, page, item, "acceptance ignored while regenerating");
        }
        PageReview::Apply(_) => {}
    }
}

/// The operator-facing order pipeline.
#[derive(Clone)]
pub struct OrderService {
    engine: Arc<MutationEngine>,
    text: Arc<dyn StoryTextGenerator>,
    sheets: CharacterSheetRenderer,
    illustrations: IllustrationStudio,
    assembler: StoryAssembler,
    courier: DeliveryCourier,
    jobs: GenerationJobs,
    settings: ServiceSettings,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        text: Arc<dyn StoryTextGenerator>,
        events: broadcast::Sender<String>,
        settings: ServiceSettings,
    ) -> Self {
        let assets = AssetUrls::new(&settings.asset_base_url);
        let latency = settings.latency;
        Self {
            engine: Arc::new(MutationEngine::new(store, events)),
            text,
            sheets: CharacterSheetRenderer::new(latency.character_sheet(), assets.clone()),
            illustrations: IllustrationStudio::new(latency, assets.clone()),
            assembler: StoryAssembler::new(latency.assembly(), assets),
            courier: DeliveryCourier::new(latency.delivery()),
            jobs: GenerationJobs::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn jobs(&self) -> &GenerationJobs {
        &self.jobs
    }

    /// Subscribe to the JSON event feed.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.engine.events().subscribe()
    }

    /// Abort every in-flight generation.
    pub fn shutdown(&self) {
        self.jobs.shutdown();
    }

    async fn pause(&self) {
        simulate_latency(self.settings.latency.request()).await;
    }

    fn generation_started(&self, order_id: &str, target: GenerationTarget) {
        tracing::debug!(order_id, target = %target, "generation started");
        broadcast_event(
            self.engine.events(),
            &OrderEvent::GenerationStarted {
                order_id: order_id.to_string(),
                target,
            },
        );
    }

    fn generation_completed(&self, order_id: &str, target: GenerationTarget, result: &str) {
        tracing::info!(order_id, target = %target, "generation completed");
        broadcast_event(
            self.engine.events(),
            &OrderEvent::GenerationCompleted {
                order_id: order_id.to_string(),
                target,
                result: result.to_string(),
            },
        );
    }

    fn generation_failed(&self, order_id: &str, target: GenerationTarget, error: &OrderError) {
        tracing::warn!(order_id, target = %target, kind = error.kind(), error = %error, "generation failed");
        broadcast_event(
            self.engine.events(),
            &OrderEvent::GenerationFailed {
                order_id: order_id.to_string(),
                target,
                error_kind: error.kind().to_string(),
                error: error.to_string(),
            },
        );
    }

    /// All orders, newest first.
    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        self.pause().await;
        let mut orders = self.engine.store().list_all()?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Option<Order>> {
        self.pause().await;
        self.engine.store().find_by_id(order_id)
    }

    /// Take in a new order and return its id.
    pub async fn create_order(&self, new_order: NewOrder) -> Result<String> {
        self.pause().await;
        new_order.validate()?;
        let order = new_order.into_order(Uuid::new_v4().to_string());
        let order_id = order.id.clone();
        self.engine.store().insert(order.clone())?;
        tracing::info!(order_id = %order_id, customer = %order.customer_name, "order created");
        broadcast_event(self.engine.events(), &OrderEvent::OrderCreated { order });
        Ok(order_id)
    }

    /// Start character sheet generation with `prompt`.
    ///
    /// The sheet image is cleared now and filled in by the background job.
    pub async fn generate_character_sheet(&self, order_id: &str, prompt: &str) -> Result<JobTicket> {
        self.pause().await;
        if prompt.trim().is_empty() {
            return Err(OrderError::invalid_value(
                "prompt",
                "character sheet prompt is empty",
            ));
        }
        let target = GenerationTarget::CharacterSheet;
        let mutation = self.engine.modify(order_id, |order| {
            let update = transitions::begin_character_sheet(order, prompt)?;
            validate_update(order, &update)?;
            let ticket = self.jobs.start(
                order_id,
                target.clone(),
                self.character_sheet_job(order_id, prompt),
            );
            Ok(Decision::Write(update, ticket))
        })?;
        self.generation_started(order_id, target);
        Ok(mutation.value)
    }

    fn character_sheet_job(
        &self,
        order_id: &str,
        prompt: &str,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        let service = self.clone();
        let order_id = order_id.to_string();
        let prompt = prompt.to_string();
        async move {
            match service.sheets.render(&order_id, &prompt).await {
                Ok(url) => service.complete_character_sheet(&order_id, &url).await,
                Err(e) => {
                    service.generation_failed(&order_id, GenerationTarget::CharacterSheet, &e);
                    Err(e)
                }
            }
        }
    }

    /// Webhook entry point: the character sheet image is ready.
    ///
    /// Discarded (with a warning) if the order is no longer waiting for it.
    pub async fn complete_character_sheet(&self, order_id: &str, image_url: &str) -> Result<()> {
        let mutation = self.engine.modify(order_id, |order| {
            let waiting = order.stage == OrderStage::CharacterSheetGeneration
                && order
                    .character_sheet
                    .as_ref()
                    .is_some_and(|s| !s.is_accepted() && !s.has_image());
            if !waiting {
                return Ok(Decision::skip());
            }
            Ok(Decision::write(OrderUpdate::new().character_sheet(
                CharacterSheetPatch {
                    image_url: Some(Some(image_url.to_string())),
                    ..Default::default()
                },
            )))
        })?;
        if mutation.written.is_none() {
            tracing::warn!(order_id, "discarding stale character sheet completion");
            return Ok(());
        }
        self.generation_completed(order_id, GenerationTarget::CharacterSheet, image_url);
        Ok(())
    }

    /// Accept the generated sheet and open story writing.
    pub async fn accept_character_sheet(&self, order_id: &str) -> Result<()> {
        self.pause().await;
        let page_count = self.settings.page_count;
        self.engine.modify(order_id, |order| {
            Ok(Decision::write(transitions::accept_character_sheet(
                order, page_count,
            )?))
        })?;
        tracing::info!(order_id, page_count, "character sheet accepted");
        Ok(())
    }

    /// Accept one page's text. Repeats and out-of-stage calls are no-ops.
    pub async fn accept_page_text(&self, order_id: &str, page_number: u32) -> Result<()> {
        self.pause().await;
        let mutation = self.engine.modify(order_id, |order| {
            Ok(match transitions::accept_text(order, page_number)? {
                PageReview::Apply(update) => Decision::Write(update, None),
                review => Decision::Skip(Some(review)),
            })
        })?;
        match mutation.value {
            Some(review) => log_skipped_review(order_id, page_number, "text", &review),
            None => tracing::info!(order_id, page = page_number, "page text accepted"),
        }
        Ok(())
    }

    /// Rewrite one page with the text generator and return the new text.
    ///
    /// On failure the page goes back to `pending` and `GenerationFailed`
    /// is returned.
    pub async fn regenerate_page_text(&self, order_id: &str, page_number: u32) -> Result<String> {
        self.pause().await;
        let target = GenerationTarget::PageText { page: page_number };
        let language = self.settings.default_language.clone();
        let mutation = self.engine.modify(order_id, |order| {
            if order.stage != OrderStage::StoryContentGeneration {
                return Err(OrderError::invalid_state(
                    &order.id,
                    order.stage,
                    format!(
                        "text regeneration requires stage {}",
                        OrderStage::StoryContentGeneration
                    ),
                ));
            }
            let request = StoryPageRequest::for_page(order, page_number, &language)?;
            let pages = transitions::edit_page(order, page_number, |p| {
                p.text_status = PageItemStatus::Regenerating;
            })?;
            Ok(Decision::Write(OrderUpdate::new().story_pages(pages), request))
        })?;
        self.generation_started(order_id, target.clone());

        let text = match self.text.generate(&mutation.value).await {
            Ok(response) => response.generated_text,
            Err(e) => {
                self.rollback_page_item(order_id, page_number, "text", |p| &mut p.text_status);
                let err = OrderError::generation(order_id, format!("{:#}", e));
                self.generation_failed(order_id, target, &err);
                return Err(err);
            }
        };

        self.engine.modify(order_id, |order| {
            let page = page_of(order, page_number)?;
            if order.stage != OrderStage::StoryContentGeneration
                || page.text_status != PageItemStatus::Regenerating
            {
                return Err(OrderError::invalid_state(
                    &order.id,
                    order.stage,
                    format!("page {} is no longer regenerating", page_number),
                ));
            }
            let pages = transitions::edit_page(order, page_number, |p| {
                p.text = text.clone();
                p.text_status = PageItemStatus::Pending;
            })?;
            Ok(Decision::write(OrderUpdate::new().story_pages(pages)))
        })?;
        self.generation_completed(order_id, target, &text);
        Ok(text)
    }

    /// Put a page item left `regenerating` by a failed operation back to `pending`.
    fn rollback_page_item(
        &self,
        order_id: &str,
        page_number: u32,
        item: &'static str,
        status_of: fn(&mut StoryPage) -> &mut PageItemStatus,
    ) {
        let result = self.engine.modify(order_id, |order| {
            let mut pages = order.story_pages.clone();
            let Some(page) = pages.iter_mut().find(|p| p.page_number == page_number) else {
                return Ok(Decision::skip());
            };
            let status = status_of(page);
            if *status != PageItemStatus::Regenerating {
                return Ok(Decision::skip());
            }
            *status = PageItemStatus::Pending;
            Ok(Decision::write(OrderUpdate::new().story_pages(pages)))
        });
        if let Err(e) = result {
            tracing::warn!(order_id, page = page_number, item, error = %e, "failed to roll back regenerating status");
        }
    }

    /// Re-roll one page's illustration prompt and return it.
    ///
    /// Clears the page images, resets the image status and aborts any
    /// illustration job running for the page. Concurrent re-rolls: the
    /// last one to finish wins. If the order leaves the visual stage
    /// meanwhile, the prompt keeps its old text and goes back to `pending`.
    pub async fn regenerate_page_prompt(&self, order_id: &str, page_number: u32) -> Result<String> {
        self.pause().await;
        let target = GenerationTarget::PagePrompt { page: page_number };
        self.engine.modify(order_id, |order| {
            require_visual_stage(order, "prompt regeneration")?;
            let pages = transitions::edit_page(order, page_number, |p| {
                p.prompt_status = PageItemStatus::Regenerating;
                p.clear_images();
                p.image_status = PageItemStatus::Pending;
            })?;
            self.jobs
                .cancel(order_id, &GenerationTarget::PageImage { page: page_number });
            Ok(Decision::write(OrderUpdate::new().story_pages(pages)))
        })?;
        self.generation_started(order_id, target.clone());

        simulate_latency(self.settings.latency.regeneration()).await;

        let rerolled = self.engine.modify(order_id, |order| {
            require_visual_stage(order, "prompt regeneration")?;
            let prompt = prompts::regenerated_illustration_prompt(
                page_number,
                order.character_sheet_url(),
                &mut rand::thread_rng(),
            );
            let pages = transitions::edit_page(order, page_number, |p| {
                p.prompt = Some(prompt.clone());
                p.prompt_status = PageItemStatus::Pending;
            })?;
            Ok(Decision::Write(OrderUpdate::new().story_pages(pages), prompt))
        });
        let mutation = match rerolled {
            Ok(mutation) => mutation,
            Err(e) => {
                self.rollback_page_item(order_id, page_number, "prompt", |p| &mut p.prompt_status);
                self.generation_failed(order_id, target, &e);
                return Err(e);
            }
        };
        self.generation_completed(order_id, target, &mutation.value);
        Ok(mutation.value)
    }

    /// Start illustration generation for one page.
    ///
    /// Any previous composite or selection is discarded; a job already
    /// running for the page is aborted and replaced.
    pub async fn generate_page_image(&self, order_id: &str, page_number: u32) -> Result<JobTicket> {
        self.pause().await;
        let target = GenerationTarget::PageImage { page: page_number };
        let mutation = self.engine.modify(order_id, |order| {
            require_visual_stage(order, "illustration generation")?;
            let page = page_of(order, page_number)?;
            if page.prompt_status == PageItemStatus::Regenerating {
                return Err(OrderError::invalid_state(
                    &order.id,
                    order.stage,
                    format!("page {} prompt is being regenerated", page_number),
                ));
            }
            let prompt = IllustrationStudio::check_request(&order.id, page)?;
            let pages = transitions::edit_page(order, page_number, |p| {
                p.clear_images();
                p.image_status = PageItemStatus::Regenerating;
            })?;
            let update = OrderUpdate::new().story_pages(pages);
            validate_update(order, &update)?;
            let ticket = self.jobs.start(
                order_id,
                target.clone(),
                self.illustration_job(order_id, page_number, prompt),
            );
            Ok(Decision::Write(update, ticket))
        })?;
        self.generation_started(order_id, target);
        Ok(mutation.value)
    }

    fn illustration_job(
        &self,
        order_id: &str,
        page_number: u32,
        prompt: String,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        let service = self.clone();
        let order_id = order_id.to_string();
        async move {
            let result: Result<String> = async {
                let job = service
                    .illustrations
                    .submit(&order_id, page_number, &prompt)
                    .await?;
                service.illustrations.await_completion(&job).await
            }
            .await;
            match result {
                Ok(url) => service.complete_page_image(&order_id, page_number, &url).await,
                Err(e) => {
                    service.rollback_page_item(&order_id, page_number, "image", |p| &mut p.image_status);
                    service.generation_failed(
                        &order_id,
                        GenerationTarget::PageImage { page: page_number },
                        &e,
                    );
                    Err(e)
                }
            }
        }
    }

    /// Webhook entry point: the composite grid for a page is ready.
    ///
    /// Discarded (with a warning) unless the page is still regenerating in
    /// the visual content stage.
    pub async fn complete_page_image(
        &self,
        order_id: &str,
        page_number: u32,
        composite_url: &str,
    ) -> Result<()> {
        let mutation = self.engine.modify(order_id, |order| {
            let page = page_of(order, page_number)?;
            if order.stage != OrderStage::VisualContentGeneration
                || page.image_status != PageItemStatus::Regenerating
            {
                return Ok(Decision::skip());
            }
            let pages = transitions::edit_page(order, page_number, |p| {
                p.attach_composite(composite_url);
                p.image_status = PageItemStatus::Pending;
            })?;
            Ok(Decision::write(OrderUpdate::new().story_pages(pages)))
        })?;
        if mutation.written.is_none() {
            tracing::warn!(order_id, page = page_number, "discarding stale illustration completion");
            return Ok(());
        }
        self.generation_completed(
            order_id,
            GenerationTarget::PageImage { page: page_number },
            composite_url,
        );
        Ok(())
    }

    /// Pick one quadrant (0..=3) of the composite as the page illustration.
    pub async fn select_image_quadrant(
        &self,
        order_id: &str,
        page_number: u32,
        quadrant: i64,
    ) -> Result<()> {
        self.pause().await;
        let quadrant = IllustrationStudio::validate_quadrant(quadrant)?;
        let mutation = self.engine.modify(order_id, |order| {
            require_visual_stage(order, "quadrant selection")?;
            let page = page_of(order, page_number)?;
            let composite = page.composite_image_url.as_deref().ok_or_else(|| {
                OrderError::precondition(
                    &order.id,
                    format!("page {} has no composite image to select from", page_number),
                )
            })?;
            let url = self.illustrations.quadrant_url(composite, quadrant);
            let pages = transitions::edit_page(order, page_number, |p| {
                p.attach_illustration(url.clone());
                p.image_status = PageItemStatus::Pending;
            })?;
            Ok(Decision::Write(OrderUpdate::new().story_pages(pages), url))
        })?;
        tracing::info!(order_id, page = page_number, quadrant, url = %mutation.value, "illustration selected");
        Ok(())
    }

    /// Accept one page's illustration; once every page is accepted the
    /// story is assembled and the order moves to final review.
    pub async fn accept_page_image(&self, order_id: &str, page_number: u32) -> Result<()> {
        self.pause().await;
        let mutation = self.engine.modify(order_id, |order| {
            Ok(match transitions::accept_image(order, page_number)? {
                PageReview::Apply(update) => Decision::Write(update, None),
                review => Decision::Skip(Some(review)),
            })
        })?;
        let order = match (mutation.value, mutation.written) {
            (None, Some(order)) => {
                tracing::info!(order_id, page = page_number, "page illustration accepted");
                order
            }
            (Some(PageReview::AlreadyAccepted), _) => {
                log_skipped_review(order_id, page_number, "image", &PageReview::AlreadyAccepted);
                self.engine.find(order_id)?
            }
            (Some(review), _) => {
                log_skipped_review(order_id, page_number, "image", &review);
                return Ok(());
            }
            (None, None) => return Ok(()),
        };

        if !transitions::ready_for_assembly(&order) {
            return Ok(());
        }
        let pdf_url = self.assembler.assemble(&order).await?;
        let mutation = self.engine.modify(order_id, |order| {
            Ok(match transitions::assembly_completion(order, &pdf_url) {
                Some(update) => Decision::write(update),
                None => Decision::skip(),
            })
        })?;
        if mutation.written.is_none() {
            tracing::warn!(order_id, "order changed during assembly, discarding assembled story");
        }
        Ok(())
    }

    pub async fn approve_final_story(&self, order_id: &str) -> Result<()> {
        self.pause().await;
        self.engine.modify(order_id, |order| {
            Ok(Decision::write(transitions::approve_final_story(order)?))
        })?;
        tracing::info!(order_id, "final story approved");
        Ok(())
    }

    /// Send the order back to `target` (final review when `None`).
    pub async fn request_correction(&self, order_id: &str, target: Option<OrderStage>) -> Result<()> {
        self.pause().await;
        self.engine.modify(order_id, |order| {
            Ok(Decision::write(transitions::request_correction(order, target)?))
        })?;
        tracing::info!(
            order_id,
            target = %target.unwrap_or(OrderStage::FinalReview),
            "correction requested"
        );
        Ok(())
    }

    /// Send the finished story to the customer and mark the order delivered.
    pub async fn deliver_order(&self, order_id: &str, method: &str) -> Result<()> {
        self.pause().await;
        let method = method.trim();
        if method.is_empty() {
            return Err(OrderError::invalid_value("method", "delivery method is required"));
        }
        let order = self.engine.find(order_id)?;
        let link = transitions::check_deliverable(&order)?;
        self.courier.send(&order, method, &link).await?;

        // The order may have changed while the send was in flight.
        self.engine.modify(order_id, |order| {
            let link = transitions::check_deliverable(order)?;
            Ok(Decision::write(transitions::delivery(
                method,
                automata_common::now(),
                link,
            )))
        })?;
        tracing::info!(order_id, method, "order delivered");
        Ok(())
    }

    /// Operator override with string-typed values.
    pub async fn apply_raw_update(&self, order_id: &str, raw: RawOrderUpdate) -> Result<Order> {
        self.pause().await;
        let order = self.engine.apply_raw_update(order_id, raw)?;
        tracing::info!(order_id, status = %order.status, stage = %order.stage, "manual override applied");
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::studio::events::event_channel;
    use crate::studio::seed::sample_orders;
    use crate::studio::store::MemoryOrderStore;
    use async_trait::async_trait;
    use automata_common::AssemblyStatus;

    use crate::studio::adapters::StoryPageResponse;

    struct FailingTextGenerator;

    #[async_trait]
    impl StoryTextGenerator for FailingTextGenerator {
        async fn generate(&self, _request: &StoryPageRequest) -> anyhow::Result<StoryPageResponse> {
            anyhow::bail!("model overloaded")
        }
    }

    fn service_with(orders: Vec<Order>, text: Arc<dyn StoryTextGenerator>) -> OrderService {
        let store = Arc::new(MemoryOrderStore::with_orders(orders));
        OrderService::new(store, text, event_channel(), ServiceSettings::instant())
    }

    fn seeded() -> OrderService {
        service_with(
            sample_orders(automata_common::now()),
            Arc::new(TemplateTextGenerator::new(Duration::ZERO)),
        )
    }

    fn new_order() -> NewOrder {
        NewOrder {
            customer_name: "  Leo ".into(),
            email: "leo@example.com".into(),
            order_summary: "Leo learns to fly a kite".into(),
            attachments: vec![Attachment::new("leo.png", "https://files/leo.png")],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_order_fills_sheet_prompt() {
        let service = seeded();
        let id = service.create_order(new_order()).await.unwrap();
        let order = service.get_order(&id).await.unwrap().unwrap();
        assert_eq!(order.customer_name, "Leo");
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.stage, OrderStage::CharacterSheetGeneration);
        let sheet = order.character_sheet.unwrap();
        assert!(sheet.prompt.contains("named Leo"));
        assert!(sheet.prompt.contains("--cref https://files/leo.png"));
    }

    #[tokio::test]
    async fn test_create_order_rejects_bad_email() {
        let service = seeded();
        let mut order = new_order();
        order.email = "leo-at-example".into();
        let err = service.create_order(order).await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidValue { ref field, .. } if field == "email"));
    }

    #[tokio::test]
    async fn test_list_orders_newest_first() {
        let service = seeded();
        let id = service.create_order(new_order()).await.unwrap();
        let orders = service.list_orders().await.unwrap();
        assert_eq!(orders[0].id, id);
        assert!(orders.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[tokio::test]
    async fn test_failed_text_generation_rolls_back() {
        let service = service_with(
            sample_orders(automata_common::now()),
            Arc::new(FailingTextGenerator),
        );
        let err = service.regenerate_page_text("sample-003", 2).await.unwrap_err();
        assert!(matches!(err, OrderError::GenerationFailed { .. }));
        assert!(err.to_string().contains("model overloaded"));

        let order = service.get_order("sample-003").await.unwrap().unwrap();
        assert_eq!(order.page(2).unwrap().text_status, PageItemStatus::Pending);
    }

    #[tokio::test]
    async fn test_text_regeneration_outside_story_stage_is_invalid_state() {
        let service = seeded();
        let err = service.regenerate_page_text("sample-004", 1).await.unwrap_err();
        assert!(matches!(err, OrderError::InvalidState { .. }));
    }

    #[tokio::test]
    async fn test_quadrant_out_of_range_is_checked_first() {
        let service = seeded();
        let err = service
            .select_image_quadrant("no-such-order", 1, 4)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidValue { .. }));
    }

    #[tokio::test]
    async fn test_select_quadrant_replaces_composite() {
        let service = seeded();
        service.select_image_quadrant("sample-005", 1, 2).await.unwrap();
        let order = service.get_order("sample-005").await.unwrap().unwrap();
        let page = order.page(1).unwrap();
        assert!(page.composite_image_url.is_none());
        assert!(page.illustration_image_url.as_deref().unwrap().ends_with("-q2.png"));
        assert_eq!(page.image_status, PageItemStatus::Pending);
    }

    #[tokio::test]
    async fn test_select_quadrant_without_composite_fails() {
        let service = seeded();
        let err = service.select_image_quadrant("sample-004", 1, 0).await.unwrap_err();
        assert!(matches!(err, OrderError::PreconditionFailed { .. }));
    }

    #[tokio::test]
    async fn test_stale_image_completion_is_discarded() {
        let service = seeded();
        let before = service.get_order("sample-006").await.unwrap().unwrap();
        service
            .complete_page_image("sample-006", 1, "https://late/composite.png")
            .await
            .unwrap();
        let after = service.get_order("sample-006").await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_prompt_reroll_clears_images() {
        let service = seeded();
        let prompt = service.regenerate_page_prompt("sample-006", 1).await.unwrap();
        let order = service.get_order("sample-006").await.unwrap().unwrap();
        let page = order.page(1).unwrap();
        assert_eq!(page.prompt.as_deref(), Some(prompt.as_str()));
        assert_eq!(page.prompt_status, PageItemStatus::Pending);
        assert!(!page.has_illustration());
        assert_eq!(page.image_status, PageItemStatus::Pending);
    }

    #[tokio::test]
    async fn test_correction_then_approval() {
        let service = seeded();
        service.request_correction("sample-007", None).await.unwrap();
        let order = service.get_order("sample-007").await.unwrap().unwrap();
        assert_eq!(order.stage, OrderStage::FinalReview);
        assert_eq!(
            order.final_story.as_ref().unwrap().assembly_status,
            AssemblyStatus::NeedsCorrection
        );

        service.approve_final_story("sample-007").await.unwrap();
        let order = service.get_order("sample-007").await.unwrap().unwrap();
        assert_eq!(order.stage, OrderStage::Completed);
        assert_eq!(order.status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn test_delivery_records_link() {
        let service = seeded();
        service.deliver_order("sample-008", "email").await.unwrap();
        let order = service.get_order("sample-008").await.unwrap().unwrap();
        assert_eq!(order.stage, OrderStage::Delivered);
        let info = order.delivery_info.unwrap();
        assert_eq!(info.method, "email");
        assert!(info.download_link.unwrap().ends_with("story.pdf"));
    }

    #[tokio::test]
    async fn test_raw_override_marks_failed() {
        let service = seeded();
        let raw = RawOrderUpdate {
            status: Some("failed".into()),
            stage: Some("failed".into()),
            ..Default::default()
        };
        let order = service.apply_raw_update("sample-002", raw).await.unwrap();
        assert_eq!(order.stage, OrderStage::Failed);
    }

    #[test]
    fn test_http_provider_needs_endpoint() {
        let section = TextGenerationSection {
            provider: TextProvider::Http,
            endpoint: None,
            ..Default::default()
        };
        let err = text_generator_from_config(&section, LatencyConfig::instant())
            .err()
            .unwrap();
        assert!(err.to_string().contains("endpoint"));
    }

    #[test]
    fn test_settings_refuse_zero_pages() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AutomataConfig::new(dir.path().to_path_buf()).unwrap();
        assert_eq!(ServiceSettings::from_config(&config).unwrap().page_count, 5);

        config.toml.pipeline.page_count = 0;
        let err = ServiceSettings::from_config(&config).err().unwrap();
        assert!(err.to_string().contains("page_count must be at least 1"));
    }
}
