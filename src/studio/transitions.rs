//! Stage transition rules.
//!
//! Pure decisions over an order snapshot. Each function either returns the
//! [`OrderUpdate`] to apply or explains why nothing should happen; none of
//! them touch the store. The service runs them inside
//! `MutationEngine::modify` so the snapshot is always the latest order.

use automata_common::{
    AssemblyStatus, CharacterSheetStatus, Order, OrderStage, OrderStatus, PageItemStatus,
    StoryPage, Timestamp,
};

use super::mutation::{CharacterSheetPatch, DeliveryInfoPatch, FinalStoryPatch, OrderUpdate};
use super::prompts;
use crate::errors::{OrderError, Result};

/// Outcome of an operator acceptance of one page sub-item.
#[derive(Debug, Clone, PartialEq)]
pub enum PageReview {
    Apply(OrderUpdate),
    /// Already accepted; accepting again changes nothing.
    AlreadyAccepted,
    /// The order is not in the stage this review belongs to.
    WrongStage(OrderStage),
    /// A regeneration is running for this item.
    InFlight,
}

fn page_or_err(order: &Order, page_number: u32) -> Result<&StoryPage> {
    order
        .page(page_number)
        .ok_or_else(|| OrderError::PageNotFound {
            order_id: order.id.clone(),
            page: page_number,
        })
}

/// Copy of `order` pages with `f` applied to one page.
pub fn edit_page<F>(order: &Order, page_number: u32, f: F) -> Result<Vec<StoryPage>>
where
    F: FnOnce(&mut StoryPage),
{
    let index = order
        .page_index(page_number)
        .ok_or_else(|| OrderError::PageNotFound {
            order_id: order.id.clone(),
            page: page_number,
        })?;
    let mut pages = order.story_pages.clone();
    f(&mut pages[index]);
    Ok(pages)
}

fn require_stage(order: &Order, stage: OrderStage, action: &str) -> Result<()> {
    if order.stage != stage {
        return Err(OrderError::invalid_state(
            &order.id,
            order.stage,
            format!("{} requires stage {}", action, stage),
        ));
    }
    Ok(())
}

/// Start (or restart) character sheet generation with `prompt`.
pub fn begin_character_sheet(order: &Order, prompt: &str) -> Result<OrderUpdate> {
    require_stage(
        order,
        OrderStage::CharacterSheetGeneration,
        "character sheet generation",
    )?;
    if order.character_sheet.as_ref().is_some_and(|s| s.is_accepted()) {
        return Err(OrderError::invalid_state(
            &order.id,
            order.stage,
            "character sheet is already accepted",
        ));
    }
    Ok(OrderUpdate::new().character_sheet(CharacterSheetPatch {
        prompt: Some(prompt.to_string()),
        status: Some(CharacterSheetStatus::Pending),
        image_url: Some(None),
    }))
}

/// Accept the character sheet, open story writing and lay out blank pages.
pub fn accept_character_sheet(order: &Order, page_count: u32) -> Result<OrderUpdate> {
    require_stage(
        order,
        OrderStage::CharacterSheetGeneration,
        "character sheet acceptance",
    )?;
    let ready = order
        .character_sheet
        .as_ref()
        .is_some_and(|s| s.status == CharacterSheetStatus::Pending && s.has_image());
    if !ready {
        return Err(OrderError::invalid_state(
            &order.id,
            order.stage,
            "character sheet must be pending with a generated image",
        ));
    }

    let mut update = OrderUpdate::new()
        .character_sheet(CharacterSheetPatch {
            status: Some(CharacterSheetStatus::Accepted),
            ..Default::default()
        })
        .stage(OrderStage::StoryContentGeneration)
        .status(OrderStatus::InProgress);
    if order.story_pages.is_empty() {
        update = update.story_pages((1..=page_count).map(StoryPage::blank).collect());
    }
    Ok(update)
}

/// Accept one page's text and, if it was the last one, open illustration work.
pub fn accept_text(order: &Order, page_number: u32) -> Result<PageReview> {
    if order.stage != OrderStage::StoryContentGeneration {
        return Ok(PageReview::WrongStage(order.stage));
    }
    let page = page_or_err(order, page_number)?;
    match page.text_status {
        // Back from a sheet correction with every page already accepted.
        PageItemStatus::Accepted if order.all_text_accepted() => {
            return Ok(PageReview::Apply(text_transition(
                order,
                order.story_pages.clone(),
            )));
        }
        PageItemStatus::Accepted => return Ok(PageReview::AlreadyAccepted),
        PageItemStatus::Regenerating => return Ok(PageReview::InFlight),
        PageItemStatus::Pending => {}
    }
    if page.text.trim().is_empty() {
        return Err(OrderError::precondition(
            &order.id,
            format!("page {} has no text to accept", page_number),
        ));
    }

    let pages = edit_page(order, page_number, |p| {
        p.text_status = PageItemStatus::Accepted;
    })?;
    Ok(PageReview::Apply(text_transition(order, pages)))
}

/// Update carrying `pages`, plus the move to visual content once every text is accepted.
///
/// Prompt-less pages get a synthesized prompt (accepted, image pending).
/// Pages that already have a prompt keep it; a `pending` prompt status is
/// promoted to `accepted`.
pub fn text_transition(order: &Order, mut pages: Vec<StoryPage>) -> OrderUpdate {
    let all_accepted =
        !pages.is_empty() && pages.iter().all(|p| p.text_status == PageItemStatus::Accepted);
    if !all_accepted {
        return OrderUpdate::new().story_pages(pages);
    }

    let sheet_url = order.character_sheet_url();
    for page in pages.iter_mut() {
        if page.has_prompt() {
            if page.prompt_status == PageItemStatus::Pending {
                page.prompt_status = PageItemStatus::Accepted;
            }
        } else {
            page.prompt = Some(prompts::initial_illustration_prompt(page, sheet_url));
            page.prompt_status = PageItemStatus::Accepted;
            page.image_status = PageItemStatus::Pending;
        }
    }
    OrderUpdate::new()
        .story_pages(pages)
        .stage(OrderStage::VisualContentGeneration)
}

/// Accept one page's selected illustration.
pub fn accept_image(order: &Order, page_number: u32) -> Result<PageReview> {
    if order.stage != OrderStage::VisualContentGeneration {
        return Ok(PageReview::WrongStage(order.stage));
    }
    let page = page_or_err(order, page_number)?;
    if page.image_status == PageItemStatus::Accepted {
        return Ok(PageReview::AlreadyAccepted);
    }
    if !page.has_illustration() {
        return Err(OrderError::precondition(
            &order.id,
            format!("page {} has no selected illustration", page_number),
        ));
    }
    // Accepting the picture also accepts the prompt that produced it.
    let pages = edit_page(order, page_number, |p| {
        p.image_status = PageItemStatus::Accepted;
        if p.prompt_status == PageItemStatus::Pending {
            p.prompt_status = PageItemStatus::Accepted;
        }
    })?;
    Ok(PageReview::Apply(OrderUpdate::new().story_pages(pages)))
}

/// True when the order sits in visual content and every page is fully accepted.
pub fn ready_for_assembly(order: &Order) -> bool {
    order.stage == OrderStage::VisualContentGeneration && order.all_visuals_accepted()
}

/// Move to final review with the assembled PDF, if the order is still ready.
pub fn assembly_completion(order: &Order, pdf_url: &str) -> Option<OrderUpdate> {
    if !ready_for_assembly(order) {
        return None;
    }
    Some(
        OrderUpdate::new()
            .stage(OrderStage::FinalReview)
            .final_story(FinalStoryPatch {
                pdf_url: Some(pdf_url.to_string()),
                assembly_status: Some(AssemblyStatus::Pending),
            }),
    )
}

pub fn approve_final_story(order: &Order) -> Result<OrderUpdate> {
    require_stage(order, OrderStage::FinalReview, "final story approval")?;
    if order.final_story.is_none() {
        return Err(OrderError::invalid_state(
            &order.id,
            order.stage,
            "there is no assembled story to approve",
        ));
    }
    Ok(OrderUpdate::new()
        .final_story(FinalStoryPatch {
            assembly_status: Some(AssemblyStatus::Approved),
            ..Default::default()
        })
        .status(OrderStatus::Completed)
        .stage(OrderStage::Completed))
}

/// Send the order back for rework. Without a target it stays in final review.
///
/// Going back to character sheet generation reopens the accepted sheet so
/// it can be regenerated or accepted again.
pub fn request_correction(order: &Order, target: Option<OrderStage>) -> Result<OrderUpdate> {
    if let Some(stage) = target
        && !stage.is_correction_target()
    {
        return Err(OrderError::invalid_value(
            "targetStage",
            format!("{} is not a stage an order can be corrected to", stage),
        ));
    }
    if order.stage == OrderStage::Delivered {
        return Err(OrderError::invalid_state(
            &order.id,
            order.stage,
            "delivered orders cannot be corrected",
        ));
    }
    let stage = target.unwrap_or(OrderStage::FinalReview);
    let mut update = OrderUpdate::new()
        .final_story(FinalStoryPatch {
            assembly_status: Some(AssemblyStatus::NeedsCorrection),
            ..Default::default()
        })
        .status(OrderStatus::InProgress)
        .stage(stage);
    if stage == OrderStage::CharacterSheetGeneration && order.character_sheet.is_some() {
        update = update.character_sheet(CharacterSheetPatch::reopen());
    }
    Ok(update)
}

/// Check the order can be delivered and return the PDF link to send.
pub fn check_deliverable(order: &Order) -> Result<String> {
    if order.stage != OrderStage::Completed || order.status != OrderStatus::Completed {
        return Err(OrderError::precondition(
            &order.id,
            format!(
                "order must be completed before delivery (status {}, stage {})",
                order.status, order.stage
            ),
        ));
    }
    let story = order
        .final_story
        .as_ref()
        .ok_or_else(|| OrderError::precondition(&order.id, "there is no final story"))?;
    if story.assembly_status != AssemblyStatus::Approved {
        return Err(OrderError::precondition(
            &order.id,
            format!("final story is {}", story.assembly_status.as_str()),
        ));
    }
    story
        .deliverable_pdf()
        .map(str::to_string)
        .ok_or_else(|| OrderError::precondition(&order.id, "final story has no PDF"))
}

pub fn delivery(method: &str, delivered_at: Timestamp, download_link: String) -> OrderUpdate {
    OrderUpdate::new()
        .status(OrderStatus::Delivered)
        .stage(OrderStage::Delivered)
        .delivery_info(DeliveryInfoPatch {
            method: Some(method.to_string()),
            delivered_at: Some(delivered_at),
            download_link: Some(download_link),
        })
}
