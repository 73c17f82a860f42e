use serde::{Deserialize, Serialize};

use crate::status::{
    AssemblyStatus, CharacterSheetStatus, OrderStage, OrderStatus, PageItemStatus,
};
use crate::time::Timestamp;

/// Stand-in PDF link for a story that has no real file. Never deliverable.
pub const PLACEHOLDER_PDF_URL: &str = "#";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub url: String,
}

impl Attachment {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Reference illustration of the main character.
///
/// Once `status` is `accepted` the sheet is frozen; the mutation engine
/// rejects any further change to it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CharacterSheet {
    pub prompt: String,
    pub status: CharacterSheetStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl CharacterSheet {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            status: CharacterSheetStatus::Pending,
            image_url: None,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.status == CharacterSheetStatus::Accepted
    }

    pub fn has_image(&self) -> bool {
        self.image_url.as_deref().is_some_and(|u| !u.is_empty())
    }
}

/// One page of the storybook with its three review tracks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoryPage {
    pub page_number: u32,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub text_status: PageItemStatus,
    #[serde(
        default,
        rename = "midjourneyPrompt",
        skip_serializing_if = "Option::is_none"
    )]
    pub prompt: Option<String>,
    #[serde(default)]
    pub prompt_status: PageItemStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub illustration_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub composite_image_url: Option<String>,
    #[serde(default)]
    pub image_status: PageItemStatus,
}

impl StoryPage {
    /// Empty page awaiting text, with every track `pending`.
    pub fn blank(page_number: u32) -> Self {
        Self {
            page_number,
            text: String::new(),
            text_status: PageItemStatus::Pending,
            prompt: None,
            prompt_status: PageItemStatus::Pending,
            illustration_image_url: None,
            composite_image_url: None,
            image_status: PageItemStatus::Pending,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>, status: PageItemStatus) -> Self {
        self.text = text.into();
        self.text_status = status;
        self
    }

    pub fn has_prompt(&self) -> bool {
        self.prompt.as_deref().is_some_and(|p| !p.trim().is_empty())
    }

    pub fn has_illustration(&self) -> bool {
        self.illustration_image_url
            .as_deref()
            .is_some_and(|u| !u.is_empty())
    }

    pub fn has_composite(&self) -> bool {
        self.composite_image_url
            .as_deref()
            .is_some_and(|u| !u.is_empty())
    }

    /// Store a four-candidate grid, discarding any selected illustration.
    pub fn attach_composite(&mut self, url: impl Into<String>) {
        self.composite_image_url = Some(url.into());
        self.illustration_image_url = None;
    }

    /// Store the chosen illustration, discarding the grid it came from.
    pub fn attach_illustration(&mut self, url: impl Into<String>) {
        self.illustration_image_url = Some(url.into());
        self.composite_image_url = None;
    }

    pub fn clear_images(&mut self) {
        self.illustration_image_url = None;
        self.composite_image_url = None;
    }

    /// True when text, prompt and image are all accepted and an illustration exists.
    pub fn is_visually_accepted(&self) -> bool {
        self.text_status == PageItemStatus::Accepted
            && self.prompt_status == PageItemStatus::Accepted
            && self.image_status == PageItemStatus::Accepted
            && self.has_illustration()
    }

    /// Check the per-page image invariants.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.illustration_image_url.is_some() && self.composite_image_url.is_some() {
            return Err(format!(
                "page {} has both an illustration and a composite image",
                self.page_number
            ));
        }
        if self.image_status == PageItemStatus::Accepted && !self.has_illustration() {
            return Err(format!(
                "page {} image is accepted without an illustration",
                self.page_number
            ));
        }
        Ok(())
    }
}

/// Check that pages are numbered 1..=n in order and each page holds its invariants.
pub fn check_page_sequence(pages: &[StoryPage]) -> Result<(), String> {
    for (index, page) in pages.iter().enumerate() {
        let expected = index as u32 + 1;
        if page.page_number != expected {
            return Err(format!(
                "page numbers must run from 1 without gaps: expected {}, found {}",
                expected, page.page_number
            ));
        }
        page.check_invariants()?;
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinalStory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    pub assembly_status: AssemblyStatus,
}

impl FinalStory {
    pub fn assembled(pdf_url: impl Into<String>) -> Self {
        Self {
            pdf_url: Some(pdf_url.into()),
            assembly_status: AssemblyStatus::Pending,
        }
    }

    /// A real PDF link, as opposed to a missing or placeholder one.
    pub fn deliverable_pdf(&self) -> Option<&str> {
        self.pdf_url
            .as_deref()
            .filter(|u| !u.is_empty() && *u != PLACEHOLDER_PDF_URL)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryInfo {
    pub method: String,
    pub delivered_at: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_link: Option<String>,
}

/// A personalized storybook order, the aggregate root of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    pub customer_name: String,
    pub email: String,
    pub order_summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_requests: Option<String>,
    pub status: OrderStatus,
    pub stage: OrderStage,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub character_sheet: Option<CharacterSheet>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub story_pages: Vec<StoryPage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_story: Option<FinalStory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delivery_info: Option<DeliveryInfo>,
}

impl Order {
    pub fn page(&self, page_number: u32) -> Option<&StoryPage> {
        self.story_pages
            .iter()
            .find(|p| p.page_number == page_number)
    }

    pub fn page_index(&self, page_number: u32) -> Option<usize> {
        self.story_pages
            .iter()
            .position(|p| p.page_number == page_number)
    }

    pub fn all_text_accepted(&self) -> bool {
        !self.story_pages.is_empty()
            && self
                .story_pages
                .iter()
                .all(|p| p.text_status == PageItemStatus::Accepted)
    }

    pub fn all_visuals_accepted(&self) -> bool {
        !self.story_pages.is_empty() && self.story_pages.iter().all(StoryPage::is_visually_accepted)
    }

    pub fn character_sheet_url(&self) -> Option<&str> {
        self.character_sheet
            .as_ref()
            .and_then(|s| s.image_url.as_deref())
            .filter(|u| !u.is_empty())
    }
}
