//! Enumerated lifecycle values and their validators.
//!
//! Every value has a stable snake_case wire form (`as_str`) and a `FromStr`
//! impl. The `parse_*` functions are the validators used by the mutation
//! engine when an update arrives with raw string values.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A raw value that does not belong to its enumerated domain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid {field}: '{value}'")]
pub struct UnknownValue {
    pub field: &'static str,
    pub value: String,
}

/// Coarse lifecycle flag of an order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Delivered,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Delivered => "delivered",
        }
    }
}

impl FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "delivered" => Ok(Self::Delivered),
            _ => Err(format!("Invalid order status: {}", s)),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pipeline phase of an order.
///
/// The forward path is
/// `character_sheet_generation → story_content_generation →
/// visual_content_generation → final_review → completed → delivered`.
/// `pending_approval` is part of the domain but no transition produces it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OrderStage {
    CharacterSheetGeneration,
    PendingApproval,
    StoryContentGeneration,
    VisualContentGeneration,
    FinalReview,
    Completed,
    Failed,
    Delivered,
}

impl OrderStage {
    /// Stages a final-review correction may send an order back to.
    pub const CORRECTION_TARGETS: [OrderStage; 4] = [
        OrderStage::CharacterSheetGeneration,
        OrderStage::StoryContentGeneration,
        OrderStage::VisualContentGeneration,
        OrderStage::FinalReview,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CharacterSheetGeneration => "character_sheet_generation",
            Self::PendingApproval => "pending_approval",
            Self::StoryContentGeneration => "story_content_generation",
            Self::VisualContentGeneration => "visual_content_generation",
            Self::FinalReview => "final_review",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Delivered => "delivered",
        }
    }

    /// Human-readable label used by the CLI.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CharacterSheetGeneration => "Character Sheet",
            Self::PendingApproval => "Pending Approval",
            Self::StoryContentGeneration => "Story Text",
            Self::VisualContentGeneration => "Illustrations",
            Self::FinalReview => "Final Review",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
            Self::Delivered => "Delivered",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }

    pub fn is_correction_target(&self) -> bool {
        Self::CORRECTION_TARGETS.contains(self)
    }
}

impl FromStr for OrderStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "character_sheet_generation" => Ok(Self::CharacterSheetGeneration),
            "pending_approval" => Ok(Self::PendingApproval),
            "story_content_generation" => Ok(Self::StoryContentGeneration),
            "visual_content_generation" => Ok(Self::VisualContentGeneration),
            "final_review" => Ok(Self::FinalReview),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "delivered" => Ok(Self::Delivered),
            _ => Err(format!("Invalid order stage: {}", s)),
        }
    }
}

impl fmt::Display for OrderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one per-page sub-item (text, prompt or image).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PageItemStatus {
    #[default]
    Pending,
    Accepted,
    Regenerating,
}

impl PageItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Regenerating => "regenerating",
        }
    }
}

impl FromStr for PageItemStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "regenerating" => Ok(Self::Regenerating),
            _ => Err(format!("Invalid page item status: {}", s)),
        }
    }
}

impl fmt::Display for PageItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CharacterSheetStatus {
    #[default]
    Pending,
    Accepted,
}

impl CharacterSheetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
        }
    }
}

impl FromStr for CharacterSheetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            _ => Err(format!("Invalid character sheet status: {}", s)),
        }
    }
}

/// Review state of the assembled story PDF.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyStatus {
    #[default]
    Pending,
    Approved,
    NeedsCorrection,
}

impl AssemblyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::NeedsCorrection => "needs_correction",
        }
    }
}

impl FromStr for AssemblyStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "needs_correction" => Ok(Self::NeedsCorrection),
            _ => Err(format!("Invalid assembly status: {}", s)),
        }
    }
}

fn parse_field<T: FromStr>(field: &'static str, value: &str) -> Result<T, UnknownValue> {
    value.trim().parse::<T>().map_err(|_| UnknownValue {
        field,
        value: value.to_string(),
    })
}

pub fn parse_status(value: &str) -> Result<OrderStatus, UnknownValue> {
    parse_field("status", value)
}

pub fn parse_stage(value: &str) -> Result<OrderStage, UnknownValue> {
    parse_field("stage", value)
}

pub fn parse_page_item_status(value: &str) -> Result<PageItemStatus, UnknownValue> {
    parse_field("page item status", value)
}

pub fn parse_character_sheet_status(value: &str) -> Result<CharacterSheetStatus, UnknownValue> {
    parse_field("character sheet status", value)
}

pub fn parse_assembly_status(value: &str) -> Result<AssemblyStatus, UnknownValue> {
    parse_field("assembly status", value)
}
