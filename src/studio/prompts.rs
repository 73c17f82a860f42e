//! Prompt text for the image generation services.

use automata_common::{Attachment, StoryPage};
use rand::Rng;

/// Character sheet prompt with `[PLACEHOLDER]` slots filled at order intake.
pub const CHARACTER_SHEET_TEMPLATE: &str = "A flat 2D character sheet of a 4-year-old child named [CHILD_NAME] in a clean, modern illustration style. \
The character has [SKIN_TONE] skin, soft slightly long [HAIR_COLOR] hair and wide [EYE_COLOR] eyes. \
The sheet shows several facial expressions in one image: happy, surprised, sad, angry and neutral, each clearly separated in a grid. \
Flat colors without shading, similar to modern educational illustrations. \
The character wears a simple red and blue superhero costume without logos. \
White or light gray background. --cref [UPLOADED_PHOTO_URL] --cw 100";

/// Value used for traits nobody has described yet.
const UNKNOWN_TRAIT: &str = "default";
/// Name used when the order has no usable customer name.
const FALLBACK_NAME: &str = "Character";
/// Characters of page text quoted in an initial illustration prompt.
const PROMPT_EXCERPT_CHARS: usize = 30;

const REGENERATION_STYLES: [&str; 2] = ["Pixar", "Claymation"];
const REGENERATION_ASPECTS: [&str; 2] = ["--ar 3:2", "--ar 1:1"];

/// First attachment whose name (or URL) looks like an image.
pub fn reference_photo(attachments: &[Attachment]) -> Option<&Attachment> {
    attachments.iter().find(|a| is_image(&a.name) || is_image(&a.url))
}

fn is_image(path: &str) -> bool {
    mime_guess::from_path(path)
        .first()
        .is_some_and(|m| m.type_() == mime_guess::mime::IMAGE)
}

/// Fill the character sheet template for a new order.
pub fn character_sheet_prompt(child_name: &str, photo_url: Option<&str>) -> String {
    let name = child_name.trim();
    let name = if name.is_empty() { FALLBACK_NAME } else { name };
    CHARACTER_SHEET_TEMPLATE
        .replace("[CHILD_NAME]", name)
        .replace("[SKIN_TONE]", UNKNOWN_TRAIT)
        .replace("[HAIR_COLOR]", UNKNOWN_TRAIT)
        .replace("[EYE_COLOR]", UNKNOWN_TRAIT)
        .replace("[UPLOADED_PHOTO_URL]", photo_url.unwrap_or_default())
}

/// Prompt synthesized for a page when its text is accepted.
pub fn initial_illustration_prompt(page: &StoryPage, character_sheet_url: Option<&str>) -> String {
    let excerpt: String = page.text.chars().take(PROMPT_EXCERPT_CHARS).collect();
    format!(
        "Illustration for \"{}...\", style: simple cartoon --v 6 --cref {}",
        excerpt.trim(),
        character_sheet_url.unwrap_or_default()
    )
}

/// Prompt produced by a prompt re-roll: random style, aspect ratio and chaos.
pub fn regenerated_illustration_prompt<R: Rng>(
    page_number: u32,
    character_sheet_url: Option<&str>,
    rng: &mut R,
) -> String {
    let style = REGENERATION_STYLES[rng.gen_range(0..REGENERATION_STYLES.len())];
    let aspect = REGENERATION_ASPECTS[rng.gen_range(0..REGENERATION_ASPECTS.len())];
    let chaos: u32 = rng.gen_range(0..50);
    format!(
        "Storybook illustration for page {}, cinematic lighting, {} style {} --chaos {} --cref {}",
        page_number,
        style,
        aspect,
        chaos,
        character_sheet_url.unwrap_or_default()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use automata_common::PageItemStatus;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_reference_photo_picks_first_image() {
        let attachments = vec![
            Attachment::new("notes.pdf", "https://files/notes.pdf"),
            Attachment::new("Mia.JPG", "https://files/mia.jpg"),
            Attachment::new("second.png", "https://files/second.png"),
        ];
        let photo = reference_photo(&attachments).unwrap();
        assert_eq!(photo.url, "https://files/mia.jpg");
    }

    #[test]
    fn test_reference_photo_none_without_images() {
        let attachments = vec![Attachment::new("brief.docx", "https://files/brief.docx")];
        assert!(reference_photo(&attachments).is_none());
    }

    #[test]
    fn test_character_sheet_prompt_fills_every_placeholder() {
        let prompt = character_sheet_prompt("Mia", Some("https://files/mia.jpg"));
        assert!(prompt.contains("named Mia"));
        assert!(prompt.contains("--cref https://files/mia.jpg"));
        assert!(!prompt.contains('['));
    }

    #[test]
    fn test_character_sheet_prompt_falls_back_to_generic_name() {
        let prompt = character_sheet_prompt("   ", None);
        assert!(prompt.contains("named Character"));
        assert!(prompt.contains("--cref  --cw 100"));
    }

    #[test]
    fn test_initial_prompt_quotes_page_text_and_sheet() {
        let page = StoryPage::blank(1).with_text(
            "Mia found a tiny dragon sleeping in her teacup one morning.",
            PageItemStatus::Accepted,
        );
        let prompt = initial_illustration_prompt(&page, Some("https://img/sheet.png"));
        assert!(prompt.starts_with("Illustration for \"Mia found a tiny dragon sleepi..."));
        assert!(prompt.ends_with("--cref https://img/sheet.png"));
    }

    #[test]
    fn test_initial_prompt_handles_multibyte_text() {
        let page = StoryPage::blank(1).with_text("ü".repeat(40), PageItemStatus::Accepted);
        let prompt = initial_illustration_prompt(&page, None);
        assert!(prompt.contains(&"ü".repeat(30)));
    }

    #[test]
    fn test_regenerated_prompt_varies_within_known_options() {
        let mut rng = StdRng::seed_from_u64(7);
        let prompt = regenerated_illustration_prompt(4, Some("https://img/sheet.png"), &mut rng);
        assert!(prompt.contains("page 4"));
        assert!(prompt.contains("Pixar") || prompt.contains("Claymation"));
        assert!(prompt.contains("--ar 3:2") || prompt.contains("--ar 1:1"));
        assert!(prompt.contains("--chaos "));
        assert!(prompt.ends_with("--cref https://img/sheet.png"));
    }
}
