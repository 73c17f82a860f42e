//! Sample orders, one at every point of the pipeline.
//!
//! Used by the CLI (`automata orders`, `automata show`) and by tests that
//! need an order in a particular stage.

use automata_common::{
    AssemblyStatus, Attachment, CharacterSheet, CharacterSheetStatus, DeliveryInfo, FinalStory,
    Order, OrderStage, OrderStatus, PageItemStatus, StoryPage, Timestamp,
};
use chrono::Duration;

use super::prompts;

const SAMPLE_ASSETS: &str = "https://assets.automata.local/samples";

/// A fresh in-progress order at the character sheet stage, with no sheet yet.
pub fn blank_order(id: &str) -> Order {
    let now = automata_common::now();
    Order {
        id: id.to_string(),
        customer_name: "Mia Rivera".to_string(),
        email: "mia.family@example.com".to_string(),
        order_summary: "Mia and her cat sail a paper boat to the moon.".to_string(),
        story_type: Some("Adventure".to_string()),
        language: None,
        special_requests: None,
        status: OrderStatus::InProgress,
        stage: OrderStage::CharacterSheetGeneration,
        created_at: now,
        updated_at: now,
        attachments: Vec::new(),
        character_sheet: None,
        story_pages: Vec::new(),
        final_story: None,
        delivery_info: None,
    }
}

fn asset(path: &str) -> String {
    format!("{}/{}", SAMPLE_ASSETS, path)
}

fn sample(
    id: &str,
    customer_name: &str,
    order_summary: &str,
    stage: OrderStage,
    created_at: Timestamp,
) -> Order {
    let photo = Attachment::new(
        format!("{}_photo.jpg", id),
        asset(&format!("{}/photo.jpg", id)),
    );
    let mut order = blank_order(id);
    order.customer_name = customer_name.to_string();
    order.email = format!("{}@example.com", id);
    order.order_summary = order_summary.to_string();
    order.stage = stage;
    order.created_at = created_at;
    order.updated_at = created_at;
    order.character_sheet = Some(CharacterSheet::new(prompts::character_sheet_prompt(
        customer_name,
        Some(&photo.url),
    )));
    order.attachments = vec![photo, Attachment::new("briefing_notes.pdf", asset("notes.pdf"))];
    order
}

fn accept_sheet(order: &mut Order) {
    if let Some(sheet) = order.character_sheet.as_mut() {
        sheet.status = CharacterSheetStatus::Accepted;
        sheet.image_url = Some(asset(&format!("{}/sheet.png", order.id)));
    }
}

fn written_page(number: u32, text: &str, status: PageItemStatus) -> StoryPage {
    StoryPage::blank(number).with_text(text, status)
}

fn prompted_page(number: u32, text: &str, prompt: &str) -> StoryPage {
    let mut page = written_page(number, text, PageItemStatus::Accepted);
    page.prompt = Some(prompt.to_string());
    page.prompt_status = PageItemStatus::Accepted;
    page
}

fn illustrated_page(order_id: &str, number: u32, text: &str, prompt: &str, accepted: bool) -> StoryPage {
    let mut page = prompted_page(number, text, prompt);
    page.attach_illustration(asset(&format!("{}/page-{}.png", order_id, number)));
    if accepted {
        page.image_status = PageItemStatus::Accepted;
    }
    page
}

/// Sample orders, newest first.
pub fn sample_orders(now: Timestamp) -> Vec<Order> {
    let at = |hours: i64| now - Duration::hours(hours);
    let mut orders = Vec::new();

    orders.push(sample(
        "sample-001",
        "Alice Hart",
        "A curious tea party where every cup tells a joke",
        OrderStage::CharacterSheetGeneration,
        at(1),
    ));

    let mut zayed = sample(
        "sample-002",
        "Zayed Khan",
        "Zayed becomes a superhero who helps lost kites home",
        OrderStage::StoryContentGeneration,
        at(2),
    );
    accept_sheet(&mut zayed);
    zayed.story_pages = (1..=5).map(StoryPage::blank).collect();
    orders.push(zayed);

    let mut timothy = sample(
        "sample-003",
        "Timothy Brook",
        "A brave mouse saves a kingdom from a very sleepy dragon",
        OrderStage::StoryContentGeneration,
        at(3),
    );
    accept_sheet(&mut timothy);
    timothy.story_pages = vec![
        written_page(1, "Timothy the mouse lived under the castle kitchen.", PageItemStatus::Accepted),
        written_page(2, "One day the whole kingdom fell quiet: the dragon was snoring.", PageItemStatus::Pending),
        StoryPage::blank(3),
    ];
    orders.push(timothy);

    let mut bob = sample(
        "sample-004",
        "Bob Hammer",
        "Building a bridge with a team of talking tools",
        OrderStage::VisualContentGeneration,
        at(4),
    );
    accept_sheet(&mut bob);
    bob.story_pages = vec![
        prompted_page(1, "Bob opened his toolbox and the hammer said hello.", "Cheerful builder greeting a talking hammer, workshop, cartoon style --ar 16:9"),
        prompted_page(2, "Together they measured the river twice.", "Builder and talking tape measure at a river bank, sunny, cartoon style --ar 16:9"),
    ];
    orders.push(bob);

    let mut reginald = sample(
        "sample-005",
        "Reginald Knight",
        "A knight's quest through an enchanted forest",
        OrderStage::VisualContentGeneration,
        at(5),
    );
    accept_sheet(&mut reginald);
    let mut first = prompted_page(1, "A knight rode through a dark forest.", "Knight on horseback in an enchanted forest, moonlight, oil painting --ar 16:9");
    first.attach_composite(asset("sample-005/page-1-composite.png"));
    let mut second = prompted_page(2, "He met a grumpy troll under a bridge.", "Knight facing a grumpy troll under a stone bridge, fantasy art --v 6");
    second.attach_composite(asset("sample-005/page-2-composite.png"));
    reginald.story_pages = vec![first, second];
    orders.push(reginald);

    let mut iris = sample(
        "sample-006",
        "Iris Vale",
        "A garden where flowers sing at sunrise",
        OrderStage::VisualContentGeneration,
        at(6),
    );
    accept_sheet(&mut iris);
    iris.story_pages = vec![
        illustrated_page("sample-006", 1, "Iris tiptoed into the garden before dawn.", "Girl tiptoeing into a misty garden at dawn, watercolor", true),
        illustrated_page("sample-006", 2, "The tulips cleared their throats and began to sing.", "Singing tulips in morning light, watercolor", false),
    ];
    orders.push(iris);

    let mut robbie = sample(
        "sample-007",
        "Robbie Bolt",
        "A friendly robot explores a colourful planet",
        OrderStage::FinalReview,
        at(7),
    );
    accept_sheet(&mut robbie);
    robbie.story_pages = vec![
        illustrated_page("sample-007", 1, "A small robot landed on a vibrant planet.", "Cute robot exploring a colourful alien planet, cartoon --ar 16:9", true),
        illustrated_page("sample-007", 2, "It befriended a shy, fluffy creature.", "Robot befriending a fluffy alien, pastel colours --v 6", true),
    ];
    robbie.final_story = Some(FinalStory::assembled(asset("sample-007/story.pdf")));
    orders.push(robbie);

    let mut charlie = sample(
        "sample-008",
        "Charlie Quill",
        "A silent film star and the banana peel of destiny",
        OrderStage::Completed,
        at(8),
    );
    charlie.status = OrderStatus::Completed;
    accept_sheet(&mut charlie);
    charlie.story_pages = vec![illustrated_page("sample-008", 1, "Charlie tipped his hat to the crowd.", "Silent film comedian tipping his hat, black and white still", true)];
    charlie.final_story = Some(FinalStory {
        pdf_url: Some(asset("sample-008/story.pdf")),
        assembly_status: AssemblyStatus::Approved,
    });
    orders.push(charlie);

    let mut dave = sample(
        "sample-009",
        "Dave Post",
        "The most punctual postman in town",
        OrderStage::Delivered,
        at(9),
    );
    dave.status = OrderStatus::Delivered;
    accept_sheet(&mut dave);
    dave.story_pages = vec![illustrated_page("sample-009", 1, "Dave was never late, not even once.", "Postman on a bicycle at sunrise, storybook style", true)];
    let pdf = asset("sample-009/story.pdf");
    dave.final_story = Some(FinalStory {
        pdf_url: Some(pdf.clone()),
        assembly_status: AssemblyStatus::Approved,
    });
    dave.delivery_info = Some(DeliveryInfo {
        method: "email".to_string(),
        delivered_at: at(8),
        download_link: Some(pdf),
    });
    orders.push(dave);

    let mut diana = sample(
        "sample-010",
        "Diana Reyes",
        "A tale of heroism that went delightfully wrong",
        OrderStage::Failed,
        at(10),
    );
    diana.status = OrderStatus::Failed;
    orders.push(diana);

    orders
}

#[cfg(test)]
mod tests {
    use super::*;
    use automata_common::check_page_sequence;

    #[test]
    fn test_samples_cover_every_reachable_stage() {
        let orders = sample_orders(automata_common::now());
        for stage in [
            OrderStage::CharacterSheetGeneration,
            OrderStage::StoryContentGeneration,
            OrderStage::VisualContentGeneration,
            OrderStage::FinalReview,
            OrderStage::Completed,
            OrderStage::Delivered,
            OrderStage::Failed,
        ] {
            assert!(orders.iter().any(|o| o.stage == stage), "missing {}", stage);
        }
    }

    #[test]
    fn test_samples_hold_page_invariants() {
        for order in sample_orders(automata_common::now()) {
            check_page_sequence(&order.story_pages)
                .unwrap_or_else(|e| panic!("{}: {}", order.id, e));
        }
    }

    #[test]
    fn test_samples_have_unique_ids_newest_first() {
        let orders = sample_orders(automata_common::now());
        let mut ids: Vec<&str> = orders.iter().map(|o| o.id.as_str()).collect();
        ids.dedup();
        assert_eq!(ids.len(), orders.len());
        assert!(orders.windows(2).all(|w| w[0].created_at > w[1].created_at));
    }

    #[test]
    fn test_final_review_sample_is_ready_for_decision() {
        let orders = sample_orders(automata_common::now());
        let review = orders
            .iter()
            .find(|o| o.stage == OrderStage::FinalReview)
            .unwrap();
        assert!(review.all_visuals_accepted());
        assert!(review.final_story.as_ref().unwrap().deliverable_pdf().is_some());
    }

    #[test]
    fn test_blank_order_starts_at_character_sheet() {
        let order = blank_order("ord-1");
        assert_eq!(order.stage, OrderStage::CharacterSheetGeneration);
        assert_eq!(order.status, OrderStatus::InProgress);
        assert!(order.story_pages.is_empty());
    }
}
