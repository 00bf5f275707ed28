//! Prompt assembly: rules + grouped knowledge + user message → chat
//! messages.
//!
//! [`assemble`] is pure: the same inputs always render the same bytes.
//!
//! # Layout
//!
//! ```text
//! system: <rules prompt, verbatim>
//! user:   MENU:
//!         <chunk>
//!         <chunk>
//!
//!         HOURS:
//!         No relevant data found.
//!
//!         User message:
//!         <user text, verbatim>
//! ```

use serde::{Deserialize, Serialize};

use crate::models::{GroupedChunks, Section};

/// Placeholder rendered for a section with no retrieved chunks.
pub const NO_DATA_PLACEHOLDER: &str = "No relevant data found.";

const USER_MESSAGE_LABEL: &str = "User message:";

const RESTAURANT_SECTIONS: &[Section] = &[
    Section::Menu,
    Section::Offers,
    Section::Hours,
    Section::Faqs,
    Section::Policies,
    Section::Other,
];

const REAL_ESTATE_SECTIONS: &[Section] = &[
    Section::Listings,
    Section::PaymentPlans,
    Section::Offers,
    Section::Faqs,
    Section::Policies,
    Section::Hours,
    Section::Other,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// One message of a chat-completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

/// Section rendering order for a bot variant.
///
/// Real-estate variants lead with listings and payment plans; every other
/// variant uses the restaurant order.
pub fn sections_order_for(bot_type: &str) -> &'static [Section] {
    match bot_type.trim().to_ascii_lowercase().as_str() {
        "realestate" | "real_estate" | "real-estate" => REAL_ESTATE_SECTIONS,
        _ => RESTAURANT_SECTIONS,
    }
}

/// Render the knowledge block: one header per section in `order`, followed
/// by its chunks or [`NO_DATA_PLACEHOLDER`]. Sections are separated by a
/// blank line.
pub fn render_data_block(grouped: &GroupedChunks, order: &[Section]) -> String {
    order
        .iter()
        .map(|section| {
            let body = match grouped.get(section) {
                Some(texts) if !texts.is_empty() => texts.join("\n"),
                _ => NO_DATA_PLACEHOLDER.to_string(),
            };
            format!("{}:\n{}", section.header(), body)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Build the exact message list handed to the completion service.
///
/// Always returns two messages: the system rules, then the user turn
/// carrying the data block and `user_text`.
pub fn assemble(
    rules_prompt: &str,
    grouped: &GroupedChunks,
    order: &[Section],
    user_text: &str,
) -> Vec<ChatMessage> {
    let data_block = render_data_block(grouped, order);
    vec![
        ChatMessage {
            role: Role::System,
            content: rules_prompt.to_string(),
        },
        ChatMessage {
            role: Role::User,
            content: format!("{data_block}\n\n{USER_MESSAGE_LABEL}\n{user_text}"),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grouped() -> GroupedChunks {
        let mut g = GroupedChunks::new();
        g.insert(
            Section::Menu,
            vec!["Pizza 10".to_string(), "Pasta 8".to_string()],
        );
        g.insert(Section::Hours, vec!["Mon-Fri 9-5".to_string()]);
        g
    }

    #[test]
    fn test_assemble_layout() {
        let messages = assemble(
            "You are a helpful waiter.",
            &grouped(),
            &[Section::Menu, Section::Offers, Section::Hours],
            "Do you have pasta?",
        );

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[0].content, "You are a helpful waiter.");
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(
            messages[1].content,
            "MENU:\nPizza 10\nPasta 8\n\n\
             OFFERS:\nNo relevant data found.\n\n\
             HOURS:\nMon-Fri 9-5\n\n\
             User message:\nDo you have pasta?"
        );
    }

    #[test]
    fn test_assemble_deterministic() {
        let order = sections_order_for("restaurant");
        let a = assemble("rules", &grouped(), order, "hi");
        let b = assemble("rules", &grouped(), order, "hi");
        assert_eq!(a, b);
        assert_eq!(
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_empty_group_renders_placeholder() {
        let mut g = GroupedChunks::new();
        g.insert(Section::Faqs, Vec::new());
        let block = render_data_block(&g, &[Section::Faqs, Section::PaymentPlans]);
        assert_eq!(
            block,
            "FAQS:\nNo relevant data found.\n\nPAYMENTPLANS:\nNo relevant data found."
        );
    }

    #[test]
    fn test_sections_outside_order_are_not_rendered() {
        let block = render_data_block(&grouped(), &[Section::Hours]);
        assert_eq!(block, "HOURS:\nMon-Fri 9-5");
    }

    #[test]
    fn test_user_text_verbatim() {
        let text = "  multi\nline  ";
        let messages = assemble("", &GroupedChunks::new(), &[], text);
        assert_eq!(messages[1].content, format!("\n\nUser message:\n{text}"));
    }

    #[test]
    fn test_sections_order_for_variants() {
        assert_eq!(sections_order_for("Real-Estate")[0], Section::Listings);
        assert_eq!(sections_order_for("realestate")[1], Section::PaymentPlans);
        assert_eq!(sections_order_for("restaurant")[0], Section::Menu);
        assert_eq!(sections_order_for("default"), sections_order_for("restaurant"));
    }

    #[test]
    fn test_roles_serialize_lowercase() {
        let m = ChatMessage {
            role: Role::System,
            content: "x".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&m).unwrap(),
            serde_json::json!({"role": "system", "content": "x"})
        );
    }
}
