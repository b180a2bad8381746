//! Channel announcement text for recorded content.

use crate::content::model::{Content, ContentType};

/// Format the announcement posted after a submit or pass is recorded.
///
/// Uses Slack mrkdwn: the whole block is quoted, the author is mentioned,
/// and each tag is rendered as inline code.
pub fn compose_notification(content: &Content) -> String {
    let description = if content.description.trim().is_empty() {
        String::new()
    } else {
        format!("\n\n💬 '{}'\n", content.description)
    };

    match content.content_type {
        ContentType::Submit => {
            let tags = content.tag_list();
            let tag_line = if tags.is_empty() {
                String::new()
            } else {
                let quoted: Vec<String> = tags.iter().map(|t| format!("`{t}`")).collect();
                format!("\ntag : {}", quoted.join(" "))
            };
            let category = content.category.map(|c| c.label()).unwrap_or_default();
            let link = content.content_url.as_deref().unwrap_or_default();

            format!(
                "\n>>>🎉 *<@{}> submitted.*{description}\ncategory : {category}{tag_line}\nlink : {link}",
                content.user_id
            )
        }
        ContentType::Pass => format!("\n>>>🙏🏼 *<@{}> passed.*{description}", content.user_id),
    }
}
