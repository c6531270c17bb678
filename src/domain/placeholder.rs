//! Placeholder substitution for boost text.
//!
//! Stored text may carry tokens such as `[BLOG_LINK]` that are only
//! resolved at publish time, so a record can be created before its final
//! wording is known.

use super::BoostPayload;

/// Link to the paired content.
pub const BLOG_LINK: &str = "[BLOG_LINK]";
/// Link to the customer's product.
pub const PRODUCT_LINK: &str = "[PRODUCT_LINK]";
/// Title of the paired content.
pub const BLOG_TITLE: &str = "[BLOG_TITLE]";
/// Name of the customer's product.
pub const PRODUCT_NAME: &str = "[PRODUCT_NAME]";

/// Replaces every known placeholder in the payload text.
///
/// Substitution is a single left-to-right pass over the stored text, so a
/// substituted value is never scanned again. Unknown bracketed tokens are
/// left untouched.
#[must_use]
pub fn render(payload: &BoostPayload) -> String {
    let tokens = [
        (BLOG_LINK, payload.content.url.as_str()),
        (PRODUCT_LINK, payload.product.url.as_str()),
        (BLOG_TITLE, payload.content.title.as_str()),
        (PRODUCT_NAME, payload.product.name.as_str()),
    ];

    let mut rendered = String::with_capacity(payload.text.len());
    let mut rest = payload.text.as_str();
    while let Some(open) = rest.find('[') {
        let (before, candidate) = rest.split_at(open);
        rendered.push_str(before);
        match tokens.iter().find(|(token, _)| candidate.starts_with(token)) {
            Some((token, value)) => {
                rendered.push_str(value);
                rest = candidate.get(token.len()..).unwrap_or_default();
            }
            None => {
                rendered.push('[');
                rest = candidate.get(1..).unwrap_or_default();
            }
        }
    }
    rendered.push_str(rest);
    rendered
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::boost_record::fixtures;

    #[test]
    fn substitutes_links() {
        let rendered = render(&fixtures::payload());
        assert_eq!(rendered, "Check out https://b.example/post and https://p.example");
    }

    #[test]
    fn substitutes_every_occurrence_and_names() {
        let mut payload = fixtures::payload();
        payload.text = "[PRODUCT_NAME]: [PRODUCT_LINK] [PRODUCT_LINK] via [BLOG_TITLE]".to_string();
        assert_eq!(
            render(&payload),
            "Acme Widgets: https://p.example https://p.example via Ten widget tips"
        );
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let mut payload = fixtures::payload();
        payload.content.url = "https://b.example/?q=[PRODUCT_LINK]".to_string();
        payload.content.title = "Why [PRODUCT_NAME] matters".to_string();
        payload.text = "[BLOG_TITLE] [BLOG_LINK] [PRODUCT_LINK]".to_string();
        assert_eq!(
            render(&payload),
            "Why [PRODUCT_NAME] matters https://b.example/?q=[PRODUCT_LINK] https://p.example"
        );
    }

    #[test]
    fn stray_brackets_survive() {
        let mut payload = fixtures::payload();
        payload.text = "[[BLOG_LINK] [".to_string();
        assert_eq!(render(&payload), "[https://b.example/post [");
    }

    #[test]
    fn leaves_unknown_tokens() {
        let mut payload = fixtures::payload();
        payload.text = "[HASHTAG] [BLOG_LINK]".to_string();
        assert_eq!(render(&payload), "[HASHTAG] https://b.example/post");
    }
}
