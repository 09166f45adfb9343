use crate::dom::snapshot::normalize_whitespace;
use crate::dom::{DomSnapshot, ElementHandle, MatchStrategy};
use crate::errors::{EmulatorError, Result};
use scraper::ElementRef;

/// What the caller is looking for; decides the candidate elements and rule order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    /// Any element, by id then name.
    Field,
    /// An anchor, by visible text then id then name.
    Link,
    /// A submit control, by id, name, value then visible text.
    Button,
}

impl LookupKind {
    fn candidates(self) -> &'static str {
        match self {
            LookupKind::Field => "*",
            LookupKind::Link => "a",
            LookupKind::Button => {
                "button, input[type=submit], input[type=button], input[type=image]"
            }
        }
    }

    fn strategies(self) -> &'static [MatchStrategy] {
        match self {
            LookupKind::Field => &[MatchStrategy::Id, MatchStrategy::Name],
            LookupKind::Link => &[MatchStrategy::Text, MatchStrategy::Id, MatchStrategy::Name],
            LookupKind::Button => &[
                MatchStrategy::Id,
                MatchStrategy::Name,
                MatchStrategy::Value,
                MatchStrategy::Text,
            ],
        }
    }
}

/// Resolves user-given names into elements of a snapshot.
pub struct ElementLocator;

impl ElementLocator {
    /// Strip a leading `#` so CSS-id-style and bare keys are interchangeable.
    pub fn normalize_key(key: &str) -> &str {
        key.strip_prefix('#').unwrap_or(key)
    }

    pub fn locate(snapshot: &DomSnapshot, key: &str, kind: LookupKind) -> Result<ElementHandle> {
        Self::find(snapshot, key, kind).ok_or_else(|| EmulatorError::ElementNotFound {
            key: key.to_string(),
            url: snapshot.url().to_string(),
        })
    }

    pub fn find(snapshot: &DomSnapshot, key: &str, kind: LookupKind) -> Option<ElementHandle> {
        let candidates = snapshot.select(kind.candidates());
        let attribute_key = Self::normalize_key(key);
        let text_key = normalize_whitespace(key);

        kind.strategies().iter().find_map(|strategy| {
            candidates
                .iter()
                .find(|element| Self::matches(element, *strategy, attribute_key, &text_key))
                .map(|element| ElementHandle::from_element(snapshot, element, *strategy))
        })
    }

    fn matches(
        element: &ElementRef<'_>,
        strategy: MatchStrategy,
        attribute_key: &str,
        text_key: &str,
    ) -> bool {
        let value = element.value();
        match strategy {
            MatchStrategy::Id => value.attr("id") == Some(attribute_key),
            MatchStrategy::Name => value.attr("name") == Some(attribute_key),
            MatchStrategy::Value => value.attr("value") == Some(text_key),
            MatchStrategy::Text => {
                !text_key.is_empty()
                    && normalize_whitespace(&element.text().collect::<String>()) == text_key
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use url::Url;

    const PAGE: &str = r#"
        <html><body>
            <a href="/about" id="about-link">About   Us</a>
            <a href="/contact" name="contact">Get in touch</a>
            <form action="/login" method="post">
                <input type="text" id="username" name="user">
                <input type="password" name="password">
                <input type="submit" value="Log In">
            </form>
            <form action="/search">
                <button type="submit" name="go">Search now</button>
            </form>
        </body></html>
    "#;

    fn snapshot() -> DomSnapshot {
        DomSnapshot::parse(PAGE, Url::parse("http://localhost/login").unwrap())
    }

    #[test]
    fn test_field_by_id_and_name() {
        let dom = snapshot();

        let by_id = ElementLocator::locate(&dom, "#username", LookupKind::Field).unwrap();
        assert_eq!(by_id.matched_by, MatchStrategy::Id);
        assert_eq!(by_id.name.as_deref(), Some("user"));

        let by_name = ElementLocator::locate(&dom, "password", LookupKind::Field).unwrap();
        assert_eq!(by_name.matched_by, MatchStrategy::Name);
        assert_eq!(by_name.form_index, Some(0));
    }

    #[test]
    fn test_link_by_text_then_attributes() {
        let dom = snapshot();

        let by_text = ElementLocator::locate(&dom, "About Us", LookupKind::Link).unwrap();
        assert_eq!(by_text.href(), Some("/about"));
        assert_eq!(by_text.matched_by, MatchStrategy::Text);

        let by_name = ElementLocator::locate(&dom, "contact", LookupKind::Link).unwrap();
        assert_eq!(by_name.href(), Some("/contact"));

        let by_id = ElementLocator::locate(&dom, "#about-link", LookupKind::Link).unwrap();
        assert_eq!(by_id.matched_by, MatchStrategy::Id);
    }

    #[test]
    fn test_link_text_is_case_sensitive() {
        let dom = snapshot();
        assert!(ElementLocator::find(&dom, "about us", LookupKind::Link).is_none());
    }

    #[test]
    fn test_button_by_value_and_text() {
        let dom = snapshot();

        let by_value = ElementLocator::locate(&dom, "Log In", LookupKind::Button).unwrap();
        assert_eq!(by_value.matched_by, MatchStrategy::Value);
        assert_eq!(by_value.form_index, Some(0));

        let by_text = ElementLocator::locate(&dom, "Search now", LookupKind::Button).unwrap();
        assert_eq!(by_text.matched_by, MatchStrategy::Text);
        assert_eq!(by_text.form_index, Some(1));
    }

    #[test]
    fn test_missing_element_reports_key_and_url() {
        let dom = snapshot();
        match ElementLocator::locate(&dom, "Nonexistent Link", LookupKind::Link) {
            Err(EmulatorError::ElementNotFound { key, url }) => {
                assert_eq!(key, "Nonexistent Link");
                assert_eq!(url, "http://localhost/login");
            }
            other => panic!("expected ElementNotFound, got {:?}", other),
        }
    }

    proptest! {
        #[test]
        fn prop_locate_is_pure(key in "#?[a-zA-Z ]{0,12}") {
            let dom = snapshot();
            for kind in [LookupKind::Field, LookupKind::Link, LookupKind::Button] {
                let first = ElementLocator::find(&dom, &key, kind);
                let second = ElementLocator::find(&dom, &key, kind);
                prop_assert_eq!(first, second);
            }
        }
    }
}
