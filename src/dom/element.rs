use crate::dom::snapshot::normalize_whitespace;
use crate::dom::DomSnapshot;
use scraper::ElementRef;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Which rule of the locator produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStrategy {
    Id,
    Name,
    Text,
    Value,
}

/// An owned copy of a located element, detached from the parsed tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementHandle {
    pub tag_name: String,
    pub element_id: Option<String>,
    pub name: Option<String>,
    pub text_content: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub form_index: Option<usize>,
    pub matched_by: MatchStrategy,
}

impl ElementHandle {
    pub fn from_element(
        snapshot: &DomSnapshot,
        element: &ElementRef<'_>,
        matched_by: MatchStrategy,
    ) -> Self {
        let value = element.value();
        let attributes: BTreeMap<String, String> = value
            .attrs()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        let text = normalize_whitespace(&element.text().collect::<String>());

        Self {
            tag_name: value.name().to_string(),
            element_id: attributes.get("id").cloned(),
            name: attributes.get("name").cloned(),
            text_content: if text.is_empty() { None } else { Some(text) },
            attributes,
            form_index: snapshot.enclosing_form(element),
            matched_by,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn href(&self) -> Option<&str> {
        self.attr("href")
    }

    pub fn input_type(&self) -> Option<String> {
        self.attr("type").map(|t| t.to_ascii_lowercase())
    }

    pub fn is_checkbox(&self) -> bool {
        self.tag_name == "input" && self.input_type().as_deref() == Some("checkbox")
    }

    /// An XPath expression that finds this element again in a live page.
    ///
    /// Scoped to the enclosing form and keyed on the attribute, or visible
    /// text, that the locator matched.
    pub fn xpath(&self) -> String {
        let scope = match self.form_index {
            Some(index) => format!("(//form)[{}]//", index + 1),
            None => "//".to_string(),
        };

        let predicate = match self.matched_by {
            MatchStrategy::Id => self
                .element_id
                .as_deref()
                .map(|id| format!("@id={}", xpath_literal(id))),
            MatchStrategy::Name => self
                .name
                .as_deref()
                .map(|name| format!("@name={}", xpath_literal(name))),
            MatchStrategy::Value => self
                .attr("value")
                .map(|value| format!("@value={}", xpath_literal(value))),
            MatchStrategy::Text => self
                .text_content
                .as_deref()
                .map(|text| format!("normalize-space()={}", xpath_literal(text))),
        };

        match predicate {
            Some(predicate) => format!("({}{}[{}])[1]", scope, self.tag_name, predicate),
            None => format!("({}{})[1]", scope, self.tag_name),
        }
    }
}

/// Quote `value` as an XPath 1.0 string literal. XPath has no escapes, so a
/// value holding both quote kinds is spliced together with `concat()`.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }

    let parts: Vec<String> = value
        .split('\'')
        .map(|part| format!("'{}'", part))
        .collect();
    format!("concat({})", parts.join(", \"'\", "))
}

pub fn escape_css_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
