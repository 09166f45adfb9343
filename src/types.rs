use crate::dom::DomSnapshot;
use http::HeaderMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use url::Url;

/// The result of one navigation or submission.
///
/// Immutable once a backend has produced it; the emulator holds exactly one
/// of these as the current page.
#[derive(Debug, Clone)]
pub struct PageState {
    pub url: Url,
    pub status: u16,
    pub body: String,
    /// `Location` target of a redirect response, resolved against `url`.
    pub location: Option<Url>,
    pub received_at: chrono::DateTime<chrono::Utc>,
}

impl PageState {
    pub fn new(url: Url, status: u16, body: String) -> Self {
        Self {
            url,
            status,
            body,
            location: None,
            received_at: chrono::Utc::now(),
        }
    }

    pub fn with_location(mut self, location: Option<Url>) -> Self {
        self.location = location;
        self
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status) && self.location.is_some()
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Parse the body into a queryable DOM.
    pub fn dom(&self) -> DomSnapshot {
        DomSnapshot::parse(&self.body, self.url.clone())
    }
}

/// A value staged against a form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Checked(bool),
    Selected { option: String },
    File { path: PathBuf },
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    pub fn selected(option: impl Into<String>) -> Self {
        FieldValue::Selected {
            option: option.into(),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Checked(value)
    }
}

pub type FormData = BTreeMap<String, FieldValue>;

/// Encoded request data handed to a backend.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    pub fields: Vec<(String, String)>,
    pub files: Vec<(String, PathBuf)>,
    /// Extra request headers. Backends without header control reject a non-empty map.
    pub headers: HeaderMap,
}

impl Payload {
    pub fn from_fields<K, V, I>(fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.files.is_empty()
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Which execution model a backend implements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    StatelessCrawler,
    InProcessDispatcher,
    RemoteSession,
}

/// Overwrite the query string of `url` with `fields`, as a browser does for GET forms.
pub fn with_query(url: &Url, fields: &[(String, String)]) -> Url {
    let mut url = url.clone();
    if fields.is_empty() {
        return url;
    }
    url.query_pairs_mut()
        .clear()
        .extend_pairs(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    url
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_requires_location() {
        let url = Url::parse("http://localhost/old").unwrap();
        let bare = PageState::new(url.clone(), 302, String::new());
        assert!(!bare.is_redirect());

        let target = Url::parse("http://localhost/new").unwrap();
        let redirect = PageState::new(url, 302, String::new()).with_location(Some(target));
        assert!(redirect.is_redirect());
        assert!(!redirect.is_ok());
    }

    #[test]
    fn test_with_query_replaces_existing_query() {
        let url = Url::parse("http://localhost/search?page=2").unwrap();
        let url = with_query(&url, &[("q".to_string(), "rust lang".to_string())]);
        assert_eq!(url.as_str(), "http://localhost/search?q=rust+lang");
    }

    #[test]
    fn test_payload_field_lookup() {
        let payload = Payload::from_fields([("username", "alice"), ("password", "secret")]);
        assert_eq!(payload.field("username"), Some("alice"));
        assert_eq!(payload.field("missing"), None);
        assert!(!payload.is_empty());
    }
}
