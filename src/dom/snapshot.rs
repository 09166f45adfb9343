use scraper::{ElementRef, Html, Selector};
use url::Url;

/// A parsed page body, queried by the locator and the form resolver.
///
/// Parsed on demand from a `PageState`; it is not `Send`, so it never
/// outlives the synchronous lookup that created it.
pub struct DomSnapshot {
    document: Html,
    url: Url,
}

impl DomSnapshot {
    pub fn parse(html: &str, url: Url) -> Self {
        Self {
            document: Html::parse_document(html),
            url,
        }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn document(&self) -> &Html {
        &self.document
    }

    /// All elements matching `css`, in document order. An unparsable selector matches nothing.
    pub fn select(&self, css: &str) -> Vec<ElementRef<'_>> {
        match Selector::parse(css) {
            Ok(selector) => self.document.select(&selector).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn forms(&self) -> Vec<ElementRef<'_>> {
        self.select("form")
    }

    /// Index of the form that encloses `element`, if any.
    pub fn enclosing_form(&self, element: &ElementRef<'_>) -> Option<usize> {
        let form = element
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|ancestor| ancestor.value().name() == "form")?;

        self.forms().iter().position(|f| f.id() == form.id())
    }

    pub fn title(&self) -> Option<String> {
        self.select("title")
            .first()
            .map(|t| normalize_whitespace(&t.text().collect::<String>()))
    }
}

/// Collapse runs of whitespace the way a browser renders text.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(html: &str) -> DomSnapshot {
        DomSnapshot::parse(html, Url::parse("http://localhost/page").unwrap())
    }

    #[test]
    fn test_enclosing_form_index() {
        let dom = snapshot(
            r#"<form id="a"><input name="x"></form>
               <form id="b"><div><input name="y"></div></form>
               <input name="z">"#,
        );

        let y = dom.select("input[name=y]");
        assert_eq!(dom.enclosing_form(&y[0]), Some(1));

        let z = dom.select("input[name=z]");
        assert_eq!(dom.enclosing_form(&z[0]), None);
    }

    #[test]
    fn test_invalid_selector_matches_nothing() {
        let dom = snapshot("<p>hello</p>");
        assert!(dom.select("p[").is_empty());
    }

    #[test]
    fn test_title_is_whitespace_normalized() {
        let dom = snapshot("<html><head><title>  Sign\n   in </title></head></html>");
        assert_eq!(dom.title().as_deref(), Some("Sign in"));
    }
}
