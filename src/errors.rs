use thiserror::Error;

#[derive(Error, Debug)]
pub enum EmulatorError {
    #[error("Nothing matched '{key}' by id, name, text or value on {url}")]
    ElementNotFound { key: String, url: String },

    #[error("Couldn't find a form that contains a button with text '{}' on {url}", .button.as_deref().unwrap_or(""))]
    FormNotFound { button: Option<String>, url: String },

    #[error("Found {count} forms on {url}; name the button to press")]
    AmbiguousForm { count: usize, url: String },

    #[error("A request to '{url}' failed. Got a {status} code instead.{}", .detail.as_ref().map(|d| format!("\n\n{}", d)).unwrap_or_default())]
    PageLoadFailure {
        url: String,
        status: u16,
        detail: Option<String>,
    },

    #[error("{0}")]
    AssertionFailure(String),

    #[error("Gave up on '{url}' after {hops} redirects")]
    RedirectLoopDetected { url: String, hops: usize },

    #[error("No page has been loaded yet")]
    NoPageLoaded,

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Remote session error: {0}")]
    RemoteSession(String),

    #[error("Not supported by this backend: {0}")]
    NotSupported(String),

    #[error("The '{0}' method does not exist.")]
    UnknownOperation(String),

    #[error("'{operation}' expects {expected}")]
    InvalidArguments {
        operation: String,
        expected: String,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Hook failed: {0}")]
    Hook(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EmulatorError>;

// Hooks report failures through anyhow
impl From<anyhow::Error> for EmulatorError {
    fn from(err: anyhow::Error) -> Self {
        EmulatorError::Hook(err.to_string())
    }
}

impl From<url::ParseError> for EmulatorError {
    fn from(err: url::ParseError) -> Self {
        EmulatorError::InvalidUrl(err.to_string())
    }
}

impl EmulatorError {
    /// Failures that get the current page body written to the diagnostics log.
    pub fn wants_diagnostics(&self) -> bool {
        matches!(
            self,
            EmulatorError::PageLoadFailure { .. } | EmulatorError::AssertionFailure(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_not_found_mentions_key_and_url() {
        let err = EmulatorError::ElementNotFound {
            key: "Nonexistent Link".to_string(),
            url: "http://localhost/".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("Nonexistent Link"));
        assert!(message.contains("http://localhost/"));
        assert!(!err.wants_diagnostics());
    }

    #[test]
    fn test_page_load_failure_appends_detail() {
        let err = EmulatorError::PageLoadFailure {
            url: "http://localhost/broken".to_string(),
            status: 500,
            detail: Some("ErrorException on /app/routes.php".to_string()),
        };
        let message = err.to_string();
        assert!(message.contains("Got a 500 code instead."));
        assert!(message.ends_with("ErrorException on /app/routes.php"));
        assert!(err.wants_diagnostics());
    }
}
