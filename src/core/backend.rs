use crate::browser::DispatchSession;
use crate::dom::FormDescriptor;
use crate::errors::{EmulatorError, Result};
use crate::types::{BackendKind, FormData, PageState, Payload};
use async_trait::async_trait;
use http::Method;
use url::Url;

/// Borrowed access to whatever session a backend keeps open.
pub enum SessionHandle<'a> {
    Http(&'a reqwest::Client),
    InProcess(&'a mut DispatchSession),
    Remote(&'a fantoccini::Client),
}

/// One concrete execution model for the emulator.
///
/// Every call runs to completion before returning; the emulator never issues
/// two calls at once against the same backend.
#[async_trait]
pub trait Backend: Send {
    fn kind(&self) -> BackendKind;

    /// Base URL used when the configuration does not name one.
    fn default_base_url(&self) -> &str {
        crate::core::config::DEFAULT_BASE_URL
    }

    /// Whether the session has been opened yet.
    fn has_session(&self) -> bool {
        false
    }

    /// The session, opened on first use and reused until `close`.
    async fn current_session(&mut self) -> Result<SessionHandle<'_>> {
        Err(EmulatorError::NotSupported("current_session".into()))
    }

    /// Issue one request and report the resulting page.
    async fn navigate(
        &mut self,
        method: Method,
        url: &Url,
        payload: Option<&Payload>,
    ) -> Result<PageState>;

    /// Submit a resolved form. `staged` holds the inputs consumed for this submission.
    async fn submit(&mut self, form: &FormDescriptor, staged: &FormData) -> Result<PageState> {
        let _ = staged;
        let payload = form.payload();
        self.navigate(form.method.clone(), &form.action, Some(&payload))
            .await
    }

    /// Re-read the live page, for backends whose page can change without a navigation.
    async fn refresh(&mut self) -> Result<Option<PageState>> {
        Ok(None)
    }

    async fn alert_text(&mut self) -> Result<String> {
        Err(EmulatorError::NotSupported("alert_text".into()))
    }

    async fn accept_alert(&mut self) -> Result<()> {
        Err(EmulatorError::NotSupported("accept_alert".into()))
    }

    /// PNG bytes of the current viewport.
    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        Err(EmulatorError::NotSupported("screenshot".into()))
    }

    /// Release the session. Called once at teardown.
    async fn close(&mut self) -> Result<()>;
}
