use crate::core::{Backend, SeleniumConfig, SessionHandle};
use crate::dom::element::escape_css_string;
use crate::dom::FormDescriptor;
use crate::errors::{EmulatorError, Result};
use crate::types::{with_query, BackendKind, FieldValue, FormData, PageState, Payload};
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder, Locator};
use http::Method;
use tracing::{debug, info};
use url::Url;

/// Body text that marks the application's not-found page.
pub const NOT_FOUND_MARKER: &str = "Sorry, the page you are looking for could not be found.";

/// A live browser driven over the WebDriver protocol.
///
/// The browser follows redirects and runs scripts itself; this backend only
/// reads back what it ends up showing.
pub struct RemoteSession {
    host: String,
    browser: String,
    client: Option<Client>,
}

impl RemoteSession {
    pub fn new(config: &SeleniumConfig) -> Self {
        Self {
            host: config.host.clone(),
            browser: config.browser.clone(),
            client: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    /// The WebDriver session, opened on first use.
    pub async fn session(&mut self) -> Result<&Client> {
        if self.client.is_none() {
            info!("Opening {} session at {}", self.browser, self.host);

            let mut capabilities = serde_json::Map::new();
            capabilities.insert(
                "browserName".to_string(),
                serde_json::Value::String(self.browser.clone()),
            );

            let client = ClientBuilder::native()
                .capabilities(capabilities)
                .connect(&self.host)
                .await
                .map_err(|e| {
                    EmulatorError::RemoteSession(format!(
                        "Failed to connect to WebDriver at {}: {}",
                        self.host, e
                    ))
                })?;
            self.client = Some(client);
        }

        self.client
            .as_ref()
            .ok_or_else(|| EmulatorError::RemoteSession("session unavailable".into()))
    }

    /// There is no real status over WebDriver; a known not-found marker counts as a failure.
    pub fn infer_status(body: &str) -> u16 {
        if body
            .to_lowercase()
            .contains(&NOT_FOUND_MARKER.to_lowercase())
        {
            500
        } else {
            200
        }
    }

    async fn read_page(client: &Client) -> Result<PageState> {
        let url = client
            .current_url()
            .await
            .map_err(|e| EmulatorError::RemoteSession(e.to_string()))?;
        let url = Url::parse(url.as_str())?;
        let body = client
            .source()
            .await
            .map_err(|e| EmulatorError::RemoteSession(e.to_string()))?;
        let status = Self::infer_status(&body);

        Ok(PageState::new(url, status, body))
    }

    async fn find_by_name_or_id(client: &Client, key: &str) -> Result<Element> {
        let key = key.strip_prefix('#').unwrap_or(key);
        let escaped = escape_css_string(key);
        let selector = format!("[id='{}'], [name='{}']", escaped, escaped);

        match client.find(Locator::Css(&selector)).await {
            Ok(element) => Ok(element),
            Err(_) => Err(EmulatorError::ElementNotFound {
                key: key.to_string(),
                url: client
                    .current_url()
                    .await
                    .map(|u| u.to_string())
                    .unwrap_or_default(),
            }),
        }
    }

    /// Replay one staged input against the live page.
    async fn apply(client: &Client, key: &str, value: &FieldValue) -> Result<()> {
        let element = Self::find_by_name_or_id(client, key).await?;
        Self::replay(&element, value).await?;
        debug!("Applied {:?} to '{}'", value, key);
        Ok(())
    }

    /// Checkboxes are clicked only when their live state differs from the staged one.
    async fn replay<E: LiveElement>(element: &E, value: &FieldValue) -> Result<()> {
        match value {
            FieldValue::Text(text) => {
                element.clear().await?;
                element.send_keys(text).await
            }
            FieldValue::Checked(wanted) => {
                if element.is_selected().await? != *wanted {
                    element.click().await?;
                }
                Ok(())
            }
            FieldValue::Selected { option } => element.select_by_value(option).await,
            FieldValue::File { path } => element.send_keys(&path.to_string_lossy()).await,
        }
    }
}

/// The element operations needed to replay staged inputs.
#[async_trait]
pub trait LiveElement: Send + Sync {
    async fn clear(&self) -> Result<()>;
    async fn send_keys(&self, text: &str) -> Result<()>;
    async fn is_selected(&self) -> Result<bool>;
    async fn click(&self) -> Result<()>;
    async fn select_by_value(&self, value: &str) -> Result<()>;
}

fn remote_error(e: fantoccini::error::CmdError) -> EmulatorError {
    EmulatorError::RemoteSession(e.to_string())
}

#[async_trait]
impl LiveElement for Element {
    async fn clear(&self) -> Result<()> {
        Element::clear(self).await.map_err(remote_error)
    }

    async fn send_keys(&self, text: &str) -> Result<()> {
        Element::send_keys(self, text).await.map_err(remote_error)
    }

    async fn is_selected(&self) -> Result<bool> {
        Element::is_selected(self).await.map_err(remote_error)
    }

    async fn click(&self) -> Result<()> {
        Element::click(self).await.map_err(remote_error)
    }

    async fn select_by_value(&self, value: &str) -> Result<()> {
        Element::select_by_value(self, value)
            .await
            .map_err(remote_error)
    }
}

#[async_trait]
impl Backend for RemoteSession {
    fn kind(&self) -> BackendKind {
        BackendKind::RemoteSession
    }

    fn has_session(&self) -> bool {
        self.is_connected()
    }

    async fn current_session(&mut self) -> Result<SessionHandle<'_>> {
        Ok(SessionHandle::Remote(self.session().await?))
    }

    async fn navigate(
        &mut self,
        method: Method,
        url: &Url,
        payload: Option<&Payload>,
    ) -> Result<PageState> {
        if method != Method::GET {
            return Err(EmulatorError::NotSupported(format!(
                "{} requests in a remote browser session",
                method
            )));
        }
        if payload.is_some_and(|p| !p.headers.is_empty()) {
            return Err(EmulatorError::NotSupported(
                "custom request headers in a remote browser session".into(),
            ));
        }

        let target = match payload {
            Some(payload) => with_query(url, &payload.fields),
            None => url.clone(),
        };

        let client = self.session().await?;
        info!("Opening {} in the remote browser", target);
        client
            .goto(target.as_str())
            .await
            .map_err(|e| EmulatorError::NavigationFailed(e.to_string()))?;

        Self::read_page(client).await
    }

    /// Inputs are replayed element by element, then the button is clicked in the live page.
    async fn submit(&mut self, form: &FormDescriptor, staged: &FormData) -> Result<PageState> {
        let client = self.session().await?;

        for (key, value) in staged {
            Self::apply(client, key, value).await?;
        }

        match &form.button {
            Some(button) => {
                let xpath = button.xpath();
                debug!("Clicking {}", xpath);
                let element = client
                    .find(Locator::XPath(&xpath))
                    .await
                    .map_err(remote_error)?;
                LiveElement::click(&element).await?;
            }
            None => {
                let xpath = format!("(//form)[{}]", form.form_index + 1);
                let live_form = client
                    .form(Locator::XPath(&xpath))
                    .await
                    .map_err(remote_error)?;
                live_form.submit().await.map_err(remote_error)?;
            }
        }

        Self::read_page(client).await
    }

    async fn refresh(&mut self) -> Result<Option<PageState>> {
        match &self.client {
            Some(client) => Ok(Some(Self::read_page(client).await?)),
            None => Ok(None),
        }
    }

    async fn alert_text(&mut self) -> Result<String> {
        let client = self.session().await?;
        client
            .get_alert_text()
            .await
            .map_err(|e| EmulatorError::RemoteSession(e.to_string()))
    }

    async fn accept_alert(&mut self) -> Result<()> {
        let client = self.session().await?;
        client
            .accept_alert()
            .await
            .map_err(|e| EmulatorError::RemoteSession(e.to_string()))
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        let client = self.session().await?;
        client
            .screenshot()
            .await
            .map_err(|e| EmulatorError::RemoteSession(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            info!("Closing remote browser session");
            client
                .close()
                .await
                .map_err(|e| EmulatorError::RemoteSession(e.to_string()))?;
        }
        Ok(())
    }
}
