use crate::core::{Backend, SessionHandle};
use crate::errors::{EmulatorError, Result};
use crate::types::{with_query, BackendKind, PageState, Payload};
use async_trait::async_trait;
use http::header::LOCATION;
use http::Method;
use reqwest::multipart::{Form, Part};
use reqwest::redirect::Policy;
use reqwest::Client;
use tracing::info;
use url::Url;

/// Stateless HTTP backend: one outbound request per navigation.
///
/// Redirects are not followed; a 3xx comes back as the page and the
/// emulator decides whether to visit its `Location`.
#[derive(Default)]
pub struct StatelessCrawler {
    client: Option<Client>,
}

impl StatelessCrawler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The HTTP client, created on first use. Cookies persist for its lifetime.
    pub fn session(&mut self) -> Result<&Client> {
        if self.client.is_none() {
            let client = Client::builder()
                .cookie_store(true)
                .redirect(Policy::none())
                .build()
                .map_err(|e| EmulatorError::NavigationFailed(e.to_string()))?;
            self.client = Some(client);
        }

        self.client
            .as_ref()
            .ok_or_else(|| EmulatorError::NavigationFailed("HTTP client unavailable".into()))
    }
}

/// A multipart form holding the payload's fields and the bytes of its attached files.
pub(crate) async fn multipart_form(payload: &Payload) -> Result<Form> {
    let mut form = Form::new();
    for (name, value) in &payload.fields {
        form = form.text(name.clone(), value.clone());
    }
    for (name, path) in &payload.files {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.clone());
        form = form.part(name.clone(), Part::bytes(bytes).file_name(file_name));
    }
    Ok(form)
}

#[async_trait]
impl Backend for StatelessCrawler {
    fn kind(&self) -> BackendKind {
        BackendKind::StatelessCrawler
    }

    fn has_session(&self) -> bool {
        self.client.is_some()
    }

    async fn current_session(&mut self) -> Result<SessionHandle<'_>> {
        Ok(SessionHandle::Http(self.session()?))
    }

    async fn navigate(
        &mut self,
        method: Method,
        url: &Url,
        payload: Option<&Payload>,
    ) -> Result<PageState> {
        let client = self.session()?.clone();
        info!("{} {}", method, url);

        let mut request = match payload {
            Some(payload) if method == Method::GET => {
                client.get(with_query(url, &payload.fields))
            }
            Some(payload) if !payload.files.is_empty() => client
                .request(method, url.clone())
                .multipart(multipart_form(payload).await?),
            Some(payload) if !payload.fields.is_empty() => {
                client.request(method, url.clone()).form(&payload.fields)
            }
            _ => client.request(method, url.clone()),
        };

        if let Some(payload) = payload {
            request = request.headers(payload.headers.clone());
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmulatorError::NavigationFailed(e.to_string()))?;

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| final_url.join(value).ok());
        let body = response
            .text()
            .await
            .map_err(|e| EmulatorError::NavigationFailed(e.to_string()))?;

        Ok(PageState::new(final_url, status, body).with_location(location))
    }

    async fn close(&mut self) -> Result<()> {
        self.client = None;
        Ok(())
    }
}
