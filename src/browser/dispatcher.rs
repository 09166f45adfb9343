use crate::browser::crawler::multipart_form;
use crate::core::{Backend, SessionHandle};
use crate::errors::{EmulatorError, Result};
use crate::types::{with_query, BackendKind, PageState, Payload};
use async_trait::async_trait;
use axum::body::Body;
use axum::Router;
use http::header::{CONTENT_TYPE, COOKIE, HOST, LOCATION, SET_COOKIE};
use http::{HeaderValue, Method, Request};
use reqwest::cookie::{CookieStore, Jar};
use std::sync::Arc;
use tower::ServiceExt;
use tracing::{debug, info};
use url::Url;

pub const IN_PROCESS_BASE_URL: &str = "http://localhost";

pub type AppFactory = Arc<dyn Fn() -> Router + Send + Sync>;

/// Dispatches requests straight into the application under test, without a network hop.
pub struct InProcessDispatcher {
    factory: AppFactory,
    session: Option<DispatchSession>,
    method_spoofing: bool,
    max_redirects: usize,
}

/// The application instance plus the cookies it has handed out.
pub struct DispatchSession {
    app: Router,
    cookies: Arc<Jar>,
}

impl InProcessDispatcher {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> Router + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(factory),
            session: None,
            method_spoofing: true,
            max_redirects: 10,
        }
    }

    pub fn from_router(router: Router) -> Self {
        Self::new(move || router.clone())
    }

    /// Honour a `_method` form field on POST requests.
    pub fn with_method_spoofing(mut self, enabled: bool) -> Self {
        self.method_spoofing = enabled;
        self
    }

    pub fn with_max_redirects(mut self, max_redirects: usize) -> Self {
        self.max_redirects = max_redirects;
        self
    }

    /// The application instance, built by the factory on first use.
    pub fn session(&mut self) -> &mut DispatchSession {
        let factory = &self.factory;
        self.session.get_or_insert_with(|| {
            debug!("Building in-process application");
            DispatchSession::new(factory())
        })
    }

    fn effective_method(&self, method: Method, payload: Option<&Payload>) -> Method {
        if !self.method_spoofing || method != Method::POST {
            return method;
        }

        payload
            .and_then(|p| p.field("_method"))
            .and_then(|m| Method::from_bytes(m.to_ascii_uppercase().as_bytes()).ok())
            .unwrap_or(method)
    }
}

impl DispatchSession {
    pub fn new(app: Router) -> Self {
        Self {
            app,
            cookies: Arc::new(Jar::default()),
        }
    }

    /// The `Cookie` header a request to `url` would carry, after expiry and path matching.
    pub fn cookie_header(&self, url: &Url) -> Option<String> {
        self.cookies
            .cookies(url)
            .and_then(|value| value.to_str().ok().map(str::to_string))
    }

    async fn dispatch(
        &mut self,
        method: Method,
        url: &Url,
        payload: Option<&Payload>,
    ) -> Result<PageState> {
        info!("{} {} (in-process)", method, url);

        let target = match payload {
            Some(payload) if method == Method::GET => with_query(url, &payload.fields),
            _ => url.clone(),
        };

        let mut builder = Request::builder()
            .method(method.clone())
            .uri(target.as_str())
            .header(HOST, target.host_str().unwrap_or("localhost"));

        if let Some(cookies) = self.cookies.cookies(&target) {
            builder = builder.header(COOKIE, cookies);
        }

        let body = match payload {
            Some(payload) if method != Method::GET && !payload.files.is_empty() => {
                let (content_type, body) = encode_multipart(&method, &target, payload).await?;
                builder = builder.header(CONTENT_TYPE, content_type);
                body
            }
            Some(payload) if method != Method::GET && !payload.fields.is_empty() => {
                builder = builder.header(CONTENT_TYPE, "application/x-www-form-urlencoded");
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(payload.fields.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                    .finish();
                Body::from(encoded)
            }
            _ => Body::empty(),
        };

        if let (Some(payload), Some(headers)) = (payload, builder.headers_mut()) {
            headers.extend(payload.headers.clone());
        }

        let request = builder
            .body(body)
            .map_err(|e| EmulatorError::NavigationFailed(e.to_string()))?;

        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .unwrap_or_else(|never| match never {});

        self.cookies
            .set_cookies(&mut response.headers().get_all(SET_COOKIE).iter(), &target);

        let status = response.status().as_u16();
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| target.join(value).ok());

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| EmulatorError::NavigationFailed(e.to_string()))?;
        let body = String::from_utf8_lossy(&bytes).into_owned();

        Ok(PageState::new(target, status, body).with_location(location))
    }
}

/// Encode the payload with reqwest's multipart writer, which picks a fresh
/// boundary and percent-encodes quotes and line breaks in names.
async fn encode_multipart(
    method: &Method,
    url: &Url,
    payload: &Payload,
) -> Result<(HeaderValue, Body)> {
    let failed = |e: reqwest::Error| EmulatorError::NavigationFailed(e.to_string());
    let form = multipart_form(payload).await?;

    let mut request = reqwest::Client::builder()
        .build()
        .map_err(failed)?
        .request(method.clone(), url.clone())
        .multipart(form)
        .build()
        .map_err(failed)?;

    let content_type = request
        .headers()
        .get(CONTENT_TYPE)
        .cloned()
        .ok_or_else(|| EmulatorError::NavigationFailed("multipart body without a boundary".into()))?;
    let body = request
        .body_mut()
        .take()
        .map(Body::new)
        .unwrap_or_else(Body::empty);

    Ok((content_type, body))
}

#[async_trait]
impl Backend for InProcessDispatcher {
    fn kind(&self) -> BackendKind {
        BackendKind::InProcessDispatcher
    }

    fn default_base_url(&self) -> &str {
        IN_PROCESS_BASE_URL
    }

    fn has_session(&self) -> bool {
        self.session.is_some()
    }

    async fn current_session(&mut self) -> Result<SessionHandle<'_>> {
        Ok(SessionHandle::InProcess(self.session()))
    }

    /// Dispatch, then keep re-dispatching GETs while the application redirects.
    async fn navigate(
        &mut self,
        method: Method,
        url: &Url,
        payload: Option<&Payload>,
    ) -> Result<PageState> {
        let method = self.effective_method(method, payload);
        let max_redirects = self.max_redirects;
        let session = self.session();

        let mut page = session.dispatch(method, url, payload).await?;
        let mut hops = 0;

        while let Some(target) = page.location.clone().filter(|_| page.is_redirect()) {
            if hops >= max_redirects {
                return Err(EmulatorError::RedirectLoopDetected {
                    url: page.url.to_string(),
                    hops,
                });
            }
            debug!("Following redirect to {}", target);
            page = session.dispatch(Method::GET, &target, None).await?;
            hops += 1;
        }

        Ok(page)
    }

    async fn close(&mut self) -> Result<()> {
        self.session = None;
        Ok(())
    }
}
