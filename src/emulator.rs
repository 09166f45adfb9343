use crate::browser::{InProcessDispatcher, RemoteSession, StatelessCrawler};
use crate::core::{Backend, Config, SessionHandle};
use crate::database::{DatabaseAdapter, SqliteAdapter};
use crate::dom::{ElementHandle, ElementLocator, FormResolver, LookupKind};
use crate::errors::{EmulatorError, Result};
use crate::input::InputStage;
use crate::types::{BackendKind, FieldValue, FormData, PageState};
use crate::utils::diagnostics::error_page_detail;
use crate::utils::{prepare_url, Diagnostics};
use axum::Router;
use http::{HeaderMap, Method};
use regex::RegexBuilder;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Where the emulator is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmulatorState {
    Idle,
    OnPage,
}

/// The browser a test talks to.
///
/// Every operation runs against the current page and hands I/O to the
/// backend chosen at construction. Operations return `&mut Self` so a test
/// reads as one chain:
///
/// ```no_run
/// # async fn login(emulator: &mut integrated::Emulator) -> integrated::Result<()> {
/// emulator
///     .visit("/login").await?
///     .type_text("alice", "#username").await?
///     .type_text("secret", "#password").await?
///     .press("Log In").await?
///     .see("Welcome back")?;
/// # Ok(())
/// # }
/// ```
pub struct Emulator {
    config: Config,
    backend: Box<dyn Backend>,
    page: Option<PageState>,
    inputs: InputStage,
    diagnostics: Diagnostics,
    database: Option<Box<dyn DatabaseAdapter>>,
    base_url: String,
    headers: HeaderMap,
    closed: bool,
}

impl Emulator {
    pub fn new<B: Backend + 'static>(config: Config, backend: B) -> Self {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| backend.default_base_url().to_string());
        let diagnostics = Diagnostics::new(&config.logs);

        Self {
            config,
            backend: Box::new(backend),
            page: None,
            inputs: InputStage::new(),
            diagnostics,
            database: None,
            base_url,
            headers: HeaderMap::new(),
            closed: false,
        }
    }

    pub fn crawler(config: Config) -> Self {
        Self::new(config, StatelessCrawler::new())
    }

    pub fn in_process<F>(config: Config, factory: F) -> Self
    where
        F: Fn() -> Router + Send + Sync + 'static,
    {
        let dispatcher = InProcessDispatcher::new(factory).with_max_redirects(config.max_redirects);
        Self::new(config, dispatcher)
    }

    pub fn remote(config: Config) -> Self {
        let session = RemoteSession::new(&config.selenium);
        Self::new(config, session)
    }

    /// Use `adapter` for database assertions instead of the configured SQLite file.
    pub fn with_database<D: DatabaseAdapter + 'static>(mut self, adapter: D) -> Self {
        self.database = Some(Box::new(adapter));
        self
    }

    pub fn state(&self) -> EmulatorState {
        if self.page.is_some() {
            EmulatorState::OnPage
        } else {
            EmulatorState::Idle
        }
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn current_page(&self) -> Option<&PageState> {
        self.page.as_ref()
    }

    pub fn current_url(&self) -> Option<&Url> {
        self.page.as_ref().map(|page| &page.url)
    }

    pub fn body(&self) -> Option<&str> {
        self.page.as_ref().map(|page| page.body.as_str())
    }

    /// Inputs staged since the last navigation.
    pub fn staged(&self) -> &FormData {
        self.inputs.peek()
    }

    /// Extra headers sent with API requests.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub(crate) fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// The backend's session, opened on first use.
    pub async fn current_session(&mut self) -> Result<SessionHandle<'_>> {
        self.backend.current_session().await
    }

    pub(crate) fn current(&self) -> Result<&PageState> {
        self.page.as_ref().ok_or(EmulatorError::NoPageLoaded)
    }

    pub(crate) fn resolve_url(&self, path: &str) -> Result<Url> {
        prepare_url(&self.base_url, path)
    }

    pub(crate) fn backend_mut(&mut self) -> &mut dyn Backend {
        self.backend.as_mut()
    }

    pub(crate) fn set_page(&mut self, page: PageState) {
        self.inputs.clear();
        self.page = Some(page);
    }

    /// Attach the page body to the log before handing back failures that ask for it.
    pub(crate) fn fail(&self, err: EmulatorError) -> EmulatorError {
        if err.wants_diagnostics() {
            if let Some(page) = &self.page {
                self.diagnostics.capture(&page.body);
            }
        }
        err
    }

    /// Open `path` with a GET and require a 200.
    pub async fn visit(&mut self, path: &str) -> Result<&mut Self> {
        let url = self.resolve_url(path)?;
        self.inputs.clear();

        info!("Visiting {}", url);
        let page = self.backend.navigate(Method::GET, &url, None).await?;
        let page = self.follow_redirects(page).await?;
        self.set_page(page);

        self.assert_page_loaded()?;
        Ok(self)
    }

    /// Visit the `Location` of redirect responses until a page is not one.
    async fn follow_redirects(&mut self, mut page: PageState) -> Result<PageState> {
        let mut hops = 0;

        while let Some(target) = page.location.clone().filter(|_| page.is_redirect()) {
            if hops >= self.config.max_redirects {
                return Err(EmulatorError::RedirectLoopDetected {
                    url: page.url.to_string(),
                    hops,
                });
            }
            debug!("{} redirected to {}", page.url, target);
            page = self.backend.navigate(Method::GET, &target, None).await?;
            hops += 1;
        }

        Ok(page)
    }

    fn assert_page_loaded(&self) -> Result<()> {
        let page = self.current()?;
        if page.is_ok() {
            return Ok(());
        }

        Err(self.fail(EmulatorError::PageLoadFailure {
            url: page.url.to_string(),
            status: page.status,
            detail: error_page_detail(&page.body),
        }))
    }

    /// Case-insensitive pattern search over the page body.
    ///
    /// `text` is tried as a regular expression first and matched literally
    /// when it does not compile.
    pub fn see(&mut self, text: &str) -> Result<&mut Self> {
        let page = self.current()?;
        let pattern = RegexBuilder::new(text)
            .case_insensitive(true)
            .build()
            .or_else(|_| {
                RegexBuilder::new(&regex::escape(text))
                    .case_insensitive(true)
                    .build()
            })
            .map_err(|e| EmulatorError::AssertionFailure(e.to_string()))?;

        if !pattern.is_match(&page.body) {
            let message = format!("Could not find '{}' on the page, '{}'.", text, page.url);
            return Err(self.fail(EmulatorError::AssertionFailure(message)));
        }

        Ok(self)
    }

    /// Require the current URL to be exactly `path` resolved against the base URL.
    pub fn see_page_is(&mut self, path: &str) -> Result<&mut Self> {
        let expected = self.resolve_url(path)?;
        self.assert_page_loaded()?;

        let page = self.current()?;
        if page.url != expected {
            let message = format!(
                "Expected to be on the page, {}, but was on {}.",
                expected, page.url
            );
            return Err(self.fail(EmulatorError::AssertionFailure(message)));
        }

        Ok(self)
    }

    /// Follow the link whose text, id or name is `text`.
    pub async fn click(&mut self, text: &str) -> Result<&mut Self> {
        let target = {
            let snapshot = self.current()?.dom();
            let link = ElementLocator::locate(&snapshot, text, LookupKind::Link)?;
            let href = link.href().ok_or_else(|| EmulatorError::ElementNotFound {
                key: text.to_string(),
                url: snapshot.url().to_string(),
            })?;
            snapshot.url().join(href)?
        };

        info!("Clicking '{}'", text);
        self.visit(target.as_str()).await
    }

    /// Pick up changes a live browser made without a navigation.
    pub(crate) async fn refresh_page(&mut self) -> Result<()> {
        if let Some(page) = self.backend.refresh().await? {
            self.page = Some(page);
        }
        Ok(())
    }

    async fn stage(&mut self, key: &str, value: FieldValue) -> Result<ElementHandle> {
        self.refresh_page().await?;
        let snapshot = self.current()?.dom();
        self.inputs.stage(&snapshot, key, value)
    }

    pub async fn type_text(&mut self, text: &str, element: &str) -> Result<&mut Self> {
        self.stage(element, FieldValue::text(text)).await?;
        Ok(self)
    }

    pub async fn check(&mut self, element: &str) -> Result<&mut Self> {
        self.stage(element, FieldValue::Checked(true)).await?;
        Ok(self)
    }

    pub async fn uncheck(&mut self, element: &str) -> Result<&mut Self> {
        self.stage(element, FieldValue::Checked(false)).await?;
        Ok(self)
    }

    pub async fn select(&mut self, element: &str, option: &str) -> Result<&mut Self> {
        self.stage(element, FieldValue::selected(option)).await?;
        Ok(self)
    }

    /// Stage a file upload; the form is then sent as multipart.
    pub async fn attach_file(&mut self, element: &str, path: impl AsRef<Path>) -> Result<&mut Self> {
        let path = path.as_ref().to_path_buf();
        self.stage(element, FieldValue::File { path }).await?;
        Ok(self)
    }

    /// Submit the form holding the button `button_text`, with the staged inputs.
    pub async fn press(&mut self, button_text: &str) -> Result<&mut Self> {
        self.submit_form(Some(button_text), FormData::new()).await
    }

    /// Submit a form with `data` laid over the staged inputs.
    ///
    /// Without a button the page must hold exactly one form.
    pub async fn submit_form(
        &mut self,
        button_text: Option<&str>,
        data: FormData,
    ) -> Result<&mut Self> {
        self.refresh_page().await?;

        let mut staged = self.inputs.peek().clone();
        for (key, value) in data {
            staged.insert(ElementLocator::normalize_key(&key).to_string(), value);
        }

        let form = {
            let snapshot = self.current()?.dom();
            FormResolver::resolve(&snapshot, button_text, &staged)?
        };
        self.inputs.consume();

        info!(
            "Submitting form {} {} ({} staged inputs)",
            form.method,
            form.action,
            staged.len()
        );
        let page = self.backend.submit(&form, &staged).await?;
        let page = self.follow_redirects(page).await?;
        self.set_page(page);

        self.assert_page_loaded()?;
        Ok(self)
    }

    fn database(&mut self) -> Result<&dyn DatabaseAdapter> {
        if self.database.is_none() {
            let config = self.config.database.as_ref().ok_or_else(|| {
                EmulatorError::Configuration("no database configured".to_string())
            })?;
            let adapter = SqliteAdapter::open(&config.path)?;
            self.database = Some(Box::new(adapter));
        }

        self.database
            .as_deref()
            .ok_or_else(|| EmulatorError::Database("database unavailable".to_string()))
    }

    /// Require at least one row of `table` to match every column in `fields`.
    pub fn see_in_database(&mut self, table: &str, fields: Value) -> Result<&mut Self> {
        let Value::Object(fields) = fields else {
            return Err(EmulatorError::InvalidArguments {
                operation: "see_in_database".to_string(),
                expected: "a JSON object of column values".to_string(),
            });
        };

        let count = self.database()?.row_count(table, &fields)?;
        debug!("{} matching rows in '{}'", count, table);

        if count == 0 {
            let message = format!(
                "Didn't see row in the '{}' table that matched the attributes '{}'.",
                table,
                Value::Object(fields)
            );
            return Err(self.fail(EmulatorError::AssertionFailure(message)));
        }

        Ok(self)
    }

    pub fn see_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let path = path.as_ref();
        if !path.exists() {
            let message = format!("Failed asserting that file '{}' exists.", path.display());
            return Err(self.fail(EmulatorError::AssertionFailure(message)));
        }
        Ok(self)
    }

    /// Pause for client-side rendering, then re-read the page.
    ///
    /// Values of 1000 or more are taken as milliseconds given by mistake and
    /// replaced by four seconds.
    pub async fn wait(&mut self, seconds: u64) -> Result<&mut Self> {
        let seconds = if seconds >= 1000 { 4 } else { seconds };
        debug!("Waiting {}s", seconds);

        tokio::time::sleep(Duration::from_secs(seconds)).await;
        self.refresh_page().await?;
        Ok(self)
    }

    pub async fn see_in_alert(&mut self, text: &str, accept: bool) -> Result<&mut Self> {
        let alert = match self.backend.alert_text().await {
            Ok(alert) => alert,
            Err(EmulatorError::NotSupported(op)) => return Err(EmulatorError::NotSupported(op)),
            Err(_) => {
                return Err(self.fail(EmulatorError::AssertionFailure(format!(
                    "Could not see '{}' because no alert box was shown.",
                    text
                ))))
            }
        };

        if !alert.contains(text) {
            return Err(self.fail(EmulatorError::AssertionFailure(format!(
                "Expected the alert to contain '{}', but it said '{}'.",
                text, alert
            ))));
        }

        if accept {
            self.accept_alert().await?;
        }
        Ok(self)
    }

    pub async fn accept_alert(&mut self) -> Result<&mut Self> {
        match self.backend.accept_alert().await {
            Ok(()) => {}
            Err(EmulatorError::NotSupported(op)) => return Err(EmulatorError::NotSupported(op)),
            Err(_) => {
                return Err(self.fail(EmulatorError::AssertionFailure(
                    "Tried to accept the alert, but there wasn't one.".to_string(),
                )))
            }
        }

        self.refresh_page().await?;
        Ok(self)
    }

    /// Save a screenshot to `destination`, or the configured screenshot path.
    pub async fn snap(&mut self, destination: Option<&Path>) -> Result<&mut Self> {
        let png = self.backend.screenshot().await?;
        self.diagnostics.save_screenshot(destination, &png).await?;
        Ok(self)
    }

    pub fn diagnostics_path(&self) -> PathBuf {
        self.diagnostics.output_path().to_path_buf()
    }

    /// Log the current body, print it and end the process.
    pub fn dump(&self) -> ! {
        let body = self.body().unwrap_or_default();
        self.diagnostics.capture(body);
        println!("{}", body);
        std::process::exit(1)
    }

    /// Release the backend session. Later calls do nothing.
    pub async fn teardown(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.page = None;
        self.inputs.clear();

        info!("Closing {:?} backend", self.backend.kind());
        self.backend.close().await
    }
}
