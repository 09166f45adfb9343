use crate::core::LogConfig;
use crate::errors::Result;
use scraper::{Html, Selector};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Writes the current page somewhere a developer can read it after a failure.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    output: PathBuf,
    screenshot: PathBuf,
}

impl Diagnostics {
    pub fn new(config: &LogConfig) -> Self {
        Self {
            output: config.output.clone(),
            screenshot: config.screenshot.clone(),
        }
    }

    pub fn output_path(&self) -> &Path {
        &self.output
    }

    pub fn screenshot_path(&self) -> &Path {
        &self.screenshot
    }

    /// Best effort: a failed write is logged and otherwise ignored.
    pub fn capture(&self, body: &str) {
        if let Err(e) = write_creating_dirs(&self.output, body.as_bytes()) {
            warn!("Could not write diagnostics to {}: {}", self.output.display(), e);
            return;
        }
        info!("Wrote page body to {}", self.output.display());
    }

    pub async fn save_screenshot(&self, destination: Option<&Path>, png: &[u8]) -> Result<PathBuf> {
        let path = destination.unwrap_or(&self.screenshot).to_path_buf();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&path, png).await?;

        info!("Saved screenshot to {}", path.display());
        Ok(path)
    }
}

fn write_creating_dirs(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, contents)
}

/// Exception name and location from a framework error page, when the body is one.
pub fn error_page_detail(body: &str) -> Option<String> {
    let document = Html::parse_document(body);
    let title = Selector::parse(".exception_title").ok()?;
    let abbr = Selector::parse("abbr").ok()?;
    let link = Selector::parse("a[title]").ok()?;

    let header = document.select(&title).next()?;
    let exception = header.select(&abbr).next()?.text().collect::<String>();
    let location = header
        .select(&link)
        .next()
        .and_then(|a| a.value().attr("title"))
        .unwrap_or("unknown location");

    Some(format!("{} on {}", exception.trim(), location))
}
