use crate::errors::Result;
use ::url::Url;

/// Turn a user-given path into an absolute URL under `base_url`.
///
/// A leading slash is dropped before joining. Only `http://` and `https://`
/// URLs are taken as absolute.
pub fn prepare_url(base_url: &str, path: &str) -> Result<Url> {
    let path = path.strip_prefix('/').unwrap_or(path);

    if is_absolute(path) {
        return Ok(Url::parse(path)?);
    }

    let joined = format!("{}/{}", base_url.trim_end_matches('/'), path);
    Ok(Url::parse(joined.trim_end_matches('/'))?)
}

fn is_absolute(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EmulatorError;

    #[test]
    fn test_relative_and_root_relative_paths() {
        let base = "http://localhost:8888";
        assert_eq!(
            prepare_url(base, "/login").unwrap().as_str(),
            "http://localhost:8888/login"
        );
        assert_eq!(
            prepare_url(base, "login").unwrap().as_str(),
            "http://localhost:8888/login"
        );
        assert_eq!(
            prepare_url("http://localhost:8888/", "/").unwrap().as_str(),
            "http://localhost:8888/"
        );
    }

    #[test]
    fn test_absolute_urls_pass_through() {
        assert_eq!(
            prepare_url("http://localhost", "https://example.com/a?b=1")
                .unwrap()
                .as_str(),
            "https://example.com/a?b=1"
        );
    }

    #[test]
    fn test_http_prefixed_paths_stay_relative() {
        let base = "http://localhost:8888";
        assert_eq!(
            prepare_url(base, "http-status").unwrap().as_str(),
            "http://localhost:8888/http-status"
        );
        assert_eq!(
            prepare_url(base, "/https-setup/step-1").unwrap().as_str(),
            "http://localhost:8888/https-setup/step-1"
        );
        assert_eq!(
            prepare_url(base, "HTTP://example.com/").unwrap().as_str(),
            "http://example.com/"
        );
    }

    #[test]
    fn test_unparsable_base_is_an_invalid_url() {
        assert!(matches!(
            prepare_url("not a base", "/x"),
            Err(EmulatorError::InvalidUrl(_))
        ));
    }
}
