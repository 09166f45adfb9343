//! Raw requests and JSON assertions for API endpoints.

use crate::emulator::Emulator;
use crate::errors::{EmulatorError, Result};
use crate::types::Payload;
use http::{HeaderMap, Method};
use serde_json::{Map, Value};
use tracing::{debug, info};

impl Emulator {
    /// Issue one request and keep whatever comes back.
    ///
    /// Unlike `visit`, the status is not checked and redirects are not followed.
    async fn request(&mut self, method: Method, path: &str, data: Option<Value>) -> Result<&mut Self> {
        let url = self.resolve_url(path)?;
        let mut payload = data.as_ref().map(json_payload).transpose()?;
        if !self.headers().is_empty() {
            payload.get_or_insert_with(Payload::default).headers = self.headers().clone();
        }

        info!("{} {} (api)", method, url);
        let page = self
            .backend_mut()
            .navigate(method, &url, payload.as_ref())
            .await?;
        self.set_page(page);
        Ok(self)
    }

    /// Send `headers` with every following API request, replacing any set before.
    pub fn with_headers(&mut self, headers: HeaderMap) -> &mut Self {
        debug!("Sending {} extra header(s) with API requests", headers.len());
        *self.headers_mut() = headers;
        self
    }

    pub async fn get(&mut self, path: &str) -> Result<&mut Self> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&mut self, path: &str, data: Value) -> Result<&mut Self> {
        self.request(Method::POST, path, Some(data)).await
    }

    pub async fn put(&mut self, path: &str, data: Value) -> Result<&mut Self> {
        self.request(Method::PUT, path, Some(data)).await
    }

    pub async fn patch(&mut self, path: &str, data: Value) -> Result<&mut Self> {
        self.request(Method::PATCH, path, Some(data)).await
    }

    pub async fn delete(&mut self, path: &str) -> Result<&mut Self> {
        self.request(Method::DELETE, path, None).await
    }

    fn json_body(&self) -> Result<Value> {
        let page = self.current()?;
        serde_json::from_str(&page.body).map_err(|_| {
            self.fail(EmulatorError::AssertionFailure(format!(
                "Failed asserting that the following response was JSON: {}",
                page.body
            )))
        })
    }

    pub fn see_json(&mut self) -> Result<&mut Self> {
        self.json_body()?;
        Ok(self)
    }

    pub fn see_status_code(&mut self, code: u16) -> Result<&mut Self> {
        let status = self.current()?.status;
        if status != code {
            return Err(self.fail(EmulatorError::AssertionFailure(format!(
                "Expected status code {}, got {}.",
                code, status
            ))));
        }
        Ok(self)
    }

    /// Compare the response with `expected` as JSON values, ignoring formatting and key order.
    pub fn see_json_equals(&mut self, expected: Value) -> Result<&mut Self> {
        let actual = self.json_body()?;
        if actual != expected {
            return Err(self.fail(EmulatorError::AssertionFailure(format!(
                "Expected the response to equal {}, got {}.",
                expected, actual
            ))));
        }
        Ok(self)
    }

    /// Require `fragment` to appear in the response: in the top-level object,
    /// any element of a top-level array, or any nested object.
    pub fn see_json_contains(&mut self, fragment: Value) -> Result<&mut Self> {
        let Value::Object(wanted) = &fragment else {
            return Err(EmulatorError::InvalidArguments {
                operation: "see_json_contains".to_string(),
                expected: "a JSON object fragment".to_string(),
            });
        };

        let actual = self.json_body()?;
        if !contains_fragment(wanted, &actual) {
            return Err(self.fail(EmulatorError::AssertionFailure(format!(
                "Expected {} to exist in {}, but it did not.",
                fragment, actual
            ))));
        }
        Ok(self)
    }
}

fn contains_fragment(fragment: &Map<String, Value>, json: &Value) -> bool {
    match json {
        Value::Object(map) => {
            fragment.iter().all(|(key, value)| map.get(key) == Some(value))
                || map.values().any(|value| contains_fragment(fragment, value))
        }
        Value::Array(items) => items.iter().any(|item| contains_fragment(fragment, item)),
        _ => false,
    }
}

/// Flatten a JSON object into form fields, nesting with `key[sub]` brackets.
fn json_payload(data: &Value) -> Result<Payload> {
    let Value::Object(map) = data else {
        return Err(EmulatorError::InvalidArguments {
            operation: "request".to_string(),
            expected: "a JSON object of request fields".to_string(),
        });
    };

    let mut fields = Vec::new();
    for (key, value) in map {
        flatten(key.clone(), value, &mut fields);
    }
    Ok(Payload {
        fields,
        ..Payload::default()
    })
}

fn flatten(key: String, value: &Value, fields: &mut Vec<(String, String)>) {
    match value {
        Value::Null => fields.push((key, String::new())),
        Value::Bool(b) => fields.push((key, if *b { "1" } else { "0" }.to_string())),
        Value::Number(n) => fields.push((key, n.to_string())),
        Value::String(s) => fields.push((key, s.clone())),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten(format!("{}[{}]", key, i), item, fields);
            }
        }
        Value::Object(map) => {
            for (sub, item) in map {
                flatten(format!("{}[{}]", key, sub), item, fields);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_fragment_matching() {
        let users = json!([
            {"id": 1, "name": "alice", "profile": {"city": "Oslo"}},
            {"id": 2, "name": "bob"}
        ]);

        assert!(contains_fragment(&object(json!({"name": "bob"})), &users));
        assert!(contains_fragment(&object(json!({"id": 1, "name": "alice"})), &users));
        assert!(contains_fragment(&object(json!({"city": "Oslo"})), &users));
        assert!(!contains_fragment(&object(json!({"id": 2, "name": "alice"})), &users));
        assert!(!contains_fragment(&object(json!({"name": "carol"})), &json!("carol")));
    }

    #[test]
    fn test_payload_flattens_nested_values() {
        let payload = json_payload(&json!({
            "title": "Hello",
            "published": true,
            "tags": ["a", "b"],
            "author": {"id": 7}
        }))
        .unwrap();

        assert_eq!(payload.field("title"), Some("Hello"));
        assert_eq!(payload.field("published"), Some("1"));
        assert_eq!(payload.field("tags[1]"), Some("b"));
        assert_eq!(payload.field("author[id]"), Some("7"));
        assert!(json_payload(&json!([1, 2])).is_err());
    }
}
