use crate::dom::snapshot::normalize_whitespace;
use crate::dom::{DomSnapshot, ElementHandle, ElementLocator, LookupKind};
use crate::errors::{EmulatorError, Result};
use crate::types::{FieldValue, FormData, Payload};
use http::Method;
use scraper::ElementRef;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::debug;
use url::Url;

/// A form materialized at submit time: where it goes and what it sends.
#[derive(Debug, Clone)]
pub struct FormDescriptor {
    pub method: Method,
    pub action: Url,
    pub fields: FormData,
    pub files: BTreeMap<String, PathBuf>,
    /// Position of the form among the page's forms.
    pub form_index: usize,
    /// The pressed button, when the form was chosen by one.
    pub button: Option<ElementHandle>,
    checkbox_values: BTreeMap<String, String>,
}

impl FormDescriptor {
    pub fn field(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Encode the fields the way a browser serializes a form body.
    pub fn payload(&self) -> Payload {
        let mut fields = Vec::new();
        let mut files: Vec<(String, PathBuf)> = self
            .files
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        for (name, value) in &self.fields {
            match value {
                FieldValue::Text(text) => fields.push((name.clone(), text.clone())),
                FieldValue::Checked(true) => {
                    let value = self
                        .checkbox_values
                        .get(name)
                        .cloned()
                        .unwrap_or_else(|| "on".to_string());
                    fields.push((name.clone(), value));
                }
                FieldValue::Checked(false) => {}
                FieldValue::Selected { option } => fields.push((name.clone(), option.clone())),
                FieldValue::File { path } => files.push((name.clone(), path.clone())),
            }
        }

        Payload {
            fields,
            files,
            ..Payload::default()
        }
    }
}

/// Finds the form to submit and fills it with defaults and staged inputs.
pub struct FormResolver;

impl FormResolver {
    pub fn resolve(
        snapshot: &DomSnapshot,
        button: Option<&str>,
        staged: &FormData,
    ) -> Result<FormDescriptor> {
        let forms = snapshot.forms();
        let not_found = || EmulatorError::FormNotFound {
            button: button.map(str::to_string),
            url: snapshot.url().to_string(),
        };

        let (form_index, pressed) = match button {
            Some(text) => {
                let handle =
                    ElementLocator::find(snapshot, text, LookupKind::Button).ok_or_else(not_found)?;
                let index = handle.form_index.ok_or_else(not_found)?;
                (index, Some(handle))
            }
            None => match forms.len() {
                0 => return Err(not_found()),
                1 => (0, None),
                count => {
                    return Err(EmulatorError::AmbiguousForm {
                        count,
                        url: snapshot.url().to_string(),
                    })
                }
            },
        };

        let form = forms.get(form_index).ok_or_else(not_found)?;
        let element = form.value();

        let method = element
            .attr("method")
            .and_then(|m| Method::from_bytes(m.trim().to_ascii_uppercase().as_bytes()).ok())
            .unwrap_or(Method::GET);

        let action = match element.attr("action").map(str::trim) {
            Some(action) if !action.is_empty() => snapshot.url().join(action)?,
            _ => snapshot.url().clone(),
        };

        let mut descriptor = FormDescriptor {
            method,
            action,
            fields: FormData::new(),
            files: BTreeMap::new(),
            form_index,
            button: None,
            checkbox_values: BTreeMap::new(),
        };
        let ids = Self::collect_defaults(form, &mut descriptor);

        if let Some(handle) = &pressed {
            if let Some(name) = &handle.name {
                let value = handle.attr("value").unwrap_or_default().to_string();
                descriptor.fields.insert(name.clone(), FieldValue::Text(value));
            }
        }
        descriptor.button = pressed;

        for (key, value) in staged {
            // Staged keys may be ids; the body is keyed by name.
            let name = if descriptor.fields.contains_key(key) {
                key.clone()
            } else {
                ids.get(key).cloned().unwrap_or_else(|| key.clone())
            };

            match value {
                FieldValue::File { path } => {
                    descriptor.files.insert(name, path.clone());
                }
                other => {
                    descriptor.fields.insert(name, other.clone());
                }
            }
        }

        debug!(
            "Resolved form #{} {} {} with {} fields",
            form_index,
            descriptor.method,
            descriptor.action,
            descriptor.fields.len()
        );

        Ok(descriptor)
    }

    /// Fill `descriptor` with the form's declared defaults; returns the id to name map.
    fn collect_defaults(
        form: &ElementRef<'_>,
        descriptor: &mut FormDescriptor,
    ) -> BTreeMap<String, String> {
        let mut ids = BTreeMap::new();
        let Ok(selector) = scraper::Selector::parse("input, select, textarea") else {
            return ids;
        };

        for control in form.select(&selector) {
            let element = control.value();
            let Some(name) = element.attr("name") else {
                continue;
            };
            if element.attr("disabled").is_some() {
                continue;
            }
            if let Some(id) = element.attr("id") {
                ids.insert(id.to_string(), name.to_string());
            }

            let name = name.to_string();
            match element.name() {
                "select" => {
                    if let Some(option) = Self::selected_option(&control) {
                        descriptor
                            .fields
                            .insert(name, FieldValue::Selected { option });
                    }
                }
                "textarea" => {
                    let text = control.text().collect::<String>();
                    descriptor.fields.insert(name, FieldValue::Text(text));
                }
                _ => {
                    let kind = element
                        .attr("type")
                        .unwrap_or("text")
                        .to_ascii_lowercase();
                    let checked = element.attr("checked").is_some();
                    let value = element.attr("value");

                    match kind.as_str() {
                        "submit" | "button" | "image" | "reset" | "file" => {}
                        "checkbox" => {
                            descriptor
                                .checkbox_values
                                .insert(name.clone(), value.unwrap_or("on").to_string());
                            descriptor.fields.insert(name, FieldValue::Checked(checked));
                        }
                        "radio" => {
                            if checked {
                                let value = value.unwrap_or("on").to_string();
                                descriptor.fields.insert(name, FieldValue::Text(value));
                            }
                        }
                        _ => {
                            let value = value.unwrap_or_default().to_string();
                            descriptor.fields.insert(name, FieldValue::Text(value));
                        }
                    }
                }
            }
        }

        ids
    }

    fn selected_option(select: &ElementRef<'_>) -> Option<String> {
        let selector = scraper::Selector::parse("option").ok()?;
        let options: Vec<ElementRef<'_>> = select.select(&selector).collect();
        let chosen = options
            .iter()
            .find(|o| o.value().attr("selected").is_some())
            .or_else(|| options.first())?;

        Some(
            chosen
                .value()
                .attr("value")
                .map(str::to_string)
                .unwrap_or_else(|| normalize_whitespace(&chosen.text().collect::<String>())),
        )
    }
}
