use crate::dom::{DomSnapshot, ElementHandle, ElementLocator, LookupKind};
use crate::errors::Result;
use crate::types::{FieldValue, FormData};
use tracing::debug;

/// Form inputs accumulated between navigations.
#[derive(Debug, Default)]
pub struct InputStage {
    entries: FormData,
}

impl InputStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` against `key` once the element is confirmed to exist.
    ///
    /// Validation happens here rather than at submit time so a typo in a
    /// field name fails on the line that made it.
    pub fn stage(
        &mut self,
        snapshot: &DomSnapshot,
        key: &str,
        value: FieldValue,
    ) -> Result<ElementHandle> {
        let element = ElementLocator::locate(snapshot, key, LookupKind::Field)?;
        let key = ElementLocator::normalize_key(key).to_string();

        debug!("Staged {:?} for '{}'", value, key);
        self.entries.insert(key, value);
        Ok(element)
    }

    /// Take every staged entry, leaving the stage empty.
    pub fn consume(&mut self) -> FormData {
        std::mem::take(&mut self.entries)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn peek(&self) -> &FormData {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.entries.get(ElementLocator::normalize_key(key))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
