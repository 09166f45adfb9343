pub mod element;
pub mod form;
pub mod locator;
pub mod snapshot;

pub use element::{ElementHandle, MatchStrategy};
pub use form::{FormDescriptor, FormResolver};
pub use locator::{ElementLocator, LookupKind};
pub use snapshot::DomSnapshot;
