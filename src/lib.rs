pub mod aliases;
mod api;
pub mod browser;
pub mod core;
pub mod database;
pub mod dom;
pub mod emulator;
pub mod errors;
pub mod hooks;
pub mod input;
pub mod testing;
pub mod types;
pub mod utils;

pub use aliases::Operation;
pub use browser::{InProcessDispatcher, RemoteSession, StatelessCrawler};
pub use crate::core::{Backend, Config, SessionHandle};
pub use database::{DatabaseAdapter, SqliteAdapter};
pub use emulator::{Emulator, EmulatorState};
pub use errors::{EmulatorError, Result};
pub use hooks::{Hook, HookRegistry, HookTag};
pub use testing::{run_test, TestCase};
pub use types::*;
