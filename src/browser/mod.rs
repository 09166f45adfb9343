pub mod crawler;
pub mod dispatcher;
pub mod remote;

pub use crawler::StatelessCrawler;
pub use dispatcher::{AppFactory, DispatchSession, InProcessDispatcher, IN_PROCESS_BASE_URL};
pub use remote::{RemoteSession, NOT_FOUND_MARKER};
