pub mod diagnostics;
pub mod url;

pub use diagnostics::Diagnostics;
pub use self::url::prepare_url;
