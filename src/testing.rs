use crate::emulator::Emulator;
use crate::errors::Result;
use crate::hooks::{Hook, HookRegistry, HookTag};
use futures::future::LocalBoxFuture;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use tracing_subscriber::EnvFilter;

/// A test-case type that owns an emulator and may declare lifecycle hooks.
pub trait TestCase: Sized + 'static {
    fn emulator(&mut self) -> &mut Emulator;

    /// Setup and teardown hooks in declaration order.
    fn hooks() -> Vec<Hook<Self>> {
        Vec::new()
    }
}

/// Run `body` between the case's setup and teardown hooks.
///
/// Teardown hooks and the emulator teardown run whether the body returned
/// an error or panicked. A panic is resumed once cleanup is done; otherwise
/// the first error of setup, body, teardown hooks and backend close wins.
pub async fn run_test<T, F>(case: &mut T, body: F) -> Result<()>
where
    T: TestCase,
    F: for<'a> FnOnce(&'a mut T) -> LocalBoxFuture<'a, Result<()>>,
{
    let outcome = match HookRegistry::run(HookTag::Setup, case) {
        Ok(()) => AssertUnwindSafe(body(case)).catch_unwind().await,
        Err(e) => Ok(Err(e)),
    };

    let hooks = HookRegistry::run(HookTag::Teardown, case);
    let closed = case.emulator().teardown().await;

    match outcome {
        Err(panic) => std::panic::resume_unwind(panic),
        Ok(result) => {
            result?;
            hooks?;
            closed
        }
    }
}

/// Install a fmt subscriber filtered by `RUST_LOG`, defaulting to `integrated=info`.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("integrated=info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
