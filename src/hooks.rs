//! Setup and teardown hooks declared by test cases.
//!
//! A test case lists its hooks once through [`TestCase::hooks`]; the registry
//! builds the per-type [`HookSet`] on first use and keeps it for the life of
//! the process.

use crate::errors::{EmulatorError, Result};
use crate::testing::TestCase;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookTag {
    Setup,
    Teardown,
}

pub type HookFn<T> = fn(&mut T) -> anyhow::Result<()>;

/// One named lifecycle method.
pub struct Hook<T> {
    pub name: &'static str,
    pub tag: HookTag,
    pub run: HookFn<T>,
}

impl<T> Hook<T> {
    pub fn setup(name: &'static str, run: HookFn<T>) -> Self {
        Self {
            name,
            tag: HookTag::Setup,
            run,
        }
    }

    pub fn teardown(name: &'static str, run: HookFn<T>) -> Self {
        Self {
            name,
            tag: HookTag::Teardown,
            run,
        }
    }
}

impl<T> Clone for Hook<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            tag: self.tag,
            run: self.run,
        }
    }
}

/// Hooks of one test-case type, split by tag and kept in declaration order.
pub struct HookSet<T> {
    setup: Vec<Hook<T>>,
    teardown: Vec<Hook<T>>,
}

impl<T> HookSet<T> {
    fn from_hooks(hooks: Vec<Hook<T>>) -> Self {
        let (setup, teardown): (Vec<_>, Vec<_>) = hooks
            .into_iter()
            .partition(|hook| hook.tag == HookTag::Setup);
        Self { setup, teardown }
    }

    pub fn tagged(&self, tag: HookTag) -> &[Hook<T>] {
        match tag {
            HookTag::Setup => &self.setup,
            HookTag::Teardown => &self.teardown,
        }
    }
}

type CachedSet = Arc<dyn Any + Send + Sync>;

static HOOK_SETS: Lazy<RwLock<HashMap<TypeId, CachedSet>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

pub struct HookRegistry;

impl HookRegistry {
    /// Names of the hooks `T` declares under `tag`, in declaration order.
    pub fn hooks_for<T: TestCase>(tag: HookTag) -> Vec<&'static str> {
        Self::set_for::<T>()
            .tagged(tag)
            .iter()
            .map(|hook| hook.name)
            .collect()
    }

    /// The cached hook set of `T`, built on first request.
    pub fn set_for<T: TestCase>() -> Arc<HookSet<T>> {
        let id = TypeId::of::<T>();

        if let Some(set) = Self::cached::<T>(HOOK_SETS.read().get(&id)) {
            return set;
        }

        let mut sets = HOOK_SETS.write();
        if let Some(set) = Self::cached::<T>(sets.get(&id)) {
            return set;
        }

        let set = Arc::new(HookSet::from_hooks(T::hooks()));
        sets.insert(id, set.clone());
        set
    }

    fn cached<T: TestCase>(entry: Option<&CachedSet>) -> Option<Arc<HookSet<T>>> {
        entry.and_then(|set| set.clone().downcast::<HookSet<T>>().ok())
    }

    /// Run every hook of `case` tagged `tag`.
    ///
    /// Setup stops at the first failure. Teardown runs every hook and
    /// reports the first failure afterwards.
    pub fn run<T: TestCase>(tag: HookTag, case: &mut T) -> Result<()> {
        let set = Self::set_for::<T>();
        let mut first_error = None;

        for hook in set.tagged(tag) {
            info!("Running {:?} hook '{}'", tag, hook.name);

            if let Err(e) = (hook.run)(case) {
                let err = EmulatorError::Hook(format!("{}: {}", hook.name, e));
                if tag == HookTag::Setup {
                    return Err(err);
                }
                warn!("{}", err);
                first_error.get_or_insert(err);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}
