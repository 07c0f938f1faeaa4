//! Injection context
//!
//! While [`App::run_with_context`](crate::App::run_with_context) runs, its
//! app is the injection context of the calling thread. Contexts nest; the
//! innermost app answers [`inject`].

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;

use crate::app::App;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<App>> = const { RefCell::new(Vec::new()) };
}

/// Typed key for provided values. Keys are compared by name.
pub struct InjectionKey<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> InjectionKey<T> {
    /// Create a key
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }

    /// Key name
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<T> fmt::Debug for InjectionKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InjectionKey({:?})", self.name)
    }
}

/// Check if code is running inside an app context
pub fn has_injection_context() -> bool {
    CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
}

/// The innermost app context, if any
pub fn current_app() -> Option<App> {
    CONTEXT_STACK.with(|stack| stack.borrow().last().cloned())
}

/// Read a provided value from the current app context.
///
/// Returns `None` outside any context, when nothing is provided under
/// `key`, or when the provided value has another type.
pub fn inject<T: Clone + Send + Sync + 'static>(key: &InjectionKey<T>) -> Option<T> {
    current_app()?.provided(key)
}

pub(crate) fn enter(app: App) -> ContextGuard {
    CONTEXT_STACK.with(|stack| stack.borrow_mut().push(app));
    ContextGuard { _private: () }
}

pub(crate) struct ContextGuard {
    _private: (),
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
