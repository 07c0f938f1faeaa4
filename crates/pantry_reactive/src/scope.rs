//! Effect scopes
//!
//! An [`EffectScope`] collects disposer callbacks and child scopes. While a
//! scope is running (see [`EffectScope::run`]) it is the *current* scope of
//! the calling thread, and anything created in that window attaches
//! itself to it. [`EffectScope::stop`] releases children first, then its
//! own disposers in reverse registration order.

use std::cell::RefCell;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Cleanup callback owned by a scope
pub type Disposer = Box<dyn FnOnce() + Send>;

thread_local! {
    static SCOPE_STACK: RefCell<Vec<EffectScope>> = const { RefCell::new(Vec::new()) };
}

/// Lifecycle state of a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeState {
    /// Accepting disposers and children
    Active,
    /// `stop` is running
    Stopping,
    /// Everything has been released
    Stopped,
}

struct ScopeInner {
    state: ScopeState,
    disposers: Vec<Disposer>,
    children: Vec<EffectScope>,
    parent: Option<Weak<Mutex<ScopeInner>>>,
}

/// Disposable grouping of reactive computations
#[derive(Clone)]
pub struct EffectScope {
    inner: Arc<Mutex<ScopeInner>>,
}

impl EffectScope {
    fn with_parent(parent: Option<&EffectScope>) -> Self {
        let scope = Self {
            inner: Arc::new(Mutex::new(ScopeInner {
                state: ScopeState::Active,
                disposers: Vec::new(),
                children: Vec::new(),
                parent: parent.map(|p| Arc::downgrade(&p.inner)),
            })),
        };

        if let Some(parent) = parent {
            let mut inner = parent.inner.lock();
            if inner.state == ScopeState::Active {
                inner.children.push(scope.clone());
            } else {
                drop(inner);
                scope.inner.lock().parent = None;
            }
        }

        scope
    }

    /// Create a scope parented to the current scope, if any
    pub fn new() -> Self {
        let parent = current_scope();
        Self::with_parent(parent.as_ref())
    }

    /// Create a scope with no parent. It lives until stopped explicitly,
    /// whatever happens to the scope that is current at creation time.
    pub fn detached() -> Self {
        Self::with_parent(None)
    }

    /// Create a detached scope and run `f` inside it once
    pub fn detached_with<R>(f: impl FnOnce() -> R) -> (Self, R) {
        let scope = Self::detached();
        SCOPE_STACK.with(|stack| stack.borrow_mut().push(scope.clone()));
        let result = {
            let _guard = PopOnDrop;
            f()
        };
        (scope, result)
    }

    /// Run `f` with this scope as the current scope.
    ///
    /// Returns `None` without calling `f` if the scope is no longer active.
    pub fn run<R>(&self, f: impl FnOnce() -> R) -> Option<R> {
        if !self.is_active() {
            log::warn!("cannot run an inactive effect scope");
            return None;
        }

        SCOPE_STACK.with(|stack| stack.borrow_mut().push(self.clone()));
        let _guard = PopOnDrop;
        Some(f())
    }

    /// Register a cleanup callback.
    ///
    /// If the scope is no longer active the callback runs immediately and
    /// `false` is returned.
    pub fn on_dispose(&self, disposer: impl FnOnce() + Send + 'static) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == ScopeState::Active {
            inner.disposers.push(Box::new(disposer));
            return true;
        }
        drop(inner);
        disposer();
        false
    }

    /// Stop the scope: stop every child, then run disposers newest first.
    ///
    /// Calling `stop` again, including from inside one of the disposers,
    /// does nothing.
    pub fn stop(&self) {
        let (children, disposers, parent) = {
            let mut inner = self.inner.lock();
            if inner.state != ScopeState::Active {
                log::debug!("effect scope already {:?}", inner.state);
                return;
            }
            inner.state = ScopeState::Stopping;
            (
                std::mem::take(&mut inner.children),
                std::mem::take(&mut inner.disposers),
                inner.parent.take(),
            )
        };

        for child in children {
            child.stop();
        }
        for disposer in disposers.into_iter().rev() {
            disposer();
        }

        self.inner.lock().state = ScopeState::Stopped;

        if let Some(parent) = parent.and_then(|p| p.upgrade()) {
            parent
                .lock()
                .children
                .retain(|child| !Arc::ptr_eq(&child.inner, &self.inner));
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> ScopeState {
        self.inner.lock().state
    }

    /// Check if the scope still accepts work
    pub fn is_active(&self) -> bool {
        self.state() == ScopeState::Active
    }

    /// Number of pending disposers
    pub fn disposer_count(&self) -> usize {
        self.inner.lock().disposers.len()
    }

    /// Number of live child scopes
    pub fn child_count(&self) -> usize {
        self.inner.lock().children.len()
    }

    /// Check if two handles refer to the same scope
    pub fn ptr_eq(&self, other: &EffectScope) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for EffectScope {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EffectScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("EffectScope")
            .field("state", &inner.state)
            .field("disposers", &inner.disposers.len())
            .field("children", &inner.children.len())
            .finish()
    }
}

struct PopOnDrop;

impl Drop for PopOnDrop {
    fn drop(&mut self) {
        SCOPE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// The innermost running scope on this thread
pub fn current_scope() -> Option<EffectScope> {
    SCOPE_STACK.with(|stack| stack.borrow().last().cloned())
}

/// Register a disposer on the current scope.
///
/// Returns `false` (and drops the callback without running it) when no
/// scope is running.
pub fn on_scope_dispose(disposer: impl FnOnce() + Send + 'static) -> bool {
    match current_scope() {
        Some(scope) => scope.on_dispose(disposer),
        None => false,
    }
}
