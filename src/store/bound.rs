//! Minimal bound-store shim.
//!
//! Same container semantics as [`Store`], packaged the way hook-style
//! consumers expect: `create` hands back a value that can produce a plain
//! closure which reads the store when called.

use std::ops::Deref;
use std::sync::Arc;

use super::{Selection, Store, StoreApi, StoreState};

/// A store exposed through hook-style accessors
pub struct BoundStore<S: StoreState> {
    store: Store<S>,
}

impl<S: StoreState> Clone for BoundStore<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

/// Create a bound store from an initializer
pub fn create<S, F>(initializer: F) -> BoundStore<S>
where
    S: StoreState,
    F: FnOnce(&StoreApi<S>) -> S,
{
    let name = std::any::type_name::<S>()
        .rsplit("::")
        .next()
        .unwrap_or("bound")
        .to_string();

    BoundStore {
        store: Store::create(name, initializer),
    }
}

impl<S: StoreState> BoundStore<S> {
    /// Whole state, read at call time. `use_store` (via `Deref`) is the live view.
    pub fn snapshot(&self) -> Arc<S> {
        self.store.get_state()
    }

    /// Projection of the state, read at call time
    pub fn use_selector<R, F>(&self, selector: F) -> R
    where
        F: FnOnce(&S) -> R,
    {
        selector(&self.store.get_state())
    }

    /// Live projection that can be awaited for changes
    pub fn watch<R, F>(&self, selector: F) -> Selection<R>
    where
        R: Clone + PartialEq + Send + Sync + 'static,
        F: Fn(&S) -> R + Send + Sync + 'static,
    {
        self.store.select(selector)
    }

    /// A callable that returns the current state each time it is invoked
    pub fn hook(&self) -> impl Fn() -> Arc<S> + Clone + Send + Sync + 'static {
        let store = self.store.clone();
        move || store.get_state()
    }

    /// A callable that returns the current projection each time it is invoked
    pub fn hook_with<R, F>(&self, selector: F) -> impl Fn() -> R + Clone + Send + Sync + 'static
    where
        R: 'static,
        F: Fn(&S) -> R + Clone + Send + Sync + 'static,
    {
        let store = self.store.clone();
        move || selector(&store.get_state())
    }

    pub fn store(&self) -> &Store<S> {
        &self.store
    }
}

impl<S: StoreState> Deref for BoundStore<S> {
    type Target = Store<S>;

    fn deref(&self) -> &Self::Target {
        &self.store
    }
}
