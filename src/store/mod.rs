//! Observable state container.
//!
//! A [`Store`] owns a single state value. The value is never mutated in place:
//! every update builds a candidate next state (from a typed patch, a recipe
//! run against a draft clone, or a full replacement), compares it with the
//! current one and only swaps it in, and notifies listeners, when they differ.

pub mod bound;
pub mod listeners;
pub mod selection;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};

use tokio::sync::watch;
use tracing::{debug, trace};

use crate::error::{store_detached, StoreResult};

pub use bound::{create, BoundStore};
pub use listeners::{Listener, ListenerId, ListenerRegistry};
pub use selection::Selection;

/// State types that can live in a [`Store`].
///
/// `Patch` is the typed partial update for the state: a struct whose fields
/// are all optional, where every `Some` field overwrites the matching state
/// field and every `None` field leaves it untouched.
pub trait StoreState: Clone + PartialEq + Send + Sync + 'static {
    type Patch: Send + 'static;

    fn apply_patch(&mut self, patch: Self::Patch);
}

/// Mutating function applied to a draft clone of the state
pub type Recipe<S> = Box<dyn FnOnce(&mut S) + Send>;

/// A state transition request
pub enum Update<S: StoreState> {
    /// Overwrite the fields present in the patch
    Patch(S::Patch),
    /// Mutate a draft clone of the current state
    Recipe(Recipe<S>),
    /// Replace the whole state
    Replace(S),
}

impl<S: StoreState> Update<S> {
    pub fn recipe<F>(f: F) -> Self
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        Update::Recipe(Box::new(f))
    }

    fn kind(&self) -> &'static str {
        match self {
            Update::Patch(_) => "patch",
            Update::Recipe(_) => "recipe",
            Update::Replace(_) => "replace",
        }
    }
}

struct StoreInner<S: StoreState> {
    name: String,
    /// Current snapshot; only ever swapped, never mutated
    state: RwLock<Arc<S>>,
    /// Serializes writers while the next state is computed
    writer: Mutex<()>,
    listeners: Arc<ListenerRegistry>,
    /// Number of applied (non no-op) updates
    version: AtomicU64,
}

impl<S: StoreState> StoreInner<S> {
    fn snapshot(&self) -> Arc<S> {
        let guard = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    fn apply(&self, update: Update<S>) -> bool {
        let kind = update.kind();
        let changed = {
            let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
            let current = self.snapshot();

            let next = match update {
                Update::Replace(next) => next,
                Update::Patch(patch) => {
                    let mut draft = S::clone(&current);
                    draft.apply_patch(patch);
                    draft
                }
                Update::Recipe(recipe) => {
                    let mut draft = S::clone(&current);
                    recipe(&mut draft);
                    draft
                }
            };

            if next == *current {
                false
            } else {
                let mut guard = self.state.write().unwrap_or_else(PoisonError::into_inner);
                *guard = Arc::new(next);
                self.version.fetch_add(1, Ordering::SeqCst);
                true
            }
        };

        if changed {
            trace!(store = %self.name, update = kind, "State updated, notifying listeners");
            self.listeners.notify();
        } else {
            trace!(store = %self.name, update = kind, "Update produced no change");
        }

        changed
    }
}

/// Observable state container
pub struct Store<S: StoreState> {
    inner: Arc<StoreInner<S>>,
}

impl<S: StoreState> Clone for Store<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: StoreState> Store<S> {
    /// Create a store holding `state`
    pub fn new(name: impl Into<String>, state: S) -> Self {
        Self::create(name, move |_| state)
    }

    /// Create a store from an initializer.
    ///
    /// The initializer receives a weak [`StoreApi`] it may capture to build
    /// actions. Initialization is synchronous, so the handle is only usable
    /// once `create` has returned.
    pub fn create<F>(name: impl Into<String>, initializer: F) -> Self
    where
        F: FnOnce(&StoreApi<S>) -> S,
    {
        let name = name.into();
        debug!(store = %name, "Creating store");

        let inner = Arc::new_cyclic(|weak: &Weak<StoreInner<S>>| {
            let api = StoreApi {
                inner: weak.clone(),
                name: name.clone(),
            };
            let initial = initializer(&api);

            StoreInner {
                listeners: Arc::new(ListenerRegistry::new(name.clone())),
                name,
                state: RwLock::new(Arc::new(initial)),
                writer: Mutex::new(()),
                version: AtomicU64::new(0),
            }
        });

        Self { inner }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Weak handle that does not keep the store alive
    pub fn api(&self) -> StoreApi<S> {
        StoreApi {
            inner: Arc::downgrade(&self.inner),
            name: self.inner.name.clone(),
        }
    }

    /// Current state snapshot
    pub fn get_state(&self) -> Arc<S> {
        self.inner.snapshot()
    }

    /// Apply an update. Returns `true` when the state changed and listeners
    /// were notified.
    pub fn set_state(&self, update: Update<S>) -> bool {
        self.inner.apply(update)
    }

    /// Overwrite the fields present in `patch`
    pub fn patch(&self, patch: S::Patch) -> bool {
        self.set_state(Update::Patch(patch))
    }

    /// Mutate a draft of the current state
    pub fn update<F>(&self, recipe: F) -> bool
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.set_state(Update::recipe(recipe))
    }

    /// Replace the whole state
    pub fn replace(&self, state: S) -> bool {
        self.set_state(Update::Replace(state))
    }

    /// Register a listener called after every applied change
    pub fn subscribe<F>(&self, listener: F) -> ListenerId
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.inner.listeners.register(Arc::new(listener))
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.inner.listeners.unregister(id)
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.count()
    }

    /// Number of updates that actually changed the state
    pub fn version(&self) -> u64 {
        self.inner.version.load(Ordering::SeqCst)
    }

    /// Read hook over a projection of the state.
    ///
    /// The selector runs after every applied change; the returned
    /// [`Selection`] only observes a change when the projection differs from
    /// the previous one.
    pub fn select<R, F>(&self, selector: F) -> Selection<R>
    where
        R: Clone + PartialEq + Send + Sync + 'static,
        F: Fn(&S) -> R + Send + Sync + 'static,
    {
        let selector = Arc::new(selector);
        let (sender, receiver) = watch::channel(selector(&self.get_state()));
        let sender = Arc::new(sender);

        let api = self.api();
        let listener_sender = Arc::clone(&sender);
        let listener_selector = Arc::clone(&selector);
        let id = self.subscribe(move || {
            let state = api.get_state()?;
            publish_projection(&listener_sender, listener_selector(&state));
            Ok(())
        });

        // Catch any change applied between the initial read and registration
        publish_projection(&sender, selector(&self.get_state()));

        Selection::new(receiver, id, Arc::downgrade(&self.inner.listeners))
    }

    /// Read hook over the whole state
    pub fn use_store(&self) -> Selection<Arc<S>> {
        let api = self.api();
        let initial = self.get_state();
        let (sender, receiver) = watch::channel(initial);

        let id = self.subscribe(move || {
            let state = api.get_state()?;
            sender.send_if_modified(|current| {
                if Arc::ptr_eq(current, &state) {
                    false
                } else {
                    *current = state;
                    true
                }
            });
            Ok(())
        });

        Selection::new(receiver, id, Arc::downgrade(&self.inner.listeners))
    }
}

fn publish_projection<R: PartialEq>(sender: &watch::Sender<R>, next: R) {
    sender.send_if_modified(|current| {
        if *current == next {
            false
        } else {
            *current = next;
            true
        }
    });
}

impl<S: StoreState> fmt::Debug for Store<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("name", &self.inner.name)
            .field("version", &self.version())
            .field("listeners", &self.listener_count())
            .field("state", &std::any::type_name::<S>())
            .finish()
    }
}

/// Weak get/set handle to a store.
///
/// Actions and listeners capture this instead of a [`Store`] so they do not
/// keep the store alive from inside its own listener registry.
pub struct StoreApi<S: StoreState> {
    inner: Weak<StoreInner<S>>,
    name: String,
}

impl<S: StoreState> Clone for StoreApi<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
            name: self.name.clone(),
        }
    }
}

impl<S: StoreState> StoreApi<S> {
    fn upgrade_inner(&self) -> StoreResult<Arc<StoreInner<S>>> {
        self.inner.upgrade().ok_or_else(|| store_detached(&self.name))
    }

    pub fn get_state(&self) -> StoreResult<Arc<S>> {
        Ok(self.upgrade_inner()?.snapshot())
    }

    pub fn set_state(&self, update: Update<S>) -> StoreResult<bool> {
        Ok(self.upgrade_inner()?.apply(update))
    }

    pub fn patch(&self, patch: S::Patch) -> StoreResult<bool> {
        self.set_state(Update::Patch(patch))
    }

    pub fn update<F>(&self, recipe: F) -> StoreResult<bool>
    where
        F: FnOnce(&mut S) + Send + 'static,
    {
        self.set_state(Update::recipe(recipe))
    }

    /// Strong handle, if the store is still alive
    pub fn upgrade(&self) -> Option<Store<S>> {
        self.inner.upgrade().map(|inner| Store { inner })
    }
}

/// Create a store from an initializer
pub fn create_store<S, F>(name: impl Into<String>, initializer: F) -> Store<S>
where
    S: StoreState,
    F: FnOnce(&StoreApi<S>) -> S,
{
    Store::create(name, initializer)
}
