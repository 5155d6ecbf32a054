//! Client state core for RentGuy.
//!
//! Observable stores, the authentication state machine with its persistence
//! and cross-context token sync, and the REST-backed domain stores.

pub mod api;
pub mod auth;
pub mod broadcast;
pub mod config;
pub mod context;
pub mod error;
pub mod resources;
pub mod storage;
pub mod store;

pub use api::{ApiClient, HttpClient, ReqwestHttpClient, TokenSource};
pub use auth::{
    AuthSession, AuthSettings, AuthState, AuthStatus, AuthStore, AuthUser, OfflineTokenPolicy,
    PersistedAuth, TokenChangeBridge,
};
pub use broadcast::{ContextId, StorageChannel, StorageEvent};
pub use config::{load_config, Config};
pub use context::{AppContext, SessionSummary};
pub use error::{ApiError, ApiResult, ErrorCode, StorageError, StoreError, StoreResult};
pub use resources::{DomainStores, EquipmentStore, InvoiceStore, LoadStatus, ProjectStore, ResourceStore};
pub use storage::{BroadcastStorage, FileStorage, KeyValueStorage, MemoryStorage, SafeStorage};
pub use store::{create_store, BoundStore, Selection, Store, StoreApi, StoreState, Update};

#[cfg(test)]
mod tests;
