//! Authentication state machine, its persistence and cross-context sync.

pub mod bridge;
pub mod session;
pub mod state;
pub mod store;

pub use bridge::{TokenBridgeHandle, TokenChangeBridge};
pub use session::AuthSession;
pub use state::{AuthPatch, AuthState, AuthStatus, AuthUser, OfflineTokenPolicy, PersistedAuth};
pub use store::{AuthSettings, AuthStore};
