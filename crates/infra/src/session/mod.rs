//! Session lifecycle: hydration, change tracking, sign-in/out.

pub mod loader;
pub mod manager;
pub mod state;

pub use loader::{Hydrated, ProfileLoader};
pub use manager::{SessionManager, SignOutReport};
pub use state::{AuthState, HydrationStatus};
