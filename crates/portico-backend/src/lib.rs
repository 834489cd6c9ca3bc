//! # portico-backend
//!
//! Client seam to the backend-as-a-service the portal runs on.
//!
//! - [`provider`]: the traits every remote call goes through
//! - [`rest`]: `reqwest` implementation against the hosted auth (`/auth/v1`),
//!   row (`/rest/v1`) and function (`/functions/v1`) endpoints
//! - [`events`]: the auth provider's event stream
//! - `memory`: in-memory backend for tests (`test-support` feature)

pub mod error;
pub mod events;
#[cfg(any(test, feature = "test-support"))]
pub mod memory;
pub mod provider;
pub mod rest;

pub use error::BackendError;
pub use events::{AuthEventKind, EventBus, ProviderEvent};
pub use provider::{
    AuthProvider, Directory, InitialSetup, ProfileSource, SettingsStore, SetupCheck, SignUp,
};
pub use rest::RestClient;
