//! # portico-auth
//!
//! Session, identity and authorization layer of the Portico admin portal.
//!
//! Control flows one way: the [`session::SessionStore`] publishes identity
//! changes, the [`profile::ProfileResolver`] turns them into the current
//! user, the [`routes::Router`] gates navigation on that user through the
//! [`policy`] predicates, and the [`settings::SettingsResolver`] re-resolves
//! the organization's branding whenever the user changes. [`Portal`] wires
//! the chain together over one backend.

pub mod admin;
pub mod claims;
pub mod error;
pub mod policy;
pub mod portal;
pub mod profile;
pub mod routes;
pub mod session;
pub mod settings;
pub mod state;
pub mod token_store;

pub use error::AuthError;
pub use policy::{AccessDecision, SetupDecision, can_access, require_super_admin};
pub use portal::{Portal, PortalOptions};
pub use routes::{Navigation, Route};
pub use session::{SessionState, SessionTransition, TransitionReason};
pub use settings::{APP_NAME_KEY, ResolvedSetting, SettingSource};
