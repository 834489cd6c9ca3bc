//! Entity structs for the portal's backend tables.
//!
//! Each entity maps to a table exposed by the backend's row API (`users`,
//! `organizations`, `roles`, `app_settings`). All structs derive
//! `Serialize`, `Deserialize`, and `JsonSchema`.

mod organization;
mod role;
mod setting;
mod user;

pub use organization::{NewOrganization, Organization};
pub use role::{NewRole, Role};
pub use setting::SettingEntry;
pub use user::{NewUserProfile, UserProfile};
