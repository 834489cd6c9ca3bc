mod admin;
mod auth;
mod org;
mod role;
mod settings;
mod user;

pub use admin::AdminCommands;
pub use auth::{AuthCommands, PasswordArgs};
pub use org::OrgCommands;
pub use role::RoleCommands;
pub use settings::{SettingsCommands, SettingsGetArgs};
pub use user::UserCommands;
