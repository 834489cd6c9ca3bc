use serde::Serialize;

use portico_auth::routes::{self, Guard};
use portico_auth::{AccessDecision, Navigation, Portal, Route};

use crate::cli::GlobalFlags;
use crate::cli::root_commands::RouteArgs;
use crate::commands::Backend;
use crate::output::output;

#[derive(Debug, Serialize)]
pub struct RouteReport {
    pub path: String,
    /// The route `path` names, if any.
    pub requested: Option<Route>,
    #[serde(flatten)]
    pub navigation: Navigation,
    /// Policy verdict for the requested route, for guarded routes.
    pub decision: Option<AccessDecision>,
}

pub async fn check<B: Backend>(path: &str, portal: &Portal<B>) -> RouteReport {
    let requested = Route::parse(path);
    let navigation = portal.navigate(path).await;
    let decision = requested
        .filter(|route| matches!(route.guard(), Guard::Authenticated | Guard::SuperAdmin))
        .map(|route| routes::authorize(route, portal.current_user().as_ref()));
    RouteReport {
        path: path.to_string(),
        requested,
        navigation,
        decision,
    }
}

/// Handle `portico route <path>`.
pub async fn handle<B: Backend>(
    args: &RouteArgs,
    portal: &Portal<B>,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    output(&check(&args.path, portal).await, flags.format)
}
