use serde::Serialize;

use crate::models::Session;

/// What the page should render for a given session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Route {
    /// Session is still being hydrated or a login is in flight
    Loading,
    /// Not signed in. Carries the last login error, if any.
    Login { error: Option<String> },
    Protected,
}

/// Route guard. Recomputed on every session change; no caching.
pub fn route(session: &Session) -> Route {
    if session.loading {
        Route::Loading
    } else if !session.authenticated {
        Route::Login {
            error: session.last_error.clone(),
        }
    } else {
        Route::Protected
    }
}
