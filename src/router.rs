//! Views of the client and the guards that decide which one may be shown.

use std::fmt;

/// A view of the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    Chat,
}

impl Route {
    /// Routes that require an authenticated user
    pub fn is_protected(self) -> bool {
        matches!(self, Route::Chat)
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = match self {
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Chat => "/chat",
        };
        f.write_str(path)
    }
}

/// Outcome of a route guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    /// Session restore still in flight
    Loading,
    Allow(Route),
    Redirect(Route),
}

/// Resolve the route that may be displayed for the requested one.
///
/// Protected routes send anonymous users to the login view; public routes
/// send authenticated users to the chat view.
pub fn guard(requested: Route, authenticated: bool, loading: bool) -> Guard {
    if loading {
        return Guard::Loading;
    }

    match (requested.is_protected(), authenticated) {
        (true, false) => Guard::Redirect(Route::Login),
        (false, true) => Guard::Redirect(Route::Chat),
        _ => Guard::Allow(requested),
    }
}

/// The route actually shown once the guard has been applied
pub fn resolve(requested: Route, authenticated: bool, loading: bool) -> Option<Route> {
    match guard(requested, authenticated, loading) {
        Guard::Loading => None,
        Guard::Allow(route) | Guard::Redirect(route) => Some(route),
    }
}
