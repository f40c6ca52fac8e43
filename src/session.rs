/// Process-wide session state.
///
/// Holds the bearer token, the authenticated user and the restore flag, and
/// broadcasts route changes so that a session cleared anywhere (logout or an
/// expired token seen by the API client) sends the interface back to login.

use crate::error::Result;
use crate::models::User;
use crate::router::Route;
use crate::storage::LocalStore;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

/// Snapshot of the session
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub user: Option<User>,
    pub token: Option<String>,
    /// True until the startup restore has resolved
    pub loading: bool,
}

struct Inner {
    state: Mutex<SessionState>,
    store: Mutex<LocalStore>,
    routes: watch::Sender<Route>,
}

/// Cheaply cloneable handle to the shared session
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SessionHandle {
    /// Create an empty session backed by the given store
    pub fn new(store: LocalStore) -> Self {
        let (routes, _) = watch::channel(Route::Chat);
        let state = SessionState {
            loading: true,
            ..SessionState::default()
        };

        SessionHandle {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                store: Mutex::new(store),
                routes,
            }),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        lock(&self.inner.state).clone()
    }

    pub fn token(&self) -> Option<String> {
        lock(&self.inner.state).token.clone()
    }

    pub fn user(&self) -> Option<User> {
        lock(&self.inner.state).user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        lock(&self.inner.state).user.is_some()
    }

    pub fn is_loading(&self) -> bool {
        lock(&self.inner.state).loading
    }

    pub fn set_loading(&self, loading: bool) {
        lock(&self.inner.state).loading = loading;
    }

    pub fn set_user(&self, user: User) {
        lock(&self.inner.state).user = Some(user);
    }

    /// Token persisted by a previous run
    pub fn persisted_token(&self) -> Result<Option<String>> {
        let stored = lock(&self.inner.store).load_token()?;
        Ok(stored.map(|t| t.access_token))
    }

    /// Use a token for outbound calls without persisting it again
    pub fn adopt_token(&self, token: String) {
        lock(&self.inner.state).token = Some(token);
    }

    /// Persist a freshly issued token and use it for outbound calls
    pub fn set_token(&self, access_token: &str, token_type: &str) -> Result<()> {
        lock(&self.inner.store).save_token(access_token, token_type)?;
        lock(&self.inner.state).token = Some(access_token.to_string());
        Ok(())
    }

    /// Drop the token and user from memory and from disk
    pub fn clear(&self) -> Result<()> {
        {
            let mut state = lock(&self.inner.state);
            state.token = None;
            state.user = None;
        }
        lock(&self.inner.store).clear_token()
    }

    /// Session invalidated by the server: clear it and force the login view
    pub fn expire(&self) {
        log::warn!("Session expired, returning to login");
        if let Err(e) = self.clear() {
            log::error!("Failed to clear persisted token: {}", e);
        }
        self.navigate(Route::Login);
    }

    pub fn navigate(&self, route: Route) {
        self.inner.routes.send_replace(route);
    }

    pub fn current_route(&self) -> Route {
        *self.inner.routes.borrow()
    }

    /// Receive every route change, including forced redirects to login
    pub fn subscribe(&self) -> watch::Receiver<Route> {
        self.inner.routes.subscribe()
    }
}
