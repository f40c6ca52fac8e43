/// Authentication session store.
/// Restores a persisted login at startup and exposes login/register/logout.

use crate::api::ChatApi;
use crate::error::Result;
use crate::models::{LoginRequest, RegisterRequest, User};
use crate::router::Route;
use crate::session::SessionHandle;
use std::sync::Arc;

pub struct AuthService {
    api: Arc<ChatApi>,
    session: SessionHandle,
}

impl AuthService {
    pub fn new(api: Arc<ChatApi>) -> Self {
        let session = api.session().clone();
        AuthService { api, session }
    }

    /// Re-authenticate with the token saved by a previous run.
    ///
    /// Any failure leaves the session empty and the stored token removed.
    /// `loading` is cleared once this resolves, whatever the outcome.
    pub async fn restore(&self) -> Option<User> {
        let restored = self.try_restore().await;
        self.session.set_loading(false);

        match restored {
            Ok(user) => user,
            Err(e) => {
                log::warn!("Could not restore session: {}", e);
                if let Err(e) = self.session.clear() {
                    log::error!("Failed to clear stored token: {}", e);
                }
                None
            }
        }
    }

    async fn try_restore(&self) -> Result<Option<User>> {
        let token = match self.session.persisted_token()? {
            Some(token) => token,
            None => {
                log::debug!("No stored token, starting anonymous");
                return Ok(None);
            }
        };

        self.session.adopt_token(token);
        let user = self.api.current_user().await?;
        log::info!("Restored session for {}", user.username);
        self.session.set_user(user.clone());
        Ok(Some(user))
    }

    /// Log in, persist the issued token, then load the user it belongs to
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let request = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };

        let token = self.api.login(&request).await?;
        self.session.set_token(&token.access_token, &token.token_type)?;

        let user = match self.api.current_user().await {
            Ok(user) => user,
            Err(e) => {
                self.session.clear()?;
                return Err(e);
            }
        };

        log::info!("Logged in as {}", user.username);
        self.session.set_user(user.clone());
        self.session.navigate(Route::Chat);
        Ok(user)
    }

    /// Create an account. The caller still has to log in afterwards.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<User> {
        let request = RegisterRequest {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
        };
        self.api.register(&request).await
    }

    /// Forget the session locally; no request is made.
    ///
    /// The in-memory session is gone and the login view is requested even
    /// when removing the stored token fails; that failure is still returned.
    pub fn logout(&self) -> Result<()> {
        let cleared = self.session.clear();
        self.session.navigate(Route::Login);
        cleared?;
        log::info!("Logged out");
        Ok(())
    }

    pub fn current_user(&self) -> Option<User> {
        self.session.user()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.session.is_loading()
    }
}
