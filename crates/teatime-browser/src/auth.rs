//! Login automation for the club site
//!
//! The engine treats authentication as a precondition consumed through the
//! [`SessionAuthenticator`] trait; this module provides the live
//! implementation. Login success is judged by multiple independent signals
//! because the site redirects inconsistently: any one positive signal is
//! accepted, all-absent is a failure.

use crate::page::Page;
use async_trait::async_trait;
use std::time::Duration;
use teatime_core::{Credentials, Result, TeatimeError};
use tracing::{debug, info, warn};

/// Username input on the login form
const USERNAME_FIELD: &str = "#Username";
/// Password input on the login form
const PASSWORD_FIELD: &str = "#Password";
/// Sign-in button
const SIGN_IN_BUTTON: &str = "#signIn";
/// Elements that only render for an authenticated member
const LOGGED_IN_MARKERS: &str =
    "[class*='account'], [class*='logout'], [class*='welcome'], [class*='user']";

/// The single authentication operation the engine consumes.
#[async_trait]
pub trait SessionAuthenticator: Send + Sync {
    /// Ensure the page belongs to an authenticated session, logging in if
    /// necessary. Failures are typed as [`TeatimeError::Auth`].
    async fn ensure_authenticated(&self, page: &dyn Page) -> Result<()>;
}

/// Live login automation against the club site.
pub struct Authenticator {
    login_url: String,
    credentials: Credentials,
    field_timeout: Duration,
}

impl Authenticator {
    pub fn new(login_url: impl Into<String>, credentials: Credentials) -> Self {
        Self {
            login_url: login_url.into(),
            credentials,
            field_timeout: Duration::from_secs(10),
        }
    }

    /// Judge login state from independent signals on the current page.
    async fn is_logged_in(&self, page: &dyn Page) -> bool {
        let mut signals = 0u32;

        match page.current_url().await {
            Ok(url) if !url.to_lowercase().contains("login") => {
                debug!("URL signal: {} is not the login route", url);
                signals += 1;
            }
            Ok(_) => {}
            Err(e) => warn!("Could not read URL during login check: {}", e),
        }

        if page.element_exists(LOGGED_IN_MARKERS).await {
            debug!("Marker signal: logged-in elements present");
            signals += 1;
        }

        if !page.element_exists(USERNAME_FIELD).await {
            debug!("Form signal: login form absent");
            signals += 1;
        }

        signals > 0
    }
}

#[async_trait]
impl SessionAuthenticator for Authenticator {
    async fn ensure_authenticated(&self, page: &dyn Page) -> Result<()> {
        info!(
            "Authenticating as {}",
            self.credentials.masked_username()
        );

        page.navigate(&self.login_url)
            .await
            .map_err(|e| TeatimeError::Auth(format!("could not reach login page: {}", e)))?;

        // A session cookie may still be valid; the site then skips the form.
        // Form absence alone is not proof here, so require a second signal.
        if !page.element_exists(USERNAME_FIELD).await {
            let off_login_route = matches!(
                page.current_url().await,
                Ok(url) if !url.to_lowercase().contains("login")
            );
            if off_login_route || page.element_exists(LOGGED_IN_MARKERS).await {
                info!("Existing session still authenticated");
                return Ok(());
            }
            return Err(TeatimeError::Auth(
                "login form absent but no logged-in signal".to_string(),
            ));
        }

        page.wait_for(USERNAME_FIELD, self.field_timeout)
            .await
            .map_err(|_| TeatimeError::Auth("username field never became ready".to_string()))?;

        debug!("Entering credentials");
        page.fill(USERNAME_FIELD, &self.credentials.username)
            .await
            .map_err(|e| TeatimeError::Auth(format!("could not fill username: {}", e)))?;
        page.fill(PASSWORD_FIELD, &self.credentials.password)
            .await
            .map_err(|e| TeatimeError::Auth(format!("could not fill password: {}", e)))?;

        debug!("Submitting login form");
        page.click(SIGN_IN_BUTTON)
            .await
            .map_err(|e| TeatimeError::Auth(format!("could not click sign-in: {}", e)))?;

        if self.is_logged_in(page).await {
            info!("Login successful");
            Ok(())
        } else {
            Err(TeatimeError::Auth(
                "no logged-in signal after submitting credentials".to_string(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Fake login page: tracks whether credentials were submitted and answers
    /// the three login signals from that state.
    struct FakeLoginPage {
        logged_in: Mutex<bool>,
        accept_credentials: bool,
        filled: Mutex<Vec<(String, String)>>,
    }

    impl FakeLoginPage {
        fn new(accept_credentials: bool) -> Self {
            Self {
                logged_in: Mutex::new(false),
                accept_credentials,
                filled: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl Page for FakeLoginPage {
        async fn navigate(&self, _url: &str) -> Result<()> {
            Ok(())
        }
        async fn reload(&self) -> Result<()> {
            Ok(())
        }
        async fn current_url(&self) -> Result<String> {
            if *self.logged_in.lock().unwrap() {
                Ok("https://club.example.com/member/home".to_string())
            } else {
                Ok("https://club.example.com/login?clubid=1".to_string())
            }
        }
        async fn evaluate(&self, _script: &str) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
        async fn click(&self, selector: &str) -> Result<()> {
            if selector == SIGN_IN_BUTTON && self.accept_credentials {
                *self.logged_in.lock().unwrap() = true;
            }
            Ok(())
        }
        async fn fill(&self, selector: &str, value: &str) -> Result<()> {
            self.filled
                .lock()
                .unwrap()
                .push((selector.to_string(), value.to_string()));
            Ok(())
        }
        async fn wait_for(&self, _selector: &str, _timeout: Duration) -> Result<()> {
            Ok(())
        }
        async fn count(&self, selector: &str) -> Result<u64> {
            let logged_in = *self.logged_in.lock().unwrap();
            if selector == USERNAME_FIELD {
                Ok(u64::from(!logged_in))
            } else if selector == LOGGED_IN_MARKERS {
                Ok(u64::from(logged_in))
            } else {
                Ok(0)
            }
        }
    }

    fn credentials() -> Credentials {
        Credentials {
            username: "golfer@example.com".to_string(),
            password: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn logs_in_and_verifies_signals() {
        let page = FakeLoginPage::new(true);
        let auth = Authenticator::new("https://club.example.com/login?clubid=1", credentials());

        auth.ensure_authenticated(&page).await.unwrap();

        let filled = page.filled.lock().unwrap();
        assert_eq!(filled.len(), 2);
        assert_eq!(filled[0].0, USERNAME_FIELD);
        assert_eq!(filled[1].0, PASSWORD_FIELD);
    }

    #[tokio::test]
    async fn rejected_credentials_are_an_auth_failure() {
        let page = FakeLoginPage::new(false);
        let auth = Authenticator::new("https://club.example.com/login?clubid=1", credentials());

        let err = auth.ensure_authenticated(&page).await.unwrap_err();
        assert!(matches!(err, TeatimeError::Auth(_)));
        // Auth failures are retried like any other transient navigation step
        assert!(err.is_transient());
    }
}
