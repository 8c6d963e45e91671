//! Session gate over an external browser shell
//!
//! The crawler itself never renders a login page; an embedded browser (the
//! presentation collaborator) does, and reports every navigation it lands
//! on. This module drives the [`LoginFlow`] state machine over that stream
//! until the catalog page is reachable, then captures the cookie header and
//! user agent as the read-only session context every subsequent request
//! carries.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{info, warn};
use url::Url;

use crate::domain::login_flow::{LoginAction, LoginEndpoints, LoginFlow};
use crate::infrastructure::config::amazon_vine;

/// Authenticated request context, immutable for the duration of a refresh.
#[derive(Debug, Clone)]
pub struct SessionContext {
    /// `name=value; name=value` cookie header captured from the shell.
    pub cookie_header: String,
    /// The shell's user agent, reused verbatim so crawl requests are
    /// indistinguishable from page loads.
    pub user_agent: String,
}

/// The embedded browser the collaborator owns.
///
/// `load` issues a navigation; completed navigations (including redirects)
/// are reported on the channel handed to
/// [`SessionGate::ensure_authenticated`].
#[async_trait]
pub trait BrowserShell: Send + Sync {
    async fn load(&self, url: &str) -> Result<()>;
    async fn cookie_header(&self) -> Result<String>;
    fn user_agent(&self) -> String;
}

/// Drives the login flow to completion against a browser shell.
pub struct SessionGate {
    flow: LoginFlow,
}

impl SessionGate {
    pub fn new() -> Self {
        Self {
            flow: LoginFlow::new(default_endpoints()),
        }
    }

    pub fn with_endpoints(endpoints: LoginEndpoints) -> Self {
        Self {
            flow: LoginFlow::new(endpoints),
        }
    }

    /// Load the catalog URL and follow navigation observations until the
    /// catalog path is reached. Unsubscribes (returns) only then; there is
    /// no internal timeout, the caller may impose one.
    pub async fn ensure_authenticated<S>(
        &mut self,
        shell: &S,
        navigations: &mut mpsc::Receiver<String>,
    ) -> Result<SessionContext>
    where
        S: BrowserShell + ?Sized,
    {
        shell
            .load(amazon_vine::CATALOG_URL)
            .await
            .context("Failed to load catalog page")?;

        while let Some(site) = navigations.recv().await {
            let parsed = match Url::parse(&site) {
                Ok(parsed) => parsed,
                Err(err) => {
                    warn!(%site, %err, "ignoring unparseable navigation");
                    continue;
                }
            };

            match self.flow.observe(&parsed) {
                LoginAction::Observe => {}
                LoginAction::LoadCatalog => {
                    shell
                        .load(amazon_vine::CATALOG_URL)
                        .await
                        .context("Failed to reload catalog page")?;
                }
                LoginAction::LoadLogin => {
                    shell
                        .load(amazon_vine::SIGN_IN_URL)
                        .await
                        .context("Failed to load sign-in page")?;
                }
                LoginAction::Finish => {
                    let context = SessionContext {
                        cookie_header: shell
                            .cookie_header()
                            .await
                            .context("Failed to read session cookies")?,
                        user_agent: shell.user_agent(),
                    };
                    info!("session authenticated");
                    return Ok(context);
                }
            }
        }

        bail!("navigation stream ended before authentication completed")
    }
}

impl Default for SessionGate {
    fn default() -> Self {
        Self::new()
    }
}

fn default_endpoints() -> LoginEndpoints {
    LoginEndpoints {
        catalog: Url::parse(amazon_vine::CATALOG_URL).expect("valid constant URL"),
        sign_in: Url::parse(amazon_vine::SIGN_IN_URL).expect("valid constant URL"),
        challenge: Url::parse(amazon_vine::CHALLENGE_URL).expect("valid constant URL"),
        home: Url::parse(amazon_vine::HOME_URL).expect("valid constant URL"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingShell {
        loads: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BrowserShell for RecordingShell {
        async fn load(&self, url: &str) -> Result<()> {
            self.loads.lock().unwrap().push(url.to_string());
            Ok(())
        }

        async fn cookie_header(&self) -> Result<String> {
            Ok("session-id=abc123; ubid-main=xyz".to_string())
        }

        fn user_agent(&self) -> String {
            "Mozilla/5.0 (test)".to_string()
        }
    }

    #[tokio::test]
    async fn logged_in_session_authenticates_on_first_navigation() {
        let shell = RecordingShell::default();
        let (tx, mut rx) = mpsc::channel(8);
        tx.send(amazon_vine::CATALOG_URL.to_string()).await.unwrap();

        let mut gate = SessionGate::new();
        let context = gate.ensure_authenticated(&shell, &mut rx).await.unwrap();

        assert_eq!(context.cookie_header, "session-id=abc123; ubid-main=xyz");
        assert_eq!(context.user_agent, "Mozilla/5.0 (test)");
        // Only the initial catalog probe was issued.
        assert_eq!(*shell.loads.lock().unwrap(), vec![amazon_vine::CATALOG_URL]);
    }

    #[tokio::test]
    async fn login_sequence_reloads_catalog_from_home_page() {
        let shell = RecordingShell::default();
        let (tx, mut rx) = mpsc::channel(8);
        for site in [
            amazon_vine::SIGN_IN_URL,
            amazon_vine::CHALLENGE_URL,
            amazon_vine::HOME_URL,
            amazon_vine::CATALOG_URL,
        ] {
            tx.send(site.to_string()).await.unwrap();
        }

        let mut gate = SessionGate::new();
        gate.ensure_authenticated(&shell, &mut rx).await.unwrap();

        let loads = shell.loads.lock().unwrap();
        // Initial probe, then the reload triggered by the landing page.
        assert_eq!(
            *loads,
            vec![amazon_vine::CATALOG_URL, amazon_vine::CATALOG_URL]
        );
    }

    #[tokio::test]
    async fn foreign_host_is_redirected_to_sign_in() {
        let shell = RecordingShell::default();
        let (tx, mut rx) = mpsc::channel(8);
        tx.send("https://ads.example.net/landing".to_string())
            .await
            .unwrap();
        tx.send(amazon_vine::CATALOG_URL.to_string()).await.unwrap();

        let mut gate = SessionGate::new();
        gate.ensure_authenticated(&shell, &mut rx).await.unwrap();

        let loads = shell.loads.lock().unwrap();
        assert_eq!(loads[1], amazon_vine::SIGN_IN_URL);
    }

    #[tokio::test]
    async fn closed_navigation_stream_is_an_error() {
        let shell = RecordingShell::default();
        let (tx, mut rx) = mpsc::channel::<String>(1);
        drop(tx);

        let mut gate = SessionGate::new();
        let result = gate.ensure_authenticated(&shell, &mut rx).await;
        assert!(result.is_err());
    }
}
