//! Login-flow state machine
//!
//! Classifies the stream of navigation observations produced while loading
//! the catalog page and decides what the browser shell should do next. The
//! flow is a closed state machine so it can be exercised with synthetic
//! navigation events, without a real browser.
//!
//! No timeout is enforced here; a challenge step can sit unresolved for as
//! long as the user takes to complete it out-of-band.

use serde::{Deserialize, Serialize};
use url::Url;

/// Where the login flow currently believes the session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoginState {
    /// No classified observation yet.
    Unknown,
    /// The sign-in form is showing.
    AtLogin,
    /// A verification/challenge page is showing; the user completes it
    /// out-of-band while we keep observing.
    AtChallenge,
    /// The post-login landing page was reached.
    AtHome,
    /// The catalog page itself was reached. Terminal.
    Authenticated,
}

/// What the browser shell should do after an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginAction {
    /// Stay subscribed and wait for the next navigation.
    Observe,
    /// Re-issue a load of the catalog URL.
    LoadCatalog,
    /// Force-navigate to the sign-in URL.
    LoadLogin,
    /// Target reached; unsubscribe from navigation events.
    Finish,
}

/// The fixed URLs the flow classifies against.
#[derive(Debug, Clone)]
pub struct LoginEndpoints {
    pub catalog: Url,
    pub sign_in: Url,
    pub challenge: Url,
    pub home: Url,
}

/// Multi-step login flow over navigation observations.
#[derive(Debug, Clone)]
pub struct LoginFlow {
    state: LoginState,
    endpoints: LoginEndpoints,
}

impl LoginFlow {
    pub fn new(endpoints: LoginEndpoints) -> Self {
        Self {
            state: LoginState::Unknown,
            endpoints,
        }
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == LoginState::Authenticated
    }

    /// Feed one observed navigation URL and get the next action.
    ///
    /// Classification is by URL path against the configured endpoints; any
    /// host other than the catalog's is treated as having been bounced off
    /// the site entirely.
    pub fn observe(&mut self, navigated: &Url) -> LoginAction {
        if self.state == LoginState::Authenticated {
            return LoginAction::Finish;
        }

        if navigated.host_str() != self.endpoints.catalog.host_str() {
            tracing::warn!(host = ?navigated.host_str(), "navigation left the catalog host");
            self.state = LoginState::Unknown;
            return LoginAction::LoadLogin;
        }

        let path = navigated.path();
        if path == self.endpoints.catalog.path() {
            tracing::info!("catalog page reached, session is authenticated");
            self.state = LoginState::Authenticated;
            LoginAction::Finish
        } else if path == self.endpoints.sign_in.path() {
            tracing::info!("sign-in form showing, waiting for user");
            self.state = LoginState::AtLogin;
            LoginAction::Observe
        } else if path == self.endpoints.challenge.path() {
            tracing::info!("sign-in challenge showing, waiting for out-of-band approval");
            self.state = LoginState::AtChallenge;
            LoginAction::Observe
        } else if path == self.endpoints.home.path() {
            tracing::info!("post-login landing page reached, reloading catalog");
            self.state = LoginState::AtHome;
            LoginAction::LoadCatalog
        } else {
            LoginAction::Observe
        }
    }
}
