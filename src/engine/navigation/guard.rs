//! Back Navigation Guard
//!
//! Intercepts hardware and browser back signals and redirects instead of letting
//! the host leave the app. An authenticated user can never exit through back
//! navigation; a signed-out user may only exit from the login or root screen.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::engine::config::NavigationConfig;
use crate::engine::session;
use crate::engine::storage::KeyValueStore;

/// Places a back signal can come from; hosts differ in which ones fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalSource {
    /// `backButton` event of the native app bridge
    NativeBridge,
    /// DOM `backbutton` on the document
    DocumentBackButton,
    /// DOM `backbutton` on the window
    WindowBackButton,
    /// History `popstate`
    PopState,
    /// Custom `mobileBackButton` event dispatched by the shell
    MobileBackButton,
}

impl SignalSource {
    pub const ALL: [SignalSource; 5] = [
        SignalSource::NativeBridge,
        SignalSource::DocumentBackButton,
        SignalSource::WindowBackButton,
        SignalSource::PopState,
        SignalSource::MobileBackButton,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ListenerId(pub u64);

/// History, routing and event registration offered by the UI host
pub trait NavigationHost: Send + Sync {
    /// Register a back listener; `None` when the source does not exist in this host
    fn add_back_listener(&self, source: SignalSource) -> Option<ListenerId>;
    fn remove_back_listener(&self, id: ListenerId);
    /// Push a no-op history entry so the native back action has nothing to pop
    fn push_history_entry(&self);
    fn navigate(&self, route: &str);
}

/// What the guard did with a back signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackAction {
    /// Authenticated on the dashboard: history neutralised, route unchanged
    StayOnDashboard,
    RedirectToDashboard,
    RedirectToLogin,
    /// Signed out on login or root: the host's native behaviour proceeds
    AllowExit,
    /// Repeat of a signal inside the debounce window
    Debounced,
    /// Guard not started
    Inactive,
}

impl BackAction {
    /// Whether the host must suppress its own back handling
    pub fn prevents_default(&self) -> bool {
        !matches!(self, BackAction::AllowExit | BackAction::Inactive)
    }
}

#[derive(Debug, Default)]
struct GuardState {
    started: bool,
    current_route: String,
    listeners: Vec<ListenerId>,
    last_handled: Option<Instant>,
}

pub struct BackGuard {
    config: NavigationConfig,
    store: Arc<dyn KeyValueStore>,
    host: Arc<dyn NavigationHost>,
    state: Mutex<GuardState>,
}

fn normalize_route(route: &str) -> &str {
    let trimmed = route.trim_end_matches('/');
    if trimmed.is_empty() {
        "/"
    } else {
        trimmed
    }
}

impl BackGuard {
    pub fn new(
        config: NavigationConfig,
        store: Arc<dyn KeyValueStore>,
        host: Arc<dyn NavigationHost>,
    ) -> Self {
        let state = GuardState {
            current_route: config.root_route.clone(),
            ..GuardState::default()
        };
        Self {
            config,
            store,
            host,
            state: Mutex::new(state),
        }
    }

    fn state(&self) -> MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register every available signal source; calling twice is a no-op
    pub fn start(&self) {
        let mut state = self.state();
        if state.started {
            return;
        }

        self.host.push_history_entry();
        for source in SignalSource::ALL {
            match self.host.add_back_listener(source) {
                Some(id) => state.listeners.push(id),
                None => debug!(?source, "back signal source not available"),
            }
        }
        state.started = true;
        info!(listeners = state.listeners.len(), "back navigation guard started");
    }

    /// Deregister all listeners
    pub fn stop(&self) {
        let mut state = self.state();
        if !state.started {
            return;
        }
        for id in state.listeners.drain(..) {
            self.host.remove_back_listener(id);
        }
        state.started = false;
        state.last_handled = None;
        info!("back navigation guard stopped");
    }

    pub fn is_started(&self) -> bool {
        self.state().started
    }

    pub fn listener_count(&self) -> usize {
        self.state().listeners.len()
    }

    pub fn route_changed(&self, route: &str) {
        self.state().current_route = route.to_string();
    }

    pub fn current_route(&self) -> String {
        self.state().current_route.clone()
    }

    /// Apply the transition rule to one intercepted signal.
    ///
    /// The host is called after the internal lock is released, so it may report
    /// route changes back synchronously.
    pub fn on_back_signal(&self, source: SignalSource) -> BackAction {
        let route = {
            let mut state = self.state();
            if !state.started {
                return BackAction::Inactive;
            }

            let now = Instant::now();
            if let Some(last) = state.last_handled {
                if now.duration_since(last) < self.config.debounce() {
                    debug!(?source, "back signal debounced");
                    return BackAction::Debounced;
                }
            }
            state.last_handled = Some(now);
            state.current_route.clone()
        };

        let action = self.decide(&route);
        debug!(?source, route = %route, ?action, "back signal handled");

        match action {
            BackAction::StayOnDashboard => self.host.push_history_entry(),
            BackAction::RedirectToDashboard => {
                self.host.push_history_entry();
                self.host.navigate(&self.config.dashboard_route);
            }
            BackAction::RedirectToLogin => {
                self.host.push_history_entry();
                self.host.navigate(&self.config.login_route);
            }
            _ => {}
        }
        action
    }

    fn decide(&self, route: &str) -> BackAction {
        let route = normalize_route(route);

        if session::is_authenticated(self.store.as_ref()) {
            return if route == normalize_route(&self.config.dashboard_route) {
                BackAction::StayOnDashboard
            } else {
                BackAction::RedirectToDashboard
            };
        }

        let on_exit_screen = route == normalize_route(&self.config.login_route)
            || route == normalize_route(&self.config.root_route);
        if on_exit_screen {
            BackAction::AllowExit
        } else {
            BackAction::RedirectToLogin
        }
    }

    pub fn debounce_window(&self) -> Duration {
        self.config.debounce()
    }
}

impl Drop for BackGuard {
    fn drop(&mut self) {
        self.stop();
    }
}
