//! Zefest - client core for the Zefest deposit/withdrawal mobile app
//! Application shell owning the update flow and the back navigation guard

pub mod engine;

use engine::api::ApiClient;
use engine::config::ClientConfig;
use engine::navigation::{BackAction, BackGuard, NavigationHost, SignalSource};
use engine::storage::KeyValueStore;
use engine::updater::download::PackageSource;
use engine::updater::host::DeliveryHost;
use engine::updater::{DeliveryTask, UpdateController, UpdateOffer};
use std::sync::Arc;
use tracing::info;

/// Top-level shell; the UI host builds one and forwards its events here
pub struct AppShell {
    config: ClientConfig,
    store: Arc<dyn KeyValueStore>,
    api: ApiClient,
    updates: UpdateController,
    back_guard: BackGuard,
    navigation_host: Arc<dyn NavigationHost>,
}

impl AppShell {
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn KeyValueStore>,
        delivery_host: Arc<dyn DeliveryHost>,
        package_source: Arc<dyn PackageSource>,
        navigation_host: Arc<dyn NavigationHost>,
    ) -> Self {
        let api = ApiClient::new(&config.api, store.clone());
        let updates = UpdateController::new(
            &config.update,
            store.clone(),
            delivery_host,
            package_source,
        );
        let back_guard = BackGuard::new(
            config.navigation.clone(),
            store.clone(),
            navigation_host.clone(),
        );

        Self {
            config,
            store,
            api,
            updates,
            back_guard,
            navigation_host,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn updates(&self) -> &UpdateController {
        &self.updates
    }

    /// Mount: start intercepting back signals
    pub fn start(&self) {
        self.back_guard.start();
        info!("app shell started");
    }

    /// Unmount: release every listener
    pub fn stop(&self) {
        self.back_guard.stop();
        info!("app shell stopped");
    }

    pub fn route_changed(&self, route: &str) {
        self.back_guard.route_changed(route);
    }

    pub fn back_signal(&self, source: SignalSource) -> BackAction {
        self.back_guard.on_back_signal(source)
    }

    pub fn is_authenticated(&self) -> bool {
        engine::session::is_authenticated(self.store.as_ref())
    }

    pub async fn check_for_update(&self) -> Option<UpdateOffer> {
        self.updates.check().await
    }

    /// "Download" on the prompt; the prompt closes regardless of the outcome
    pub fn accept_update(&self, offer: &UpdateOffer) -> DeliveryTask {
        self.updates.download(offer)
    }

    /// "Later" on the prompt
    pub fn dismiss_update(&self, offer: &UpdateOffer) {
        self.updates.dismiss(offer)
    }

    /// Clear the session and send the user to the login screen
    pub fn logout(&self) -> Result<(), engine::storage::StorageError> {
        engine::session::logout(self.store.as_ref())?;
        self.navigation_host.navigate(&self.config.navigation.login_route);
        Ok(())
    }
}
