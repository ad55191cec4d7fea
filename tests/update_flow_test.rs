use axum::{http::StatusCode, routing::get, Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use zefest_lib::engine::config::UpdateConfig;
use zefest_lib::engine::platform::DesktopHost;
use zefest_lib::engine::storage::{KeyValueStore, MemoryStore, StorageKey};
use zefest_lib::engine::updater::download::Downloader;
use zefest_lib::engine::updater::state::AttemptOutcome;
use zefest_lib::engine::updater::{DeliveryMethod, DeliveryStatus, UpdateController};

const PACKAGE_BYTES: &[u8] = b"PK\x03\x04zefest-release";

async fn serve_release(version: &'static str, force: bool) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let apk_url = format!("http://{}/app.apk", addr);
    let app = Router::new()
        .route(
            "/manifest.json",
            get(move || {
                let apk_url = apk_url.clone();
                async move {
                    Json(json!({
                        "android_version": version,
                        "apk_url": apk_url,
                        "force": force,
                    }))
                }
            }),
        )
        .route("/app.apk", get(|| async { PACKAGE_BYTES }))
        .route("/missing.apk", get(|| async { StatusCode::NOT_FOUND }));

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn update_config(addr: SocketAddr) -> UpdateConfig {
    UpdateConfig {
        manifest_url: format!("http://{}/manifest.json", addr),
        bundled_version: "1.0.0".to_string(),
        method_timeout_secs: 5,
        ..UpdateConfig::default()
    }
}

#[tokio::test]
async fn test_check_download_and_recheck() {
    let addr = serve_release("1.2.0", false).await;
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let host = DesktopHost::new()
        .with_download_dir(dir.path())
        .without_opener();

    let controller = UpdateController::new(
        &update_config(addr),
        store.clone(),
        Arc::new(host),
        Arc::new(Downloader::new()),
    );

    let offer = controller.check().await.expect("update should be offered");
    assert_eq!(offer.version, "1.2.0");
    assert!(!offer.forced);
    assert_eq!(offer.package_url, format!("http://{}/app.apk", addr));

    let task = controller.download(&offer);
    let report = task.wait().await.expect("delivery task should finish");

    // Every capability before the blob method is absent on a desktop host without an opener
    assert_eq!(report.delivered_by(), Some(DeliveryMethod::BlobDownload));
    assert_eq!(report.attempts.len(), 5);
    let saved = std::fs::read(dir.path().join("app-update.apk")).unwrap();
    assert_eq!(saved, PACKAGE_BYTES);

    assert_eq!(
        store.get(StorageKey::InstalledVersion).as_deref(),
        Some("1.2.0")
    );
    assert!(controller.check().await.is_none());
}

#[tokio::test]
async fn test_dismissed_offer_stays_hidden_until_forced() {
    let addr = serve_release("2.0.0", false).await;
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let controller = UpdateController::new(
        &update_config(addr),
        store.clone(),
        Arc::new(DesktopHost::new().without_opener()),
        Arc::new(Downloader::new()),
    );

    let offer = controller.check().await.unwrap();
    controller.dismiss(&offer);
    assert!(controller.check().await.is_none());

    let forced_addr = serve_release("2.0.0", true).await;
    let forced = UpdateController::new(
        &update_config(forced_addr),
        store,
        Arc::new(DesktopHost::new().without_opener()),
        Arc::new(Downloader::new()),
    );
    // Dismissal outranks the force flag
    assert!(forced.check().await.is_none());
}

#[tokio::test]
async fn test_forced_offer_shown_for_older_version() {
    let addr = serve_release("0.9.0", true).await;
    let controller = UpdateController::new(
        &update_config(addr),
        Arc::new(MemoryStore::new()),
        Arc::new(DesktopHost::new().without_opener()),
        Arc::new(Downloader::new()),
    );

    let offer = controller.check().await.unwrap();
    assert!(offer.forced);
    assert_eq!(offer.version, "0.9.0");
}

#[tokio::test]
async fn test_missing_package_falls_back() {
    let addr = serve_release("1.2.0", false).await;
    let dir = tempfile::tempdir().unwrap();
    let controller = UpdateController::new(
        &update_config(addr),
        Arc::new(MemoryStore::new()),
        Arc::new(
            DesktopHost::new()
                .with_download_dir(dir.path())
                .without_opener(),
        ),
        Arc::new(Downloader::new()),
    );

    let mut offer = controller.check().await.unwrap();
    offer.package_url = format!("http://{}/missing.apk", addr);

    let report = controller.download(&offer).wait().await.unwrap();
    assert_eq!(report.status, DeliveryStatus::ForcedFallback);
    assert_eq!(report.attempts.len(), DeliveryMethod::ORDER.len());
    assert!(!dir.path().join("app-update.apk").exists());
}

/// Answers every request with a two byte body behind a huge `Content-Length`
async fn serve_lying_package() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            let _ = socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\nContent-Length: 1000000000000000\r\nConnection: close\r\n\r\nPK",
                )
                .await;
            let _ = socket.shutdown().await;
        }
    });
    format!("http://{}/app.apk", addr)
}

#[tokio::test]
async fn test_oversized_package_falls_back() {
    let addr = serve_release("1.2.0", false).await;
    let dir = tempfile::tempdir().unwrap();
    let controller = UpdateController::new(
        &update_config(addr),
        Arc::new(MemoryStore::new()),
        Arc::new(
            DesktopHost::new()
                .with_download_dir(dir.path())
                .without_opener(),
        ),
        Arc::new(Downloader::new()),
    );

    let mut offer = controller.check().await.unwrap();
    offer.package_url = serve_lying_package().await;

    let report = controller.download(&offer).wait().await.unwrap();

    assert_eq!(report.status, DeliveryStatus::ForcedFallback);
    let blob = report
        .attempts
        .iter()
        .find(|a| a.method == DeliveryMethod::BlobDownload)
        .unwrap();
    assert!(matches!(blob.outcome, AttemptOutcome::Declined { .. }));
    assert!(!dir.path().join("app-update.apk").exists());
}

#[tokio::test]
async fn test_unreachable_manifest_hides_prompt() {
    let config = UpdateConfig {
        manifest_url: "http://127.0.0.1:1/manifest.json".to_string(),
        method_timeout_secs: 2,
        ..UpdateConfig::default()
    };
    let controller = UpdateController::new(
        &config,
        Arc::new(MemoryStore::new()),
        Arc::new(DesktopHost::new().without_opener()),
        Arc::new(Downloader::new()),
    );

    assert!(controller.check().await.is_none());
}
