//! End-to-end coordinator behaviour against a local mock of the cloud,
//! DIAL and segment services

use std::sync::Arc;
use std::time::Duration;

use mockito::{Matcher, Server};
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tvskip::{
    ApiConfig, ConnectionStatus, Coordinator, DiscoveryConfig, MonitorConfig, StatsSink, TvSkipConfig, TvSkipError,
};
use tvskip_api::PairingEndpoint;

const SCREEN_PATH: &str = "/api/lounge/pairing/get_screen";
const BIND_PATH: &str = "/api/lounge/bc/bind";

#[derive(Default)]
struct RecordingStats(Mutex<Vec<(f64, String)>>);

impl StatsSink for RecordingStats {
    fn record_skip(&self, duration: f64, category: &str) {
        self.0.lock().push((duration, category.to_string()));
    }
}

fn fast_monitor() -> MonitorConfig {
    MonitorConfig {
        session_interval: Duration::from_millis(50),
        idle_interval: Duration::from_millis(50),
    }
}

/// Discovery that finishes almost immediately without touching the network
fn quiet_discovery() -> DiscoveryConfig {
    DiscoveryConfig::default()
        .with_ssdp(false)
        .with_probe_hosts(vec![])
        .with_window(Duration::from_secs(2))
}

fn config_for(server: &Server) -> TvSkipConfig {
    TvSkipConfig::default()
        .with_api(
            ApiConfig::default()
                .with_cloud_base_url(server.url())
                .with_segments_base_url(server.url()),
        )
        .with_monitor(fast_monitor())
        .with_discovery(quiet_discovery())
}

async fn wait_until<F: Fn() -> bool>(condition: F) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(30)).await;
    }
    condition()
}

#[tokio::test]
async fn test_paired_session_skips_sponsor() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", SCREEN_PATH)
        .match_body("pairing_code=123456789012")
        .with_status(200)
        .with_body(r#"{"screens":[{"lounge_token":"T1","name":"LivingRoom"}]}"#)
        .create_async()
        .await;
    let announce = server
        .mock("POST", BIND_PATH)
        .match_body(Matcher::Regex("loungeIdToken=T1&count=0&req0_newClientConnected=".into()))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    let confirm = server
        .mock("POST", BIND_PATH)
        .match_body(Matcher::Regex("loungeIdToken=T1&count=1&req0_clientConnected=true$".into()))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;
    let binding = server
        .mock("POST", BIND_PATH)
        .match_body(Matcher::Regex("loungeIdToken=T1&count=0&req0_nowplayingUpdated=true$".into()))
        .with_status(200)
        .with_body(r#"[[2,["nowPlaying",{"videoId":"dQw4w9WgXcQ","currentTime":"12.5","duration":"212"}]]]"#)
        .expect(1)
        .create_async()
        .await;
    server
        .mock("POST", BIND_PATH)
        .match_body(Matcher::Regex("lounge_token=T1&req0_getPlayerInfo=1".into()))
        .with_status(200)
        .with_body(r#"[[5,["nowPlaying",{"videoId":"dQw4w9WgXcQ","currentTime":"12.5","duration":"212"}]]]"#)
        .create_async()
        .await;
    let segments = server
        .mock("GET", "/api/skipSegments")
        .match_query(Matcher::UrlEncoded("videoID".into(), "dQw4w9WgXcQ".into()))
        .with_status(200)
        .with_body(r#"[{"category":"sponsor","segment":[30.0,75.0],"UUID":"abc","videoDuration":212}]"#)
        .expect(1)
        .create_async()
        .await;
    let seek = server
        .mock("POST", BIND_PATH)
        .match_body(Matcher::Regex("lounge_token=T1&req0_seekTo=75$".into()))
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let stats = Arc::new(RecordingStats::default());
    let coordinator = Coordinator::builder()
        .config(config_for(&server))
        .stats_sink(stats.clone())
        .build()
        .unwrap();

    let device = coordinator.connect("123 456-789-012").await.unwrap();

    assert_eq!(device.id, "123456789012");
    assert_eq!(device.name, "LivingRoom");
    assert!(!device.synthetic_session);
    assert!(device.has_capability("sponsorblock"));
    assert_eq!(coordinator.status(), ConnectionStatus::Connected);

    assert!(wait_until(|| !stats.0.lock().is_empty()).await);
    // Let further ticks run; the same content must not trigger a second skip
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(*stats.0.lock(), vec![(45.0, "sponsor".to_string())]);
    let playback = coordinator.playback().unwrap();
    assert_eq!(playback.content_id, "dQw4w9WgXcQ");
    assert_eq!(playback.position, Some(12.5));

    announce.assert_async().await;
    confirm.assert_async().await;
    binding.assert_async().await;
    segments.assert_async().await;
    seek.assert_async().await;
    coordinator.shutdown();
}

#[tokio::test]
async fn test_repairing_announces_stored_token() {
    let mut server = Server::new_async().await;
    let first_screen = server
        .mock("POST", SCREEN_PATH)
        .with_status(200)
        .with_body(r#"{"screens":[{"lounge_token":"T1","name":"LivingRoom"}]}"#)
        .create_async()
        .await;
    let announce_stored = server
        .mock("POST", BIND_PATH)
        .match_body(Matcher::Regex("loungeIdToken=T1&count=0&req0_newClientConnected=".into()))
        .with_status(200)
        .expect(2)
        .create_async()
        .await;
    let fresh_token = server
        .mock("POST", BIND_PATH)
        .match_body(Matcher::Regex("T2".into()))
        .expect(0)
        .create_async()
        .await;

    let coordinator = Coordinator::new(config_for(&server)).unwrap();
    coordinator.connect("123456").await.unwrap();
    coordinator.disconnect_device("123456").unwrap();

    first_screen.remove_async().await;
    server
        .mock("POST", SCREEN_PATH)
        .with_status(200)
        .with_body(r#"{"screens":[{"lounge_token":"T2","name":"LivingRoom"}]}"#)
        .create_async()
        .await;

    let device = coordinator.connect("123456").await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(device.connected);
    assert_eq!(device.session.as_ref().map(|t| t.as_str()), Some("T1"));
    announce_stored.assert_async().await;
    fresh_token.assert_async().await;
    coordinator.shutdown();
}

#[tokio::test]
async fn test_rejection_sets_error_status() {
    let mut server = Server::new_async().await;
    server
        .mock("POST", SCREEN_PATH)
        .with_status(200)
        .with_body("INVALID")
        .create_async()
        .await;
    let later = server
        .mock("POST", Matcher::Regex("get_lounge_token_batch|get_screen_id|tv_remote_control".into()))
        .expect(0)
        .create_async()
        .await;

    let coordinator = Coordinator::new(config_for(&server)).unwrap();
    let result = coordinator.connect("123456").await;

    assert!(matches!(result, Err(TvSkipError::PairingRejected(_))));
    assert!(matches!(coordinator.status(), ConnectionStatus::Error(_)));
    assert!(coordinator.registry().is_empty());
    later.assert_async().await;
}

#[tokio::test]
async fn test_exhausted_chain_falls_back_to_synthetic_session() {
    let mut server = Server::new_async().await;
    let bind = server.mock("POST", BIND_PATH).expect(0).create_async().await;

    // Unmatched requests get a 501 from the mock server, so every endpoint is inconclusive
    let coordinator = Coordinator::new(config_for(&server)).unwrap();
    let device = coordinator.connect("987-654").await.unwrap();

    assert!(device.synthetic_session);
    assert!(device.connected);
    assert_eq!(device.name, "TV");
    assert_eq!(device.session.as_ref().map(|t| t.as_str()), Some("offline-987654"));
    assert_eq!(coordinator.status(), ConnectionStatus::Connected);
    assert!(wait_until(|| coordinator.monitor_stats().first().is_some_and(|s| s.poll_count >= 2)).await);

    // Synthetic sessions never reach the cloud channel
    assert_eq!(coordinator.mute(), 1);
    tokio::time::sleep(Duration::from_millis(100)).await;
    bind.assert_async().await;
    coordinator.shutdown();
}

#[tokio::test]
async fn test_exhausted_chain_without_fallback_is_an_error() {
    let server = Server::new_async().await;
    let coordinator = Coordinator::new(config_for(&server).with_offline_fallback(false)).unwrap();

    let result = coordinator.connect("987654").await;

    assert!(matches!(result, Err(TvSkipError::PairingUnavailable)));
    assert_eq!(
        coordinator.status(),
        ConnectionStatus::Error("pairing service unavailable".to_string())
    );
    assert!(coordinator.registry().is_empty());
}

#[tokio::test]
async fn test_empty_code_is_rejected() {
    let coordinator = Coordinator::new(TvSkipConfig::offline()).unwrap();

    let result = coordinator.connect(" - -  ").await;

    assert!(matches!(result, Err(TvSkipError::InvalidCode)));
    assert!(matches!(coordinator.status(), ConnectionStatus::Error(_)));
    assert!(!coordinator.is_pairing());
}

#[tokio::test]
async fn test_second_connect_while_pairing() {
    // Accepts connections and never answers
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let chain = vec![PairingEndpoint::new(
        format!("http://{}/pair", addr),
        "pairing_code={code}",
        Duration::from_secs(1),
    )];
    let config = TvSkipConfig::default()
        .with_api(ApiConfig::default().with_pairing_chain(chain))
        .with_discovery(quiet_discovery());
    let coordinator = Coordinator::new(config).unwrap();

    let first = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.connect("111222").await })
    };
    assert!(wait_until(|| coordinator.is_pairing()).await);

    let second = coordinator.connect("333444").await;
    assert!(matches!(second, Err(TvSkipError::PairingInProgress)));
    assert_eq!(coordinator.status(), ConnectionStatus::Connecting);

    // Disconnecting while pairing discards the eventual result
    coordinator.disconnect();
    assert_eq!(coordinator.status(), ConnectionStatus::Disconnected);

    let first = first.await.unwrap();
    assert!(matches!(first, Err(TvSkipError::PairingCancelled)));
    assert_eq!(coordinator.status(), ConnectionStatus::Disconnected);
    assert!(coordinator.registry().is_empty());
    assert!(!coordinator.is_pairing());
}

#[tokio::test]
async fn test_disconnect_clears_everything() {
    let coordinator = Coordinator::new(TvSkipConfig::offline().with_monitor(fast_monitor())).unwrap();
    coordinator.connect("555 666").await.unwrap();
    assert_eq!(coordinator.monitor_stats().len(), 1);

    coordinator.disconnect();

    assert_eq!(coordinator.status(), ConnectionStatus::Disconnected);
    assert!(coordinator.registry().is_empty());
    assert!(coordinator.monitor_stats().is_empty());
    assert!(coordinator.playback().is_none());
    assert_eq!(coordinator.mute(), 0);
}

#[tokio::test]
async fn test_disconnect_device_keeps_record() {
    let coordinator = Coordinator::new(TvSkipConfig::offline().with_monitor(fast_monitor())).unwrap();
    coordinator.connect("555666").await.unwrap();

    coordinator.disconnect_device("555666").unwrap();

    assert_eq!(coordinator.status(), ConnectionStatus::Disconnected);
    let device = coordinator.registry().get("555666").unwrap();
    assert!(!device.connected);
    assert!(device.synthetic_session);
    assert!(matches!(
        coordinator.disconnect_device("nope"),
        Err(TvSkipError::DeviceNotFound(_))
    ));
}

#[tokio::test]
async fn test_discovery_returns_to_disconnected() {
    let coordinator = Coordinator::new(TvSkipConfig::offline().with_discovery(quiet_discovery())).unwrap();
    let mut status = coordinator.subscribe_status();

    coordinator.start_discovery().unwrap();
    assert_eq!(coordinator.status(), ConnectionStatus::Scanning);

    tokio::time::timeout(Duration::from_secs(3), status.wait_for(|s| *s == ConnectionStatus::Disconnected))
        .await
        .expect("discovery should end")
        .unwrap();
    assert!(wait_until(|| !coordinator.is_discovering()).await);
}

#[tokio::test]
async fn test_discovery_while_connected_keeps_status() {
    let coordinator = Coordinator::new(
        TvSkipConfig::offline()
            .with_monitor(fast_monitor())
            .with_discovery(quiet_discovery()),
    )
    .unwrap();
    coordinator.connect("555666").await.unwrap();

    coordinator.start_discovery().unwrap();
    assert_eq!(coordinator.status(), ConnectionStatus::Connected);

    assert!(wait_until(|| !coordinator.is_discovering()).await);
    assert_eq!(coordinator.status(), ConnectionStatus::Connected);
    coordinator.shutdown();
}

#[tokio::test]
async fn test_stop_discovery() {
    let discovery = DiscoveryConfig::default()
        .with_ssdp(false)
        .with_probe_hosts(vec![])
        .with_window(Duration::from_secs(30));
    let coordinator = Coordinator::new(TvSkipConfig::offline().with_discovery(discovery)).unwrap();

    assert!(!coordinator.stop_discovery());
    coordinator.start_discovery().unwrap();
    assert!(coordinator.stop_discovery());
    assert_eq!(coordinator.status(), ConnectionStatus::Disconnected);
}

#[tokio::test]
async fn test_skip_with_nothing_playing() {
    let coordinator = Coordinator::new(TvSkipConfig::offline()).unwrap();
    assert!(coordinator.skip().await.unwrap().is_none());
}
