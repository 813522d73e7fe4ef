//! Pairing chain behaviour against a local mock of the cloud service

use tvskip_api::{normalize_code, ApiConfig, Channels, PairingResult};

const PATHS: [&str; 4] = [
    "/api/lounge/pairing/get_screen",
    "/api/lounge/pairing/get_lounge_token_batch",
    "/api/lounge/pairing/get_screen_id",
    "/tv_remote_control/pairing",
];

fn channels(server: &mockito::Server) -> Channels {
    let config = ApiConfig::default().with_cloud_base_url(server.url());
    Channels::from_config(&config).unwrap()
}

#[tokio::test]
async fn test_first_endpoint_pairs() {
    let mut server = mockito::Server::new_async().await;
    let first = server
        .mock("POST", PATHS[0])
        .match_body("pairing_code=123456789012")
        .with_status(200)
        .with_body(r#"{"screens":[{"lounge_token":"T1","name":"LivingRoom"}]}"#)
        .create_async()
        .await;
    let rest = server
        .mock("POST", PATHS[1])
        .expect(0)
        .create_async()
        .await;

    let code = normalize_code("123 456-789-012");
    let result = channels(&server).negotiator.negotiate(&code).await;

    match result {
        PairingResult::Paired(screen) => {
            assert_eq!(screen.token.as_str(), "T1");
            assert_eq!(screen.name.as_deref(), Some("LivingRoom"));
        }
        other => panic!("expected pairing, got {:?}", other),
    }
    first.assert_async().await;
    rest.assert_async().await;
}

#[tokio::test]
async fn test_rejection_halts_chain() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PATHS[0])
        .with_status(500)
        .create_async()
        .await;
    server
        .mock("POST", PATHS[1])
        .match_body("screen_ids=123456")
        .with_status(200)
        .with_body("INVALID")
        .create_async()
        .await;
    let untouched: Vec<_> = {
        let mut mocks = Vec::new();
        for path in &PATHS[2..] {
            mocks.push(server.mock("POST", *path).expect(0).create_async().await);
        }
        mocks
    };

    let result = channels(&server).negotiator.negotiate("123456").await;

    assert!(matches!(result, PairingResult::Rejected { ref endpoint, .. } if endpoint.ends_with(PATHS[1])));
    for mock in untouched {
        mock.assert_async().await;
    }
}

#[tokio::test]
async fn test_all_inconclusive_exhausts_chain() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", PATHS[0])
        .with_status(404)
        .create_async()
        .await;
    server
        .mock("POST", PATHS[1])
        .with_status(200)
        .with_body("")
        .create_async()
        .await;
    server
        .mock("POST", PATHS[2])
        .with_status(200)
        .with_body(r#"{"status":"pending"}"#)
        .create_async()
        .await;
    server
        .mock("POST", PATHS[3])
        .with_status(503)
        .create_async()
        .await;

    let result = channels(&server).negotiator.negotiate("123456").await;
    assert_eq!(result, PairingResult::Exhausted { attempts: 4 });
}

#[tokio::test]
async fn test_later_endpoint_nested_reply_pairs() {
    let mut server = mockito::Server::new_async().await;
    for path in &PATHS[..2] {
        server.mock("POST", *path).with_status(403).create_async().await;
    }
    server
        .mock("POST", PATHS[2])
        .with_status(200)
        .with_body(r#"{"status":"ok","data":{"loungeIdToken":"AGdO5p-nested","screenName":"Den"}}"#)
        .create_async()
        .await;

    let result = channels(&server).negotiator.negotiate("123456").await;

    match result {
        PairingResult::Paired(screen) => {
            assert_eq!(screen.token.as_str(), "AGdO5p-nested");
            assert_eq!(screen.name.as_deref(), Some("Den"));
        }
        other => panic!("expected pairing, got {:?}", other),
    }
}
