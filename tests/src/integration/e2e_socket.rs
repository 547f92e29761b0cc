//! # Socket End-to-End
//!
//! Runs the hub runtime on an ephemeral port and talks to it the way real
//! validators do: over a WebSocket, with JSON `{type, data}` frames.

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use futures_util::{SinkExt, StreamExt};
    use hub_coordinator::InMemoryRepository;
    use hub_runtime::config::HubConfig;
    use hub_runtime::storage::Storage;
    use hub_runtime::HubRuntime;
    use shared_crypto::Ed25519KeyPair;
    use shared_types::{
        decode, encode, CallbackId, CheckStatus, HubMessage, MonitoredTarget, ValidatorMessage,
    };
    use std::net::SocketAddr;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::watch;
    use tokio::task::JoinHandle;
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::{Error as WsError, Message};
    use tokio_tungstenite::connect_async;
    use validator_node::config::ValidatorConfig;
    use validator_node::{signed_report, signup_request, ProbeResult, Prober, ValidatorClient};

    const WAIT: Duration = Duration::from_secs(5);

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    struct Hub {
        runtime: Arc<HubRuntime>,
        repo: Arc<InMemoryRepository>,
        addr: SocketAddr,
    }

    impl Hub {
        fn ws_url(&self) -> String {
            format!("ws://{}", self.addr)
        }

        fn http_url(&self, path: &str) -> String {
            format!("http://{}{}", self.addr, path)
        }
    }

    impl Drop for Hub {
        fn drop(&mut self) {
            self.runtime.shutdown();
        }
    }

    fn hub_config() -> HubConfig {
        let mut config = HubConfig::default();
        config.geolocation.enabled = false;
        config
    }

    async fn start_hub() -> Hub {
        start_hub_with(hub_config()).await
    }

    async fn start_hub_with(config: HubConfig) -> Hub {
        let repo = Arc::new(InMemoryRepository::new());
        let runtime = Arc::new(
            HubRuntime::with_storage(config, Storage::from_store(repo.clone())).unwrap(),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        {
            let runtime = Arc::clone(&runtime);
            tokio::spawn(async move { runtime.serve(listener).await });
        }

        Hub {
            runtime,
            repo,
            addr,
        }
    }

    async fn eventually<F: Fn() -> bool>(condition: F) {
        timeout(WAIT, async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    fn next_hub_frame(frame: Option<Result<Message, WsError>>) -> HubMessage {
        match frame {
            Some(Ok(Message::Text(text))) => decode::<HubMessage>(text.as_str()).unwrap(),
            other => panic!("unexpected frame {:?}", other),
        }
    }

    fn spawn_validator(
        hub: &Hub,
        result: ProbeResult,
    ) -> (watch::Sender<bool>, JoinHandle<bool>) {
        let config = ValidatorConfig {
            hub_url: hub.ws_url(),
            advertised_ip: "127.0.0.1".into(),
            probe_timeout: Duration::from_secs(1),
            max_reconnect_attempts: 1,
            private_key: None,
        };
        let client = ValidatorClient::new(
            config,
            Ed25519KeyPair::generate(),
            Arc::new(FixedProber(result)),
        );
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(async move { client.run(shutdown_rx).await.is_ok() });
        (shutdown_tx, task)
    }

    struct FixedProber(ProbeResult);

    #[async_trait]
    impl Prober for FixedProber {
        async fn probe(&self, _url: &str) -> ProbeResult {
            self.0
        }
    }

    // =============================================================================
    // HTTP SURFACE
    // =============================================================================

    #[tokio::test]
    async fn test_health_and_upgrade_required() {
        let hub = start_hub().await;
        let client = reqwest::Client::new();

        let health = client.get(hub.http_url("/health")).send().await.unwrap();
        assert_eq!(health.status().as_u16(), 200);
        let body: serde_json::Value = health.json().await.unwrap();
        assert_eq!(body["status"], "ok");

        let plain = client.get(hub.http_url("/")).send().await.unwrap();
        assert_eq!(plain.status().as_u16(), 426);
    }

    // =============================================================================
    // RAW WEBSOCKET VALIDATOR
    // =============================================================================

    #[tokio::test]
    async fn test_raw_socket_exchange_records_observation() {
        let hub = start_hub().await;
        let target = MonitoredTarget::new("https://example.com", "owner-1");
        let target_id = target.id;
        hub.repo.insert_target(target);

        let (socket, _) = connect_async(hub.ws_url()).await.unwrap();
        let (mut write, mut read) = socket.split();
        let keypair = Ed25519KeyPair::generate();

        let signup = ValidatorMessage::Signup(signup_request(
            &keypair,
            CallbackId::from("join-1"),
            "127.0.0.1",
        ));
        write
            .send(Message::Text(encode(&signup).unwrap().into()))
            .await
            .unwrap();

        let ack = next_hub_frame(timeout(WAIT, read.next()).await.unwrap());
        let HubMessage::Signup(ack) = ack else {
            panic!("expected signup ack, got {:?}", ack);
        };
        assert_eq!(ack.callback_id.as_str(), "join-1");

        hub.runtime.coordinator().run_round().await.unwrap();

        let request = next_hub_frame(timeout(WAIT, read.next()).await.unwrap());
        let HubMessage::Validate(request) = request else {
            panic!("expected validate, got {:?}", request);
        };
        assert_eq!(request.website_id, target_id);

        let result = ProbeResult {
            status: CheckStatus::Good,
            latency_ms: 42,
        };
        let report = ValidatorMessage::Validate(signed_report(
            &keypair,
            &request,
            Some(ack.validator_id),
            result,
        ));
        write
            .send(Message::Text(encode(&report).unwrap().into()))
            .await
            .unwrap();

        let repo = Arc::clone(&hub.repo);
        eventually(|| repo.observation_count() == 1).await;
        let observations = hub.repo.observations();
        let observation = &observations[0];
        assert_eq!(observation.validator_id, ack.validator_id);
        assert_eq!(observation.latency_ms, 42);
        assert_eq!(hub.repo.pending_payout(ack.validator_id), Some(100));
    }

    #[tokio::test]
    async fn test_socket_close_releases_validator() {
        let hub = start_hub().await;

        let (mut socket, _) = connect_async(hub.ws_url()).await.unwrap();
        let signup = ValidatorMessage::Signup(signup_request(
            &Ed25519KeyPair::generate(),
            CallbackId::from("join"),
            "127.0.0.1",
        ));
        socket
            .send(Message::Text(encode(&signup).unwrap().into()))
            .await
            .unwrap();
        timeout(WAIT, socket.next()).await.unwrap();

        let coordinator = Arc::clone(hub.runtime.coordinator());
        eventually(|| coordinator.registry().len() == 1).await;

        socket.close(None).await.unwrap();
        eventually(|| coordinator.registry().is_empty()).await;
    }

    // =============================================================================
    // VALIDATOR CLIENT
    // =============================================================================

    #[tokio::test]
    async fn test_validator_client_against_hub() {
        let hub = start_hub().await;
        hub.repo
            .insert_target(MonitoredTarget::new("https://example.com", "owner-1"));

        let (shutdown_tx, task) = spawn_validator(&hub, ProbeResult::failed());

        let coordinator = Arc::clone(hub.runtime.coordinator());
        eventually(|| coordinator.registry().len() == 1).await;

        let summary = coordinator.run_round().await.unwrap();
        assert_eq!(summary.dispatched, 1);

        let repo = Arc::clone(&hub.repo);
        eventually(|| repo.observation_count() == 1).await;
        let observations = hub.repo.observations();
        let observation = &observations[0];
        assert_eq!(observation.status, CheckStatus::Bad);
        assert_eq!(observation.latency_ms, 1000);

        shutdown_tx.send(true).unwrap();
        assert!(timeout(WAIT, task).await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn test_round_larger_than_rate_limit_is_fully_recorded() {
        let mut config = hub_config();
        config.server.websocket.rate_limit = 5;
        let hub = start_hub_with(config).await;
        for i in 0..40 {
            hub.repo.insert_target(MonitoredTarget::new(
                format!("https://site-{}.example", i),
                "owner-1",
            ));
        }

        let good = ProbeResult {
            status: CheckStatus::Good,
            latency_ms: 7,
        };
        let (shutdown_tx, task) = spawn_validator(&hub, good);

        let coordinator = Arc::clone(hub.runtime.coordinator());
        eventually(|| coordinator.registry().len() == 1).await;

        let summary = coordinator.run_round().await.unwrap();
        assert_eq!(summary.dispatched, 40);

        let repo = Arc::clone(&hub.repo);
        eventually(|| repo.observation_count() == 40).await;
        assert_eq!(coordinator.callbacks().pending_count(), 0);
        let validator_id = hub.repo.observations()[0].validator_id;
        assert_eq!(hub.repo.pending_payout(validator_id), Some(4000));

        shutdown_tx.send(true).unwrap();
        assert!(timeout(WAIT, task).await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn test_idle_validator_kept_alive_by_pings() {
        let mut config = hub_config();
        config.server.websocket.idle_timeout = Duration::from_secs(1);
        config.server.websocket.ping_interval = Duration::from_millis(200);
        let hub = start_hub_with(config).await;

        let (shutdown_tx, task) = spawn_validator(&hub, ProbeResult::failed());

        let coordinator = Arc::clone(hub.runtime.coordinator());
        eventually(|| coordinator.registry().len() == 1).await;
        let admitted = coordinator.registry().snapshot()[0].connection_id;

        tokio::time::sleep(Duration::from_millis(2500)).await;

        assert_eq!(coordinator.registry().len(), 1);
        assert_eq!(coordinator.registry().snapshot()[0].connection_id, admitted);
        assert!(!task.is_finished());

        shutdown_tx.send(true).unwrap();
        assert!(timeout(WAIT, task).await.unwrap().unwrap());
    }
}
