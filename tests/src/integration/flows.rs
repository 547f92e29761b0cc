//! # Coordinator Flows
//!
//! Full validator lifecycles driven through `HubCoordinator::route` with
//! JSON frames, exactly as the socket handler feeds them:
//!
//! 1. **Signup → Round → Report**: one check recorded, payout credited
//! 2. **Reconnect**: the same key keeps its record and its old socket stops
//!    receiving work
//! 3. **Failure paths**: bad signatures and storage faults leave no trace

#[cfg(test)]
mod tests {
    use hub_coordinator::test_utils::{FaultyRepository, FixedGeolocator, RecordingSender};
    use hub_coordinator::{
        CoordinatorConfig, HubCoordinator, InMemoryRepository, MonitoringRepository, PeerHandle,
        ReportOutcome, RouteOutcome, SignupOutcome,
    };
    use shared_crypto::Ed25519KeyPair;
    use shared_types::{
        encode, CheckStatus, HubMessage, MonitoredTarget, ValidateRequest, ValidatorId,
        ValidatorMessage,
    };
    use std::sync::Arc;
    use validator_node::{signed_report, signup_request, ProbeResult};

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    fn hub(repository: Arc<dyn MonitoringRepository>) -> HubCoordinator {
        HubCoordinator::new(
            CoordinatorConfig::default(),
            repository,
            Arc::new(FixedGeolocator("Delhi".into())),
        )
        .unwrap()
    }

    fn connect() -> (PeerHandle, Arc<RecordingSender>) {
        let sender = Arc::new(RecordingSender::new());
        (PeerHandle::new(sender.clone()), sender)
    }

    async fn sign_up(
        coordinator: &HubCoordinator,
        peer: &PeerHandle,
        keypair: &Ed25519KeyPair,
        callback: &str,
    ) -> SignupOutcome {
        let frame = encode(&ValidatorMessage::Signup(signup_request(
            keypair,
            callback.into(),
            "127.0.0.1",
        )))
        .unwrap();
        match coordinator.route(peer, &frame).await {
            RouteOutcome::Signup(outcome) => outcome,
            other => panic!("expected signup outcome, got {:?}", other),
        }
    }

    async fn reply(
        coordinator: &HubCoordinator,
        peer: &PeerHandle,
        keypair: &Ed25519KeyPair,
        request: &ValidateRequest,
        result: ProbeResult,
    ) -> ReportOutcome {
        let frame = encode(&ValidatorMessage::Validate(signed_report(
            keypair, request, None, result,
        )))
        .unwrap();
        match coordinator.route(peer, &frame).await {
            RouteOutcome::Report(outcome) => outcome,
            other => panic!("expected report outcome, got {:?}", other),
        }
    }

    fn requests(sender: &RecordingSender) -> Vec<ValidateRequest> {
        sender
            .take_messages()
            .into_iter()
            .filter_map(|m| match m {
                HubMessage::Validate(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    fn admitted_id(outcome: SignupOutcome) -> ValidatorId {
        match outcome {
            SignupOutcome::Admitted { validator_id, .. } => validator_id,
            other => panic!("expected admission, got {:?}", other),
        }
    }

    fn good(latency_ms: u64) -> ProbeResult {
        ProbeResult {
            status: CheckStatus::Good,
            latency_ms,
        }
    }

    // =============================================================================
    // HAPPY PATH
    // =============================================================================

    #[tokio::test]
    async fn test_signup_round_report_records_and_pays() {
        let repo = Arc::new(InMemoryRepository::new());
        let target = MonitoredTarget::new("https://example.com", "owner-1");
        let target_id = target.id;
        repo.insert_target(target);
        let coordinator = hub(repo.clone());

        let keypair = Ed25519KeyPair::generate();
        let (peer, sender) = connect();
        let validator_id = admitted_id(sign_up(&coordinator, &peer, &keypair, "join-1").await);
        sender.take_messages();

        let summary = coordinator.run_round().await.unwrap();
        assert_eq!(summary.dispatched, 1);

        let pending = requests(&sender);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].url, "https://example.com");
        assert_eq!(pending[0].website_id, target_id);

        let outcome = reply(&coordinator, &peer, &keypair, &pending[0], good(42)).await;
        assert!(matches!(outcome, ReportOutcome::Recorded { .. }));

        let observations = repo.observations();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].target_id, target_id);
        assert_eq!(observations[0].validator_id, validator_id);
        assert_eq!(observations[0].status, CheckStatus::Good);
        assert_eq!(observations[0].latency_ms, 42);
        assert_eq!(repo.pending_payout(validator_id), Some(100));

        // The same reply again is unknown.
        let again = reply(&coordinator, &peer, &keypair, &pending[0], good(42)).await;
        assert_eq!(again, ReportOutcome::UnknownCallback);
        assert_eq!(repo.observation_count(), 1);
        assert_eq!(repo.pending_payout(validator_id), Some(100));
    }

    #[tokio::test]
    async fn test_payout_accumulates_over_rounds() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.insert_target(MonitoredTarget::new("https://a.example", "o"));
        repo.insert_target(MonitoredTarget::new("https://b.example", "o"));
        let coordinator = hub(repo.clone());

        let keypair = Ed25519KeyPair::generate();
        let (peer, sender) = connect();
        let validator_id = admitted_id(sign_up(&coordinator, &peer, &keypair, "join").await);
        sender.take_messages();

        for _ in 0..3 {
            coordinator.run_round().await.unwrap();
            for request in requests(&sender) {
                reply(&coordinator, &peer, &keypair, &request, ProbeResult::failed()).await;
            }
        }

        assert_eq!(repo.observation_count(), 6);
        assert_eq!(repo.pending_payout(validator_id), Some(600));
        assert!(repo
            .observations()
            .iter()
            .all(|o| o.status == CheckStatus::Bad && o.latency_ms == 1000));
    }

    // =============================================================================
    // RECONNECT
    // =============================================================================

    #[tokio::test]
    async fn test_reconnect_reuses_record_and_replaces_socket() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.insert_target(MonitoredTarget::new("https://example.com", "o"));
        let coordinator = hub(repo.clone());
        let keypair = Ed25519KeyPair::generate();

        let (first, first_sender) = connect();
        let first_id = admitted_id(sign_up(&coordinator, &first, &keypair, "a").await);

        let (second, second_sender) = connect();
        let outcome = sign_up(&coordinator, &second, &keypair, "b").await;
        let SignupOutcome::Admitted {
            validator_id,
            created,
            displaced,
        } = outcome
        else {
            panic!("expected admission");
        };
        assert_eq!(validator_id, first_id);
        assert!(!created);
        assert_eq!(displaced, Some(first.connection_id));
        assert_eq!(repo.validator_count(), 1);
        assert_eq!(coordinator.registry().len(), 1);

        first_sender.take_messages();
        second_sender.take_messages();
        coordinator.run_round().await.unwrap();

        assert!(requests(&first_sender).is_empty());
        assert_eq!(requests(&second_sender).len(), 1);
    }

    #[tokio::test]
    async fn test_disconnect_mid_round_drops_checks() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.insert_target(MonitoredTarget::new("https://example.com", "o"));
        let coordinator = hub(repo.clone());
        let keypair = Ed25519KeyPair::generate();

        let (peer, sender) = connect();
        sign_up(&coordinator, &peer, &keypair, "join").await;
        sender.take_messages();
        coordinator.run_round().await.unwrap();
        let pending = requests(&sender);

        let summary = coordinator.on_disconnect(peer.connection_id);
        assert_eq!(summary.swept, 1);
        assert!(coordinator.registry().is_empty());
        assert_eq!(coordinator.callbacks().pending_count(), 0);

        // A late reply on a fresh socket finds nothing to settle.
        let (late, _) = connect();
        let outcome = reply(&coordinator, &late, &keypair, &pending[0], good(5)).await;
        assert_eq!(outcome, ReportOutcome::UnknownCallback);
        assert_eq!(repo.observation_count(), 0);
    }

    // =============================================================================
    // FAILURE PATHS
    // =============================================================================

    #[tokio::test]
    async fn test_forged_report_leaves_no_rows() {
        let repo = Arc::new(InMemoryRepository::new());
        repo.insert_target(MonitoredTarget::new("https://example.com", "o"));
        let coordinator = hub(repo.clone());

        let keypair = Ed25519KeyPair::generate();
        let (peer, sender) = connect();
        let validator_id = admitted_id(sign_up(&coordinator, &peer, &keypair, "join").await);
        sender.take_messages();
        coordinator.run_round().await.unwrap();
        let pending = requests(&sender);

        let forger = Ed25519KeyPair::generate();
        let outcome = reply(&coordinator, &peer, &forger, &pending[0], good(1)).await;

        assert_eq!(outcome, ReportOutcome::SignatureRejected);
        assert_eq!(repo.observation_count(), 0);
        assert_eq!(repo.pending_payout(validator_id), Some(0));
        // No reply frame for a rejected result.
        assert!(sender.take_messages().is_empty());

        // The check was consumed by the forged attempt.
        let honest = reply(&coordinator, &peer, &keypair, &pending[0], good(1)).await;
        assert_eq!(honest, ReportOutcome::UnknownCallback);
    }

    #[tokio::test]
    async fn test_commit_failure_is_atomic() {
        let inner = Arc::new(InMemoryRepository::new());
        inner.insert_target(MonitoredTarget::new("https://example.com", "o"));
        let faulty = Arc::new(FaultyRepository::new(inner.clone()));
        let coordinator = hub(faulty.clone());

        let keypair = Ed25519KeyPair::generate();
        let (peer, sender) = connect();
        let validator_id = admitted_id(sign_up(&coordinator, &peer, &keypair, "join").await);
        sender.take_messages();
        coordinator.run_round().await.unwrap();
        let pending = requests(&sender);

        faulty.fail_commits(true);
        let outcome = reply(&coordinator, &peer, &keypair, &pending[0], good(42)).await;

        assert_eq!(outcome, ReportOutcome::StorageFailed);
        assert_eq!(inner.observation_count(), 0);
        assert_eq!(inner.pending_payout(validator_id), Some(0));
    }

    #[tokio::test]
    async fn test_signup_fails_closed_on_storage_error() {
        let inner = Arc::new(InMemoryRepository::new());
        let faulty = Arc::new(FaultyRepository::new(inner.clone()));
        faulty.fail_lookups(true);
        let coordinator = hub(faulty);

        let (peer, sender) = connect();
        let outcome = sign_up(&coordinator, &peer, &Ed25519KeyPair::generate(), "join").await;

        assert_eq!(outcome, SignupOutcome::StorageFailed);
        assert!(coordinator.registry().is_empty());
        assert_eq!(inner.validator_count(), 0);
        assert!(matches!(sender.last(), Some(HubMessage::Error(_))));
    }
}
