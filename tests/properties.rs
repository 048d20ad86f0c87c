//! Property tests for the failover loop and configuration validation.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;
use proptest::prelude::*;
use url::Url;

use resilient_client::config::{validate_client_config, ClientConfig, NodeSelectionStrategy, ServerQos, ValidationError};
use resilient_client::http::{OutboundRequest, Transport, TransportError, TransportResponse};
use resilient_client::node_selection::{EndpointSet, NodeSelector, PinUntilError, RoundRobin, UnlimitedRoundRobin};
use resilient_client::resilience::{FailoverError, FailoverRetryer, NoBackoff};

/// Fails every attempt and remembers which hosts were tried.
#[derive(Default)]
struct AlwaysRefused {
    hosts: Mutex<Vec<String>>,
}

impl Transport for AlwaysRefused {
    async fn send(&self, target: &Url, _request: &OutboundRequest) -> Result<TransportResponse, TransportError> {
        self.hosts
            .lock()
            .unwrap()
            .push(target.host_str().unwrap_or_default().to_string());
        Err(TransportError::Connect("connection refused".into()))
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap()
}

fn retryer_hosts(retryer: &FailoverRetryer<AlwaysRefused>) -> Vec<String> {
    retryer.transport().hosts.lock().unwrap().clone()
}

fn strategy() -> impl Strategy<Value = NodeSelectionStrategy> {
    prop_oneof![
        Just(NodeSelectionStrategy::RoundRobin),
        Just(NodeSelectionStrategy::PinUntilError),
        Just(NodeSelectionStrategy::UnlimitedRoundRobin),
    ]
}

fn server_qos() -> impl Strategy<Value = ServerQos> {
    prop_oneof![Just(ServerQos::AutomaticRetry), Just(ServerQos::Propagate429And503ToCaller)]
}

proptest! {
    #[test]
    fn exhausts_after_exactly_one_attempt_per_node(
        n in 1usize..8,
        start in 0usize..8,
        strategy in strategy(),
        cooling in prop::collection::vec(any::<bool>(), 8),
    ) {
        let urls = (0..n)
            .map(|i| Url::parse(&format!("http://node-{}.example", i)).unwrap())
            .collect();
        let selector: Box<dyn NodeSelector> = match strategy {
            NodeSelectionStrategy::PinUntilError => Box::new(PinUntilError::new()),
            NodeSelectionStrategy::UnlimitedRoundRobin => Box::new(UnlimitedRoundRobin::new()),
            NodeSelectionStrategy::RoundRobin => {
                let selector = RoundRobin::new(Duration::from_secs(60));
                for index in (0..n).filter(|&i| cooling[i]) {
                    selector.failed(index);
                }
                Box::new(selector)
            }
        };
        selector.pin(start % n);
        let retryer = FailoverRetryer::from_parts(
            "svc",
            EndpointSet::ordered(urls).unwrap(),
            selector,
            Box::new(NoBackoff),
            AlwaysRefused::default(),
        );

        let result = runtime().block_on(retryer.execute(&OutboundRequest::get("/")));
        match result {
            Err(FailoverError::Exhausted { attempts, .. }) => prop_assert_eq!(attempts as usize, n),
            other => prop_assert!(false, "unexpected result: {:?}", other.map(|r| r.status)),
        }

        let hosts = retryer_hosts(&retryer);
        prop_assert_eq!(hosts.len(), n);
        prop_assert_eq!(hosts.iter().collect::<HashSet<_>>().len(), n);
    }

    #[test]
    fn valid_configs_survive_serialization(
        hosts in prop::collection::vec("[a-z]{1,10}", 1..4),
        ports in prop::collection::vec(1u16..65535, 4),
        max_num_retries in 0u32..10,
        strategy in strategy(),
        cooldown in 1u64..100_000,
        slot in 0u64..10_000,
        server_qos in server_qos(),
    ) {
        let raw = ClientConfig {
            uris: hosts
                .iter()
                .zip(&ports)
                .map(|(h, p)| format!("https://{}.example:{}/api", h, p))
                .collect(),
            max_num_retries,
            node_selection_strategy: strategy,
            failed_url_cooldown_ms: cooldown,
            backoff_slot_size_ms: slot,
            mesh_proxy: None,
            server_qos,
        };
        let config = validate_client_config(&raw).unwrap();

        let json = serde_json::to_string(&ClientConfig::from(&config)).unwrap();
        let reparsed: ClientConfig = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(validate_client_config(&reparsed).unwrap(), config);
    }

    #[test]
    fn mesh_proxy_requires_zero_retries_and_single_uri(
        uri_count in 0usize..4,
        max_num_retries in 0u32..5,
    ) {
        let raw = ClientConfig {
            uris: (0..uri_count).map(|i| format!("https://n{}.example", i)).collect(),
            max_num_retries,
            mesh_proxy: Some("localhost:4567".into()),
            ..ClientConfig::default()
        };
        let result = validate_client_config(&raw);
        if uri_count == 1 && max_num_retries == 0 {
            prop_assert!(result.is_ok());
        } else {
            let errors = result.unwrap_err();
            prop_assert_eq!(
                errors.contains(&ValidationError::MeshProxyWithRetries),
                max_num_retries != 0
            );
            prop_assert_eq!(errors.contains(&ValidationError::MeshProxyUriCount), uri_count != 1);
        }
    }

    #[test]
    fn round_robin_requires_positive_cooldown(cooldown in 0u64..3) {
        let raw = ClientConfig {
            uris: vec!["https://a.example".into()],
            node_selection_strategy: NodeSelectionStrategy::RoundRobin,
            failed_url_cooldown_ms: cooldown,
            ..ClientConfig::default()
        };
        prop_assert_eq!(validate_client_config(&raw).is_ok(), cooldown > 0);
    }
}
