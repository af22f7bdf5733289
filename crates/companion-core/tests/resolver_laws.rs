//! Integration tests for the connection resolver.
//!
//! These tests exercise `resolve`, `webhook_url` and `api_url` through the
//! public API and check the laws every resolution must satisfy: determinism,
//! override priority, fallback, and webhook selection.

use companion_core::{
    api_url, resolve, webhook_url, ActiveKind, ConnectionConfig, EndpointKind, NetworkSignal,
    FALLBACK_URL,
};
use url::Url;

fn url(s: &str) -> Url {
    Url::parse(s).expect("test URL must parse")
}

/// `internalURL=http://internal:8123`, `externalURL=http://external:8123`,
/// SSID `HomeWiFi` allow-listed.
fn scenario_config() -> ConnectionConfig {
    ConnectionConfig {
        internal_url: Some(url("http://internal:8123")),
        external_url: Some(url("http://external:8123")),
        webhook_id: "abc123".into(),
        internal_ssids: vec!["HomeWiFi".into()],
        ..Default::default()
    }
}

fn signals() -> Vec<NetworkSignal> {
    vec![
        NetworkSignal::offline(),
        NetworkSignal::new(Some("HomeWiFi".into()), None),
        NetworkSignal::new(Some("CoffeeShop".into()), None),
        NetworkSignal::new(None, Some("00:11:22:33:44:55".into())),
    ]
}

fn configs() -> Vec<ConnectionConfig> {
    let base = scenario_config();
    let mut with_relay = base.clone();
    with_relay.remote_relay_url = Some(url("https://relay.example.com"));
    with_relay.use_cloud_relay = true;
    let mut with_cloud_hook = with_relay.clone();
    with_cloud_hook.cloud_relay_webhook_url = Some(url("https://hooks.example.com/xyz"));
    let mut only_relay = with_relay.clone();
    only_relay.internal_url = None;
    only_relay.external_url = None;
    let mut nothing = base.clone();
    nothing.internal_url = None;
    nothing.external_url = None;
    vec![base, with_relay, with_cloud_hook, only_relay, nothing]
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[test]
fn test_scenario_a_allow_listed_ssid_resolves_internal() {
    // Arrange
    let cfg = scenario_config();
    let signal = NetworkSignal::new(Some("HomeWiFi".into()), None);

    // Act
    let resolved = resolve(&cfg, &signal).expect("resolves");

    // Assert
    assert_eq!(resolved.active_kind, ActiveKind::Endpoint(EndpointKind::Internal));
    assert_eq!(resolved.active_url, url("http://internal:8123"));
}

#[test]
fn test_scenario_b_unknown_ssid_resolves_external() {
    let cfg = scenario_config();
    let signal = NetworkSignal::new(Some("CoffeeShop".into()), None);

    let resolved = resolve(&cfg, &signal).expect("resolves");

    assert_eq!(resolved.active_kind, ActiveKind::Endpoint(EndpointKind::External));
    assert_eq!(resolved.active_url, url("http://external:8123"));
}

#[test]
fn test_scenario_c_override_without_url_falls_through_to_external() {
    // Arrange
    let mut cfg = scenario_config();
    cfg.override_kind = Some(EndpointKind::RemoteRelay);
    cfg.remote_relay_url = None;

    // Act
    let resolved = resolve(&cfg, &NetworkSignal::new(Some("CoffeeShop".into()), None)).expect("resolves");

    // Assert
    assert_eq!(resolved.active_kind, ActiveKind::Endpoint(EndpointKind::External));
}

// ── Laws ──────────────────────────────────────────────────────────────────────

#[test]
fn test_resolve_is_deterministic() {
    for cfg in configs() {
        for signal in signals() {
            let first = resolve(&cfg, &signal);
            let second = resolve(&cfg, &signal);
            assert_eq!(first, second, "config {:?} signal {:?}", cfg, signal);
        }
    }
}

#[test]
fn test_override_with_url_always_wins() {
    for mut cfg in configs() {
        for kind in EndpointKind::ALL {
            cfg.override_kind = Some(kind);
            for signal in signals() {
                let resolved = resolve(&cfg, &signal).expect("non-empty config resolves");
                if kind.is_base() && cfg.address(kind).is_some() {
                    assert_eq!(resolved.active_kind, ActiveKind::Endpoint(kind));
                }
                assert_ne!(resolved.active_kind, ActiveKind::Endpoint(EndpointKind::CloudRelay));
            }
        }
    }
}

#[test]
fn test_all_urls_absent_resolves_to_fallback_constant() {
    // Arrange
    let cfg = ConnectionConfig {
        webhook_id: "abc123".into(),
        internal_ssids: vec!["HomeWiFi".into()],
        use_cloud_relay: true,
        override_kind: Some(EndpointKind::Internal),
        ..Default::default()
    };

    for signal in signals() {
        // Act
        let resolved = resolve(&cfg, &signal).expect("resolves");

        // Assert
        assert_eq!(resolved.active_url, url(FALLBACK_URL));
        assert_eq!(resolved.active_kind, ActiveKind::Fallback);
    }
}

#[test]
fn test_webhook_law_holds_for_every_resolution() {
    for cfg in configs() {
        for signal in signals() {
            let resolved = resolve(&cfg, &signal).expect("resolves");
            let webhook = webhook_url(&resolved, &cfg);
            match &cfg.cloud_relay_webhook_url {
                Some(cloud) if !resolved.active_kind.is_internal() => assert_eq!(&webhook, cloud),
                _ => {
                    let expected = format!(
                        "{}/api/webhook/{}",
                        resolved.active_url.as_str().trim_end_matches('/'),
                        cfg.webhook_id
                    );
                    assert_eq!(webhook.as_str(), expected);
                }
            }
            assert_eq!(resolved.webhook_url, webhook);
        }
    }
}

#[test]
fn test_api_url_is_active_url_plus_api() {
    for cfg in configs() {
        for signal in signals() {
            let resolved = resolve(&cfg, &signal).expect("resolves");
            let expected = format!("{}/api", resolved.active_url.as_str().trim_end_matches('/'));
            assert_eq!(api_url(&resolved).as_str(), expected);
        }
    }
}

#[test]
fn test_re_resolving_after_allow_list_change_has_no_memory() {
    // Arrange
    let mut cfg = scenario_config();
    let signal = NetworkSignal::new(Some("HomeWiFi".into()), None);
    let before = resolve(&cfg, &signal).expect("resolves");

    // Act
    cfg.internal_ssids.clear();
    let after = resolve(&cfg, &signal).expect("resolves");
    cfg.internal_ssids.push("HomeWiFi".into());
    let restored = resolve(&cfg, &signal).expect("resolves");

    // Assert
    assert_eq!(before.active_kind, ActiveKind::Endpoint(EndpointKind::Internal));
    assert_eq!(after.active_kind, ActiveKind::Endpoint(EndpointKind::External));
    assert_eq!(restored, before);
}
