//! Connection resolver: configuration + network signal → active endpoint.
//!
//! Everything here is a pure function.  Nothing is cached between calls, so
//! re-resolving after an allow-list or signal change always reflects the new
//! inputs.
//!
//! # Priority
//!
//! ```text
//! 1. override_kind          (if its URL is configured and is a base)
//! 2. internal               (if SSID or hardware address is allow-listed)
//! 3. external
//! 4. remote_relay           (only when use_cloud_relay is on)
//! 5. FALLBACK_URL           (active_kind = fallback)
//! ```

use tracing::debug;
use url::Url;

use crate::domain::endpoint::{ActiveKind, ConnectionConfig, EndpointKind, ResolvedConnection};
use crate::domain::signal::NetworkSignal;

/// Well-known local hostname used when no configured endpoint applies.
pub const FALLBACK_URL: &str = "http://homeassistant.local:8123";

/// Query parameter that tells the frontend to use the native auth bridge.
pub const EXTERNAL_AUTH_PARAM: &str = "external_auth";

// ── Public API ────────────────────────────────────────────────────────────────

/// Resolves the active endpoint for `config` under `signal`.
///
/// Returns `None` only for an empty (never onboarded) configuration.  Any
/// non-empty configuration resolves, at worst to [`FALLBACK_URL`].
///
/// # Example
///
/// ```rust
/// use companion_core::{resolve, ActiveKind, ConnectionConfig, EndpointKind, NetworkSignal};
///
/// let mut cfg = ConnectionConfig::default();
/// cfg.set_address(EndpointKind::External, Some("https://hub.example.com".parse().unwrap()));
/// let resolved = resolve(&cfg, &NetworkSignal::offline()).unwrap();
/// assert_eq!(resolved.active_kind, ActiveKind::Endpoint(EndpointKind::External));
/// assert_eq!(resolved.api_url.as_str(), "https://hub.example.com/api");
/// ```
pub fn resolve(config: &ConnectionConfig, signal: &NetworkSignal) -> Option<ResolvedConnection> {
    if config.is_empty() {
        debug!("resolve: configuration is empty, no endpoint");
        return None;
    }

    let (active_kind, active_url) = select_active(config, signal)?;
    debug!("resolve: active endpoint is {} ({})", active_kind, active_url);

    Some(ResolvedConnection {
        webhook_url: webhook_url_for(active_kind, &active_url, config),
        api_url: append_path(&active_url, &["api"]),
        active_kind,
        active_url,
    })
}

/// Webhook delivery URL for a resolved connection.
///
/// The cloud relay webhook wins whenever it is configured and the active path
/// is not the internal one; otherwise `api/webhook/{webhook_id}` is appended
/// to the active URL.
pub fn webhook_url(resolved: &ResolvedConnection, config: &ConnectionConfig) -> Url {
    webhook_url_for(resolved.active_kind, &resolved.active_url, config)
}

/// `active_url` + `api`.
pub fn api_url(resolved: &ResolvedConnection) -> Url {
    append_path(&resolved.active_url, &["api"])
}

/// URL the content runtime should load for a fresh session.
///
/// `?external_auth=1` is added when a token is available so the frontend asks
/// the native host for credentials instead of showing its own login page.
pub fn webview_url(resolved: &ResolvedConnection, authenticated: bool) -> Url {
    let mut url = resolved.active_url.clone();
    if authenticated {
        url.query_pairs_mut().append_pair(EXTERNAL_AUTH_PARAM, "1");
    }
    url
}

/// `true` when the signal matches the internal allow-lists.
///
/// SSIDs compare exactly; hardware addresses compare case-insensitively.
pub fn is_on_internal_network(config: &ConnectionConfig, signal: &NetworkSignal) -> bool {
    let ssid_match = signal
        .ssid
        .as_deref()
        .map(|ssid| config.internal_ssids.iter().any(|s| s == ssid))
        .unwrap_or(false);
    let hardware_match = signal
        .hardware_address
        .as_deref()
        .map(|addr| {
            config
                .internal_hardware_addresses
                .iter()
                .any(|a| a.eq_ignore_ascii_case(addr))
        })
        .unwrap_or(false);
    ssid_match || hardware_match
}

/// Which configured base endpoint (if any) `url` points at.
pub fn classify_url(config: &ConnectionConfig, url: &Url) -> Option<EndpointKind> {
    EndpointKind::BASES
        .into_iter()
        .find(|kind| config.address(*kind).map(|base| same_base(base, url)).unwrap_or(false))
}

/// Rewrites a URL that points at any configured endpoint onto the active base.
///
/// Path, query and fragment are kept.  The source endpoint's base path is
/// only removed at a segment boundary.  URLs for unrelated hosts are returned
/// unchanged.
pub fn adapt_url(resolved: &ResolvedConnection, config: &ConnectionConfig, url: &Url) -> Url {
    let Some(kind) = classify_url(config, url) else {
        return url.clone();
    };
    if same_base(&resolved.active_url, url) {
        return url.clone();
    }
    let source_prefix = config.address(kind).map(|base| base.path().trim_end_matches('/')).unwrap_or("");
    let relative = match url.path().strip_prefix(source_prefix) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => url.path(),
    };

    let mut adapted = resolved.active_url.clone();
    let path = format!("{}/{}", adapted.path().trim_end_matches('/'), relative.trim_start_matches('/'));
    adapted.set_path(&path);
    adapted.set_query(url.query());
    adapted.set_fragment(url.fragment());
    debug!("adapt_url: {} -> {} ({} -> {})", url, adapted, kind, resolved.active_kind);
    adapted
}

/// Scheme, host and effective port equality.
pub fn same_base(a: &Url, b: &Url) -> bool {
    a.scheme() == b.scheme()
        && a.host_str() == b.host_str()
        && a.port_or_known_default() == b.port_or_known_default()
}

/// Appends path segments to `base`, keeping any existing path prefix.
pub fn append_path(base: &Url, segments: &[&str]) -> Url {
    let mut url = base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
        path.pop_if_empty().extend(segments);
    }
    url.set_query(None);
    url.set_fragment(None);
    url
}

// ── Internals ─────────────────────────────────────────────────────────────────

fn select_active(config: &ConnectionConfig, signal: &NetworkSignal) -> Option<(ActiveKind, Url)> {
    let usable = |kind: EndpointKind| {
        config
            .address(kind)
            .filter(|url| kind.is_base() && !url.cannot_be_a_base())
            .cloned()
    };

    if let Some(kind) = config.override_kind {
        if let Some(url) = usable(kind) {
            return Some((ActiveKind::Endpoint(kind), url));
        }
        debug!("resolve: override {} has no base URL, ignoring", kind);
    }

    if is_on_internal_network(config, signal) {
        if let Some(url) = usable(EndpointKind::Internal) {
            return Some((ActiveKind::Endpoint(EndpointKind::Internal), url));
        }
    }

    if let Some(url) = usable(EndpointKind::External) {
        return Some((ActiveKind::Endpoint(EndpointKind::External), url));
    }

    if config.can_use_cloud() {
        if let Some(url) = usable(EndpointKind::RemoteRelay) {
            return Some((ActiveKind::Endpoint(EndpointKind::RemoteRelay), url));
        }
    }

    Url::parse(FALLBACK_URL).ok().map(|url| (ActiveKind::Fallback, url))
}

fn webhook_url_for(active_kind: ActiveKind, active_url: &Url, config: &ConnectionConfig) -> Url {
    match config.cloud_relay_webhook_url.as_ref() {
        Some(cloud) if !active_kind.is_internal() => cloud.clone(),
        _ => append_path(active_url, &["api", "webhook", config.webhook_id.as_str()]),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
