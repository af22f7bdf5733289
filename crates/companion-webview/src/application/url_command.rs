//! URL-scheme command surface.
//!
//! Other apps (shortcuts, NFC tags, widgets) open URLs such as
//! `homeassistant://call_service/light.turn_on?entity_id=light.kitchen`.  The
//! host segment selects the command; each command is exactly one request
//! against the active endpoint, and its outcome is shown as a transient alert.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

use companion_core::ResolvedConnection;

use super::ports::{HubApi, SessionUi};
use crate::domain::SessionNotice;

/// Default custom scheme.
pub const DEFAULT_SCHEME: &str = "homeassistant";

#[derive(Debug, Error)]
pub enum UrlCommandError {
    #[error("unsupported URL scheme {0:?}")]
    WrongScheme(String),

    #[error("URL has no command host")]
    MissingHost,

    #[error("unknown command {0:?}")]
    UnknownCommand(String),

    #[error("invalid service {0:?}, expected domain.service")]
    InvalidService(String),

    #[error("missing {0}")]
    MissingParameter(&'static str),

    #[error("no endpoint available")]
    NoEndpoint,

    #[error("{command} failed: {source}")]
    Request {
        command: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

/// A parsed URL-scheme command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum UrlCommand {
    CallService { domain: String, service: String, data: Map<String, Value> },
    FireEvent { event: String, data: Map<String, Value> },
    SendLocation,
    RenderTemplate { template: String, variables: Map<String, Value> },
    AuthCallback { code: String, state: Option<String> },
}

impl UrlCommand {
    /// Parses the host, path and query of `url`.  The scheme is not checked.
    ///
    /// # Errors
    ///
    /// [`UrlCommandError::UnknownCommand`] for unsupported hosts, or a
    /// parameter error when the command's required parts are missing.
    pub fn parse(url: &Url) -> Result<Self, UrlCommandError> {
        let host = url.host_str().ok_or(UrlCommandError::MissingHost)?;
        let path = url.path().trim_matches('/');
        let mut query = query_map(url);

        match host {
            "call_service" => {
                let (domain, service) = path
                    .split_once('.')
                    .filter(|(d, s)| !d.is_empty() && !s.is_empty())
                    .ok_or_else(|| UrlCommandError::InvalidService(path.to_string()))?;
                Ok(UrlCommand::CallService { domain: domain.to_string(), service: service.to_string(), data: query })
            }
            "fire_event" => {
                if path.is_empty() {
                    return Err(UrlCommandError::MissingParameter("event name"));
                }
                Ok(UrlCommand::FireEvent { event: path.to_string(), data: query })
            }
            "send_location" => Ok(UrlCommand::SendLocation),
            "render_template" => {
                let template = take_string(&mut query, "template").ok_or(UrlCommandError::MissingParameter("template"))?;
                Ok(UrlCommand::RenderTemplate { template, variables: query })
            }
            "auth-callback" => {
                let code = take_string(&mut query, "code").ok_or(UrlCommandError::MissingParameter("code"))?;
                let state = take_string(&mut query, "state");
                Ok(UrlCommand::AuthCallback { code, state })
            }
            other => Err(UrlCommandError::UnknownCommand(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            UrlCommand::CallService { .. } => "call_service",
            UrlCommand::FireEvent { .. } => "fire_event",
            UrlCommand::SendLocation => "send_location",
            UrlCommand::RenderTemplate { .. } => "render_template",
            UrlCommand::AuthCallback { .. } => "auth-callback",
        }
    }
}

fn query_map(url: &Url) -> Map<String, Value> {
    url.query_pairs()
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect()
}

fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key) {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

/// What a successful command produced.
#[derive(Debug, Clone, PartialEq)]
pub enum UrlCommandOutcome {
    Done,
    Rendered(String),
}

/// Executes URL-scheme commands against the active endpoint.
pub struct UrlCommandHandler {
    scheme: String,
    api: Arc<dyn HubApi>,
    ui: Arc<dyn SessionUi>,
}

impl UrlCommandHandler {
    pub fn new(api: Arc<dyn HubApi>, ui: Arc<dyn SessionUi>) -> Self {
        Self::with_scheme(DEFAULT_SCHEME, api, ui)
    }

    pub fn with_scheme(scheme: &str, api: Arc<dyn HubApi>, ui: Arc<dyn SessionUi>) -> Self {
        Self { scheme: scheme.to_string(), api, ui }
    }

    /// Parses and runs `url`, then shows the outcome as an alert.
    ///
    /// `resolved` is the session's current resolution; `None` means there is
    /// no endpoint to talk to.
    pub async fn handle(
        &self,
        url: &Url,
        resolved: Option<&ResolvedConnection>,
    ) -> Result<UrlCommandOutcome, UrlCommandError> {
        let result = self.run(url, resolved).await;
        match &result {
            Ok(outcome) => {
                info!("url command {} succeeded", url.host_str().unwrap_or_default());
                let message = match outcome {
                    UrlCommandOutcome::Done => "Command completed".to_string(),
                    UrlCommandOutcome::Rendered(text) => text.clone(),
                };
                self.ui.notify(SessionNotice::Alert { title: "Success".to_string(), message });
            }
            Err(e) => {
                warn!("url command {} failed: {}", url.host_str().unwrap_or_default(), e);
                self.ui.notify(SessionNotice::Alert { title: "Error".to_string(), message: e.to_string() });
            }
        }
        result
    }

    async fn run(&self, url: &Url, resolved: Option<&ResolvedConnection>) -> Result<UrlCommandOutcome, UrlCommandError> {
        if url.scheme() != self.scheme {
            return Err(UrlCommandError::WrongScheme(url.scheme().to_string()));
        }
        let command = UrlCommand::parse(url)?;
        let resolved = resolved.ok_or(UrlCommandError::NoEndpoint)?;
        let api_url = &resolved.api_url;
        let name = command.name();
        let request = |source: anyhow::Error| UrlCommandError::Request { command: name, source };

        match &command {
            UrlCommand::CallService { domain, service, data } => {
                self.api.call_service(api_url, domain, service, data).await.map_err(request)?;
                Ok(UrlCommandOutcome::Done)
            }
            UrlCommand::FireEvent { event, data } => {
                self.api.fire_event(api_url, event, data).await.map_err(request)?;
                Ok(UrlCommandOutcome::Done)
            }
            UrlCommand::SendLocation => {
                self.api.send_location(&resolved.webhook_url).await.map_err(request)?;
                Ok(UrlCommandOutcome::Done)
            }
            UrlCommand::RenderTemplate { template, variables } => {
                let rendered = self.api.render_template(api_url, template, variables).await.map_err(request)?;
                Ok(UrlCommandOutcome::Rendered(rendered))
            }
            UrlCommand::AuthCallback { code, state } => {
                self.api.complete_auth(api_url, code, state.as_deref()).await.map_err(request)?;
                Ok(UrlCommandOutcome::Done)
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::mock::{RecordingHubApi, RecordingUi};
    use companion_core::{resolve, ConnectionConfig, NetworkSignal};

    fn url(s: &str) -> Url {
        Url::parse(s).expect("test URL must parse")
    }

    fn resolved() -> ResolvedConnection {
        let cfg = ConnectionConfig {
            external_url: Some(url("https://hub.example.com")),
            webhook_id: "hook".into(),
            ..Default::default()
        };
        resolve(&cfg, &NetworkSignal::offline()).expect("resolves")
    }

    // ── parse ─────────────────────────────────────────────────────────────────

    #[test]
    fn test_parse_call_service_splits_domain_and_collects_data() {
        // Arrange / Act
        let cmd = UrlCommand::parse(&url("homeassistant://call_service/light.turn_on?entity_id=light.kitchen"))
            .expect("parses");

        // Assert
        let mut data = Map::new();
        data.insert("entity_id".into(), Value::String("light.kitchen".into()));
        assert_eq!(cmd, UrlCommand::CallService { domain: "light".into(), service: "turn_on".into(), data });
    }

    #[test]
    fn test_parse_call_service_without_dot_is_invalid() {
        let err = UrlCommand::parse(&url("homeassistant://call_service/turn_on")).unwrap_err();
        assert!(matches!(err, UrlCommandError::InvalidService(_)));
    }

    #[test]
    fn test_parse_fire_event_requires_name() {
        assert!(matches!(
            UrlCommand::parse(&url("homeassistant://fire_event/")),
            Err(UrlCommandError::MissingParameter("event name"))
        ));
        assert!(matches!(
            UrlCommand::parse(&url("homeassistant://fire_event/door_opened?who=me")),
            Ok(UrlCommand::FireEvent { .. })
        ));
    }

    #[test]
    fn test_parse_render_template_moves_template_out_of_variables() {
        let cmd = UrlCommand::parse(&url("homeassistant://render_template?template=%7B%7B%20x%20%7D%7D&x=1"))
            .expect("parses");
        let UrlCommand::RenderTemplate { template, variables } = cmd else { panic!("render_template") };
        assert_eq!(template, "{{ x }}");
        assert_eq!(variables.get("x"), Some(&Value::String("1".into())));
        assert!(!variables.contains_key("template"));
    }

    #[test]
    fn test_parse_auth_callback() {
        let cmd = UrlCommand::parse(&url("homeassistant://auth-callback?code=abc&state=s1")).expect("parses");
        assert_eq!(cmd, UrlCommand::AuthCallback { code: "abc".into(), state: Some("s1".into()) });
    }

    #[test]
    fn test_parse_unknown_host() {
        let err = UrlCommand::parse(&url("homeassistant://teleport/now")).unwrap_err();
        assert!(matches!(err, UrlCommandError::UnknownCommand(ref h) if h == "teleport"));
    }

    // ── handle ────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_handle_call_service_makes_one_request_and_alerts() {
        // Arrange
        let api = Arc::new(RecordingHubApi::new());
        let ui = Arc::new(RecordingUi::new());
        let handler = UrlCommandHandler::new(api.clone(), ui.clone());
        let resolved = resolved();

        // Act
        let outcome = handler
            .handle(&url("homeassistant://call_service/script.bedtime"), Some(&resolved))
            .await
            .expect("succeeds");

        // Assert
        assert_eq!(outcome, UrlCommandOutcome::Done);
        assert_eq!(api.calls(), vec!["call_service https://hub.example.com/api script.bedtime".to_string()]);
        assert!(matches!(ui.notices().as_slice(), [SessionNotice::Alert { title, .. }] if title == "Success"));
    }

    #[tokio::test]
    async fn test_handle_send_location_uses_webhook_url() {
        let api = Arc::new(RecordingHubApi::new());
        let handler = UrlCommandHandler::new(api.clone(), Arc::new(RecordingUi::new()));
        let resolved = resolved();

        handler.handle(&url("homeassistant://send_location/"), Some(&resolved)).await.expect("succeeds");

        assert_eq!(api.calls(), vec!["send_location https://hub.example.com/api/webhook/hook".to_string()]);
    }

    #[tokio::test]
    async fn test_handle_failure_is_alerted() {
        // Arrange
        let api = Arc::new(RecordingHubApi::failing());
        let ui = Arc::new(RecordingUi::new());
        let handler = UrlCommandHandler::new(api, ui.clone());
        let resolved = resolved();

        // Act
        let err = handler
            .handle(&url("homeassistant://fire_event/ping"), Some(&resolved))
            .await
            .unwrap_err();

        // Assert
        assert!(matches!(err, UrlCommandError::Request { command: "fire_event", .. }));
        assert!(matches!(ui.notices().as_slice(), [SessionNotice::Alert { title, .. }] if title == "Error"));
    }

    #[tokio::test]
    async fn test_handle_without_endpoint_makes_no_request() {
        let api = Arc::new(RecordingHubApi::new());
        let handler = UrlCommandHandler::new(api.clone(), Arc::new(RecordingUi::new()));

        let err = handler.handle(&url("homeassistant://send_location/"), None).await.unwrap_err();

        assert!(matches!(err, UrlCommandError::NoEndpoint));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_handle_rejects_foreign_scheme() {
        let api = Arc::new(RecordingHubApi::new());
        let handler = UrlCommandHandler::new(api.clone(), Arc::new(RecordingUi::new()));
        let resolved = resolved();

        let err = handler.handle(&url("https://call_service/light.on"), Some(&resolved)).await.unwrap_err();

        assert!(matches!(err, UrlCommandError::WrongScheme(_)));
        assert!(api.calls().is_empty());
    }
}
