//! Serial receive/reply loop hosting one application.

use tokio::sync::broadcast;

use crate::backend::host::{Application, RequestHost};
use crate::config::BackendConfig;
use crate::observability::metrics;
use crate::protocol::codec::{decode_request_or_fallback, encode_response};
use crate::protocol::Response;
use crate::state::SharedState;
use crate::transport::{BridgeListener, TransportError};

/// Session key holding the signed-in user's name, when the application sets one.
pub const CURRENT_USER_KEY: &str = "CURRENT_USER";

/// The backend process: owns the stores and runs the application.
pub struct AppServer<A> {
    config: BackendConfig,
    application: A,
    state: SharedState,
}

impl<A: Application> AppServer<A> {
    pub fn new(config: BackendConfig, application: A) -> Self {
        Self {
            config,
            application,
            state: SharedState::new(),
        }
    }

    /// The stores this server owns.
    pub fn state(&self) -> &SharedState {
        &self.state
    }

    /// Serve exchanges one at a time until `shutdown` fires.
    ///
    /// A failed exchange is logged and the loop moves on to the next one.
    /// Returns [`TransportError::Closed`] if the listener stops accepting.
    pub async fn run(
        &self,
        mut listener: BridgeListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), TransportError> {
        let address = listener.local_addr()?;
        tracing::info!(
            address = %address,
            app = %self.config.name,
            path = %self.config.path,
            "Application is waiting for requests"
        );

        loop {
            let exchange = tokio::select! {
                received = listener.receive() => received,
                _ = shutdown.recv() => {
                    tracing::info!(app = %self.config.name, "Application server received shutdown signal");
                    break;
                }
            };

            let exchange = match exchange {
                Ok(exchange) => exchange,
                Err(TransportError::Closed) => {
                    tracing::error!(app = %self.config.name, "Bridge listener closed");
                    return Err(TransportError::Closed);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to receive bridged request");
                    metrics::record_backend_request("receive_failed");
                    continue;
                }
            };

            let reply = self.handle_message(exchange.request());
            let peer = exchange.peer();
            if let Err(e) = exchange.reply(&reply).await {
                tracing::warn!(peer = %peer, error = %e, "Failed to send reply");
            }
        }

        Ok(())
    }

    /// Turn one request message into its reply message.
    pub fn handle_message(&self, request_text: &str) -> String {
        let response = match decode_request_or_fallback(request_text) {
            Ok(request) => self.dispatch(request),
            Err(fallback) => {
                metrics::record_backend_request("malformed");
                fallback
            }
        };

        encode_response(&response)
            .or_else(|e| {
                tracing::error!(error = %e, "Failed to encode response, sending fallback");
                encode_response(&Response::fallback())
            })
            .unwrap_or_default()
    }

    fn dispatch(&self, mut request: crate::protocol::Request) -> Response {
        request.path_base = Some(self.config.path.clone());

        let user = self
            .state
            .session
            .get(&request.session_id, CURRENT_USER_KEY)
            .and_then(|value| value.as_str().map(str::to_string));
        tracing::info!(
            client = %user.as_deref().unwrap_or(&request.session_id),
            method = %request.method,
            path = %request.path,
            "Request"
        );

        let mut host = RequestHost::new(&request.session_id, &self.state);
        self.application.handle(&request, &mut host);

        let Some(mut response) = host.into_response() else {
            tracing::warn!(path = %request.path, "Application returned without rendering a response");
            metrics::record_backend_request("unrendered");
            return Response::fallback();
        };

        match response.coerce_redirect() {
            Some(location) => tracing::info!(location = %location, "Redirect"),
            None => tracing::info!(path = %request.path, status = response.status, "Served"),
        }
        metrics::record_backend_request("served");
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::host::AppHost;
    use crate::protocol::codec::{decode_response, encode_request};
    use crate::protocol::message::FALLBACK_BODY;
    use crate::protocol::Request;
    use serde_json::json;

    fn request(session_id: &str, path: &str) -> String {
        encode_request(&Request {
            session_id: session_id.into(),
            method: "GET".into(),
            path: path.into(),
            ..Request::default()
        })
        .unwrap()
    }

    fn config() -> BackendConfig {
        BackendConfig {
            path: "/srv/app".into(),
            ..BackendConfig::default()
        }
    }

    #[test]
    fn malformed_request_gets_fallback() {
        let server = AppServer::new(config(), |_: &Request, host: &mut dyn AppHost| {
            host.render(Response::text(200, "text/plain", "unreachable"));
        });

        let response = decode_response(&server.handle_message("garbage")).unwrap();
        assert_eq!(response.status, 500);
        assert_eq!(response.body.as_deref(), Some(FALLBACK_BODY));
    }

    #[test]
    fn redirect_status_is_forced() {
        let server = AppServer::new(config(), |_: &Request, host: &mut dyn AppHost| {
            host.render(Response::text(200, "text/html", "").with_header("Location", "/x"));
        });

        let response = decode_response(&server.handle_message(&request("abc", "/old"))).unwrap();
        assert_eq!(response.status, 302);
    }

    #[test]
    fn unrendered_request_gets_fallback() {
        let server = AppServer::new(config(), |_: &Request, _: &mut dyn AppHost| {});
        let response = decode_response(&server.handle_message(&request("abc", "/"))).unwrap();
        assert_eq!(response, Response::fallback());
    }

    #[test]
    fn path_base_is_stamped() {
        let server = AppServer::new(config(), |request: &Request, host: &mut dyn AppHost| {
            let base = request.path_base.clone().unwrap_or_default();
            host.render(Response::text(200, "text/plain", base));
        });

        let response = decode_response(&server.handle_message(&request("abc", "/"))).unwrap();
        assert_eq!(response.body.as_deref(), Some("/srv/app"));
    }

    #[test]
    fn session_state_persists_across_requests() {
        let server = AppServer::new(config(), |_: &Request, host: &mut dyn AppHost| {
            let visits = host.get_session("visits").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
            host.set_session("visits", json!(visits));
            host.render(Response::text(200, "text/plain", visits.to_string()));
        });

        server.handle_message(&request("A", "/"));
        server.handle_message(&request("A", "/"));
        let third = decode_response(&server.handle_message(&request("A", "/"))).unwrap();
        let other = decode_response(&server.handle_message(&request("B", "/"))).unwrap();

        assert_eq!(third.body.as_deref(), Some("3"));
        assert_eq!(other.body.as_deref(), Some("1"));
        assert_eq!(server.state().session.session_count(), 2);
    }
}
