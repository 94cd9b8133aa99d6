//! Capabilities the backend grants to application logic.

use crate::protocol::{Request, Response};
use crate::state::{SharedState, StoreValue};

/// Everything application logic may do while handling one request.
///
/// Session operations are bound to the session identifier of the request
/// being handled. `render` must be called exactly once per request.
pub trait AppHost {
    fn set_session(&self, key: &str, value: StoreValue);
    fn get_session(&self, key: &str) -> Option<StoreValue>;
    fn remove_session(&self, key: &str);

    fn set_application(&self, key: &str, value: StoreValue);
    fn get_application(&self, key: &str) -> Option<StoreValue>;
    fn remove_application(&self, key: &str);

    /// Hand back the response for the current request.
    fn render(&mut self, response: Response);
}

/// Application logic hosted by the backend (routing, controllers, views).
pub trait Application: Send + Sync {
    fn handle(&self, request: &Request, host: &mut dyn AppHost);
}

impl<F> Application for F
where
    F: Fn(&Request, &mut dyn AppHost) + Send + Sync,
{
    fn handle(&self, request: &Request, host: &mut dyn AppHost) {
        self(request, host)
    }
}

/// [`AppHost`] for a single request in flight.
pub struct RequestHost<'a> {
    session_id: &'a str,
    state: &'a SharedState,
    response: Option<Response>,
}

impl<'a> RequestHost<'a> {
    pub fn new(session_id: &'a str, state: &'a SharedState) -> Self {
        Self {
            session_id,
            state,
            response: None,
        }
    }

    /// The rendered response, if the application produced one.
    pub fn into_response(self) -> Option<Response> {
        self.response
    }
}

impl AppHost for RequestHost<'_> {
    fn set_session(&self, key: &str, value: StoreValue) {
        self.state.session.set(self.session_id, key, value);
    }

    fn get_session(&self, key: &str) -> Option<StoreValue> {
        self.state.session.get(self.session_id, key)
    }

    fn remove_session(&self, key: &str) {
        self.state.session.remove(self.session_id, key);
    }

    fn set_application(&self, key: &str, value: StoreValue) {
        self.state.application.set(key, value);
    }

    fn get_application(&self, key: &str) -> Option<StoreValue> {
        self.state.application.get(key)
    }

    fn remove_application(&self, key: &str) {
        self.state.application.remove(key);
    }

    fn render(&mut self, response: Response) {
        if self.response.is_some() {
            tracing::warn!(session_id = %self.session_id, "Response already rendered, ignoring second render");
            return;
        }
        self.response = Some(response);
    }
}
