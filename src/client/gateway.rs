use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{json, Value};
use tokio::sync::{oneshot, watch};

use crate::client::session::{SessionStatus, SessionStorage, StoredSession};
use crate::client::transport::{ApiRequest, ApiResponse, Transport};
use crate::error::ErrorKind;

pub const LOGIN_PATH: &str = "/auth/login";
pub const SIGNUP_PATH: &str = "/auth/signup";
pub const REFRESH_PATH: &str = "/auth/refresh";
pub const LOGOUT_PATH: &str = "/auth/logout";
pub const CURRENT_USER_PATH: &str = "/api/users/me";

#[derive(Debug, Clone, PartialEq)]
pub enum GatewayError {
    /// The API answered with a non-success status
    Rejected {
        status: u16,
        kind: ErrorKind,
        message: String,
    },
    /// No response was obtained
    Transport(String),
    /// A success response was missing an expected field
    InvalidResponse(String),
    /// The refresh this request was waiting on was abandoned
    SessionEnded,
}

impl GatewayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::Rejected { kind, .. } => *kind,
            GatewayError::SessionEnded => ErrorKind::Unauthenticated,
            _ => ErrorKind::Other,
        }
    }
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GatewayError::Rejected { status, kind, message } => {
                write!(f, "request rejected with {} ({}): {}", status, kind, message)
            }
            GatewayError::Transport(msg) => write!(f, "transport error: {}", msg),
            GatewayError::InvalidResponse(msg) => write!(f, "invalid response: {}", msg),
            GatewayError::SessionEnded => write!(f, "session ended while waiting for refresh"),
        }
    }
}

impl std::error::Error for GatewayError {}

type Waiter = oneshot::Sender<Result<String, GatewayError>>;

/// Shared by every request issued through one gateway.
struct CoordinationState {
    access_token: Option<String>,
    refresh_in_flight: bool,
    waiters: VecDeque<Waiter>,
}

/// What a failed request does next, decided under the state lock
enum NextStep {
    /// First failure of a batch: perform the refresh
    Refresh,
    /// A refresh is already running: wait for its outcome
    Wait(oneshot::Receiver<Result<String, GatewayError>>),
    /// The credential was already replaced after this request was sent
    Replay(String),
    /// The session ended after this request was sent
    Fail,
}

/// Client-side request dispatcher.
///
/// Attaches the cached access token to every request. When requests fail
/// authentication, exactly one of them calls `/auth/refresh`; the others
/// queue behind it and are replayed, in arrival order, with the new token.
/// Each request is replayed at most once. If the refresh fails, every
/// queued request fails with the same error and the session is cleared.
///
/// The lock around the coordination state is only ever held in synchronous
/// sections, never across an `.await`.
pub struct Gateway<T> {
    transport: T,
    storage: Arc<dyn SessionStorage>,
    state: Mutex<CoordinationState>,
    status: watch::Sender<SessionStatus>,
}

impl<T: Transport> Gateway<T> {
    /// Build a gateway, restoring any session persisted in `storage`.
    pub fn new(transport: T, storage: Arc<dyn SessionStorage>) -> Self {
        let (status, _) = watch::channel(SessionStatus::Anonymous);
        let gateway = Self {
            transport,
            storage,
            state: Mutex::new(CoordinationState {
                access_token: None,
                refresh_in_flight: false,
                waiters: VecDeque::new(),
            }),
            status,
        };
        gateway.restore();
        gateway
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Watch status transitions; `Anonymous` after a failed refresh is the
    /// signal to send the user back to the login screen.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    pub fn access_token(&self) -> Option<String> {
        self.lock_state().access_token.clone()
    }

    pub fn user(&self) -> Option<Value> {
        self.storage.load().and_then(|session| session.user)
    }

    /// Load the persisted session into the cache.
    pub fn restore(&self) -> SessionStatus {
        let status = match self.storage.load() {
            Some(session) => {
                self.lock_state().access_token = Some(session.access_token);
                SessionStatus::Authenticated
            }
            None => SessionStatus::Anonymous,
        };
        self.status.send_replace(status);
        status
    }

    pub async fn login(&self, email_or_username: &str, password: &str) -> Result<Value, GatewayError> {
        let request = ApiRequest::post(LOGIN_PATH).json(json!({
            "email_or_username": email_or_username,
            "password": password,
        }));
        self.start_session(request).await
    }

    /// `form` carries `username`, `email`, `password`, `full_name` and an
    /// optional `bio`.
    pub async fn signup(&self, form: Value) -> Result<Value, GatewayError> {
        self.start_session(ApiRequest::post(SIGNUP_PATH).json(form)).await
    }

    /// End the session. The local session is cleared even if the server
    /// cannot be reached.
    pub async fn logout(&self) {
        let request = ApiRequest::post(LOGOUT_PATH).with_bearer(self.access_token());
        match self.transport.send(request).await {
            Ok(response) if response.is_success() => {}
            Ok(response) => tracing::warn!(status = response.status, "Logout rejected"),
            Err(e) => tracing::warn!(error = %e, "Logout request failed"),
        }

        self.lock_state().access_token = None;
        self.storage.clear();
        self.status.send_replace(SessionStatus::Anonymous);
    }

    pub async fn current_user(&self) -> Result<Value, GatewayError> {
        let response = self.execute(ApiRequest::get(CURRENT_USER_PATH)).await?;
        Ok(response.body)
    }

    /// Send `request` with the cached credential, recovering once from an
    /// authentication failure. Every other failure is returned unchanged.
    pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse, GatewayError> {
        let sent_with = self.access_token();
        let response = self
            .transport
            .send(request.clone().with_bearer(sent_with.clone()))
            .await?;

        if response.is_success()
            || !response.error_kind().is_auth_failure()
            || is_session_endpoint(&request.path)
        {
            return response.into_result();
        }

        let token = self
            .fresh_token(sent_with.as_deref(), response.into_error())
            .await?;

        // The replay's outcome is final, whatever it is
        self.transport
            .send(request.with_bearer(Some(token)))
            .await?
            .into_result()
    }

    async fn start_session(&self, request: ApiRequest) -> Result<Value, GatewayError> {
        let response = self
            .transport
            .send(request.with_bearer(self.access_token()))
            .await?
            .into_result()?;

        let access_token = access_token_from(&response)?;
        let user = response.body.get("user").cloned();

        self.lock_state().access_token = Some(access_token.clone());
        self.storage.save(&StoredSession {
            access_token,
            user: user.clone(),
        });
        self.status.send_replace(SessionStatus::Authenticated);

        Ok(user.unwrap_or(Value::Null))
    }

    /// Obtain a credential newer than `stale`, joining an in-flight refresh
    /// or starting one.
    async fn fresh_token(
        &self,
        stale: Option<&str>,
        failure: GatewayError,
    ) -> Result<String, GatewayError> {
        let step = {
            let mut state = self.lock_state();
            if state.refresh_in_flight {
                let (tx, rx) = oneshot::channel();
                state.waiters.push_back(tx);
                NextStep::Wait(rx)
            } else {
                let current = state.access_token.clone();
                match (current, stale) {
                    (Some(current), _) if Some(current.as_str()) != stale => {
                        NextStep::Replay(current)
                    }
                    (None, Some(_)) => NextStep::Fail,
                    _ => {
                        state.refresh_in_flight = true;
                        self.status.send_replace(SessionStatus::Refreshing);
                        NextStep::Refresh
                    }
                }
            }
        };

        match step {
            NextStep::Refresh => {
                let guard = AbandonGuard { gateway: self, armed: true };
                let outcome = self.request_refresh().await;
                guard.disarm();
                self.finish_refresh(&outcome);
                outcome
            }
            NextStep::Wait(rx) => rx.await.unwrap_or(Err(GatewayError::SessionEnded)),
            NextStep::Replay(token) => Ok(token),
            NextStep::Fail => Err(failure),
        }
    }

    async fn request_refresh(&self) -> Result<String, GatewayError> {
        tracing::debug!("Refreshing access token");

        let response = self
            .transport
            .send(ApiRequest::post(REFRESH_PATH))
            .await?
            .into_result()?;

        access_token_from(&response)
    }

    /// Publish the refresh outcome: update the cache, then settle every
    /// waiter in the order it queued.
    fn finish_refresh(&self, outcome: &Result<String, GatewayError>) {
        let waiters = {
            let mut state = self.lock_state();
            state.refresh_in_flight = false;
            state.access_token = outcome.as_ref().ok().cloned();
            std::mem::take(&mut state.waiters)
        };

        match outcome {
            Ok(token) => {
                let user = self.storage.load().and_then(|session| session.user);
                self.storage.save(&StoredSession {
                    access_token: token.clone(),
                    user,
                });
                self.status.send_replace(SessionStatus::Authenticated);
                tracing::debug!(waiters = waiters.len(), "Access token refreshed");
            }
            Err(e) => {
                self.storage.clear();
                self.status.send_replace(SessionStatus::Anonymous);
                tracing::warn!(error = %e, waiters = waiters.len(), "Refresh failed; session cleared");
            }
        }

        for waiter in waiters {
            // A dropped waiter was cancelled by its caller
            let _ = waiter.send(outcome.clone());
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CoordinationState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases the coordination state if the refreshing future is dropped
/// before it finishes. Waiters observe `SessionEnded`; the persisted
/// session is left as it was.
struct AbandonGuard<'a, T: Transport> {
    gateway: &'a Gateway<T>,
    armed: bool,
}

impl<T: Transport> AbandonGuard<'_, T> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl<T: Transport> Drop for AbandonGuard<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let waiters = {
            let mut state = self.gateway.lock_state();
            state.refresh_in_flight = false;
            std::mem::take(&mut state.waiters)
        };
        let status = if self.gateway.access_token().is_some() {
            SessionStatus::Authenticated
        } else {
            SessionStatus::Anonymous
        };
        self.gateway.status.send_replace(status);
        tracing::warn!(waiters = waiters.len(), "Refresh abandoned");
    }
}

fn is_session_endpoint(path: &str) -> bool {
    path == LOGIN_PATH || path == REFRESH_PATH
}

fn access_token_from(response: &ApiResponse) -> Result<String, GatewayError> {
    response
        .body
        .get("access_token")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GatewayError::InvalidResponse("missing access_token".to_string()))
}
