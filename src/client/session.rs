//! Authenticated session management with transparent token refresh.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest::{Request, Response, StatusCode};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::http::ApiClient;
use super::storage::{Session, SessionStorage, StorageError};

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    MalformedResponse(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid access token: {0}")]
    InvalidToken(#[from] reqwest::header::InvalidHeaderValue),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Session expired, please sign in again")]
    ReauthenticationRequired,
}

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// Nobody is signed in
    Anonymous,
    /// Signed in as the given email
    Active(String),
    /// The session was dropped after a failed refresh; the user has to log in again
    ReauthenticationRequired,
}

type SharedRefresh = Shared<BoxFuture<'static, bool>>;

/// Owns the current [`Session`] and attaches it to outgoing requests.
///
/// On a 401 the client refreshes the token pair once and retries the request
/// once. Concurrent callers that hit a 401 at the same time share a single
/// refresh call.
pub struct SessionClient {
    api: ApiClient,
    storage: Arc<dyn SessionStorage>,
    status: watch::Sender<SessionStatus>,
    in_flight: Mutex<Option<SharedRefresh>>,
    refresh_calls: Arc<AtomicU64>,
}

impl SessionClient {
    pub fn new(api: ApiClient, storage: Arc<dyn SessionStorage>) -> Self {
        let initial = match storage.load() {
            Ok(Some(session)) => SessionStatus::Active(session.email),
            Ok(None) => SessionStatus::Anonymous,
            Err(e) => {
                warn!(error = %e, "Failed to load stored session");
                SessionStatus::Anonymous
            }
        };
        let (status, _) = watch::channel(initial);

        Self {
            api,
            storage,
            status,
            in_flight: Mutex::new(None),
            refresh_calls: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn session(&self) -> Result<Option<Session>, SessionError> {
        Ok(self.storage.load()?)
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Number of refresh calls sent to the server so far.
    pub fn refresh_count(&self) -> u64 {
        self.refresh_calls.load(Ordering::SeqCst)
    }

    pub async fn register(&self, email: &str, password: &str) -> Result<(), SessionError> {
        self.api.register(email, password).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<Session, SessionError> {
        self.login_with_ttl(email, password, None, None).await
    }

    /// Log in with explicit token lifetimes in seconds.
    pub async fn login_with_ttl(
        &self,
        email: &str,
        password: &str,
        bearer_ttl: Option<u64>,
        refresh_ttl: Option<u64>,
    ) -> Result<Session, SessionError> {
        let tokens = self
            .api
            .login_with_ttl(email, password, bearer_ttl, refresh_ttl)
            .await?;
        let session = Session {
            email: email.to_string(),
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        };
        self.storage.save(&session)?;
        self.status
            .send_replace(SessionStatus::Active(session.email.clone()));
        Ok(session)
    }

    /// Revoke the refresh token (best effort) and forget the session.
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.end_session(SessionStatus::Anonymous).await
    }

    async fn end_session(&self, next: SessionStatus) -> Result<(), SessionError> {
        if let Some(session) = self.storage.load()? {
            if let Err(e) = self.api.logout(&session.refresh_token).await {
                debug!(error = %e, "Server-side logout failed");
            }
        }
        self.storage.clear()?;
        self.status.send_replace(next);
        Ok(())
    }

    /// Send `request` with the current access token.
    ///
    /// A 401 triggers one refresh and one retry. If the refresh fails the
    /// session is dropped and [`SessionError::ReauthenticationRequired`] is
    /// returned. Any other response, including a 401 on the retry, is
    /// returned as-is.
    pub async fn perform_authenticated_request(
        &self,
        request: Request,
    ) -> Result<Response, SessionError> {
        let retry = request.try_clone();
        let token = self.storage.load()?.map(|s| s.access_token);

        let response = self.send(request, token.as_deref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        // Streaming bodies cannot be replayed
        let Some(retry) = retry else {
            return Ok(response);
        };

        if !self.refresh(token.as_deref()).await {
            info!("Token refresh failed, signing out");
            self.end_session(SessionStatus::ReauthenticationRequired)
                .await?;
            return Err(SessionError::ReauthenticationRequired);
        }

        let token = self.storage.load()?.map(|s| s.access_token);
        self.send(retry, token.as_deref()).await
    }

    pub async fn get(&self, path: &str) -> Result<Response, SessionError> {
        let request = self.api.http().get(self.api.endpoint(path)?).build()?;
        self.perform_authenticated_request(request).await
    }

    pub async fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<Response, SessionError> {
        let request = self
            .api
            .http()
            .put(self.api.endpoint(path)?)
            .json(body)
            .build()?;
        self.perform_authenticated_request(request).await
    }

    async fn send(&self, mut request: Request, token: Option<&str>) -> Result<Response, SessionError> {
        if let Some(token) = token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        self.api.execute(request).await
    }

    /// Make sure the stored access token is newer than `stale`.
    ///
    /// Returns true when a usable pair is in storage afterwards, either
    /// because another caller already replaced `stale` or because this call
    /// (or one it joined) refreshed successfully.
    async fn refresh(&self, stale: Option<&str>) -> bool {
        let refresh = {
            let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
            match slot.as_ref() {
                Some(refresh) => refresh.clone(),
                None => {
                    // Under the lock, a finished refresh has already stored its pair
                    match self.storage.load() {
                        Ok(None) => return false,
                        Ok(Some(session)) if Some(session.access_token.as_str()) != stale => {
                            return true;
                        }
                        Ok(Some(_)) => {}
                        Err(e) => {
                            warn!(error = %e, "Failed to read session before refresh");
                            return false;
                        }
                    }

                    let refresh = refresh_session(
                        self.api.clone(),
                        self.storage.clone(),
                        self.refresh_calls.clone(),
                    )
                    .boxed()
                    .shared();
                    *slot = Some(refresh.clone());
                    refresh
                }
            }
        };

        let refreshed = refresh.clone().await;

        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.as_ref().is_some_and(|r| r.ptr_eq(&refresh)) {
            *slot = None;
        }

        refreshed
    }
}

/// Exchange the stored refresh token for a new pair and store it. Network
/// and server errors both count as a failed refresh.
async fn refresh_session(
    api: ApiClient,
    storage: Arc<dyn SessionStorage>,
    refresh_calls: Arc<AtomicU64>,
) -> bool {
    let session = match storage.load() {
        Ok(Some(session)) => session,
        Ok(None) => return false,
        Err(e) => {
            warn!(error = %e, "Failed to read session for refresh");
            return false;
        }
    };

    refresh_calls.fetch_add(1, Ordering::SeqCst);
    let tokens = match api.refresh(&session.refresh_token).await {
        Ok(tokens) => tokens,
        Err(e) => {
            warn!(error = %e, "Refresh request failed");
            return false;
        }
    };

    let renewed = Session {
        email: session.email,
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    };
    match storage.save(&renewed) {
        Ok(()) => {
            debug!(email = %renewed.email, "Session refreshed");
            true
        }
        Err(e) => {
            warn!(error = %e, "Failed to store refreshed session");
            false
        }
    }
}
