//! Credential validation: a pure request/response handler between the
//! system bus and an injected credential store.
//!
//! Grounded on `examples/original_source/server/src/authenticator.hpp`.
//! There, `PostgresAdapter::checkCredentials` is called synchronously in
//! the handler; here the store is `async` and given a fixed timeout,
//! since the original's "credential store is expected to have its own
//! short timeout" is made an explicit
//! `tokio::time::timeout` here instead of left to an external component.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info};

use crate::bus::events::{ServerLoginRequest, ServerLoginResponse};
use crate::bus::SystemBus;
use crate::domain::ClientId;
use crate::error::AuthError;

/// Maximum time allotted to a credential check before it is treated as a
/// failure.
pub const CREDENTIAL_CHECK_TIMEOUT: Duration = Duration::from_millis(50);

/// The external collaborator this crate treats as out of scope for
/// this crate's own implementation: something that can check a
/// name/password pair and return the resulting `ClientId`.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn check_credentials(&self, name: &str, password: &str) -> Result<ClientId, AuthError>;
}

pub struct Authenticator<S: CredentialStore + 'static> {
    system_bus: Arc<SystemBus>,
    store: Arc<S>,
}

impl<S: CredentialStore + 'static> Authenticator<S> {
    pub fn new(system_bus: Arc<SystemBus>, store: Arc<S>) -> Arc<Self> {
        Arc::new(Self { system_bus, store })
    }

    /// Subscribes to `ServerLoginRequest` on the system bus. Call once at
    /// startup. Each request spawns its own bounded-lifetime task so a
    /// slow credential store never blocks the publishing channel.
    pub fn install(self: &Arc<Self>) {
        let this = self.clone();
        self.system_bus
            .subscribe_login_request(move |event| this.clone().on_authenticate(event.clone()));
    }

    fn on_authenticate(self: Arc<Self>, request: ServerLoginRequest) {
        tokio::spawn(async move {
            info!(name = %request.request.name, "authenticating");
            let response = match tokio::time::timeout(
                CREDENTIAL_CHECK_TIMEOUT,
                self.store
                    .check_credentials(&request.request.name, &request.request.password),
            )
            .await
            {
                Ok(Ok(client_id)) => {
                    info!(client_id, "authentication successful");
                    ServerLoginResponse::success(request.connection_id, client_id)
                }
                Ok(Err(err)) => {
                    error!(name = %request.request.name, %err, "authentication failed");
                    ServerLoginResponse::failure(request.connection_id, err)
                }
                Err(_) => {
                    error!(name = %request.request.name, "credential check timed out");
                    ServerLoginResponse::failure(request.connection_id, AuthError::Timeout)
                }
            };
            self.system_bus.post_login_response(response);
        });
    }
}

/// An in-memory credential store for tests and local development. Not
/// wired into the production binary.
pub struct StaticCredentialStore {
    users: std::collections::HashMap<String, (String, ClientId)>,
}

impl StaticCredentialStore {
    pub fn new(users: Vec<(&str, &str, ClientId)>) -> Self {
        let users = users
            .into_iter()
            .map(|(name, password, id)| (name.to_string(), (password.to_string(), id)))
            .collect();
        Self { users }
    }
}

#[async_trait]
impl CredentialStore for StaticCredentialStore {
    async fn check_credentials(&self, name: &str, password: &str) -> Result<ClientId, AuthError> {
        match self.users.get(name) {
            None => Err(AuthError::UserNotFound),
            Some((expected, id)) if expected == password => Ok(*id),
            Some(_) => Err(AuthError::InvalidPassword),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::LoginRequest;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn successful_login_posts_ok_response() {
        let bus = Arc::new(SystemBus::new());
        let store = Arc::new(StaticCredentialStore::new(vec![("alice", "secret", 7)]));
        let authenticator = Authenticator::new(bus.clone(), store);
        authenticator.install();

        let seen = Arc::new(AtomicBool::new(false));
        let seen2 = seen.clone();
        bus.subscribe_login_response(move |response| {
            assert!(response.ok);
            assert_eq!(response.client_id, Some(7));
            seen2.store(true, Ordering::SeqCst);
        });

        bus.post_login_request(ServerLoginRequest {
            connection_id: 1,
            request: LoginRequest {
                name: "alice".to_string(),
                password: "secret".to_string(),
            },
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(seen.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn wrong_password_posts_failure_response() {
        let bus = Arc::new(SystemBus::new());
        let store = Arc::new(StaticCredentialStore::new(vec![("alice", "secret", 7)]));
        let authenticator = Authenticator::new(bus.clone(), store);
        authenticator.install();

        let seen = Arc::new(AtomicBool::new(false));
        let seen2 = seen.clone();
        bus.subscribe_login_response(move |response| {
            assert!(!response.ok);
            assert_eq!(response.error, Some(AuthError::InvalidPassword));
            seen2.store(true, Ordering::SeqCst);
        });

        bus.post_login_request(ServerLoginRequest {
            connection_id: 1,
            request: LoginRequest {
                name: "alice".to_string(),
                password: "wrong".to_string(),
            },
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(seen.load(Ordering::SeqCst));
    }
}
