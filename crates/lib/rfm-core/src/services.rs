use std::error::Error;
use std::fmt;
use std::sync::{Arc, OnceLock};

use rfm_store::schema::DEFAULT_SESSION_NAME;
use tokio::sync::{Mutex, RwLock};
use tracing::info;

use crate::control::{ControlError, CredentialSource, Session};
use crate::inference::InferenceService;
use crate::source::TableLoader;

pub type SharedSession = Arc<Mutex<Session>>;

/// Collaborators every session is built with.
#[derive(Clone)]
pub struct SessionManagerConfig {
    pub loader: Arc<dyn TableLoader>,
    pub service: Arc<dyn InferenceService>,
    pub credentials: Arc<dyn CredentialSource>,
}

impl SessionManagerConfig {
    #[must_use]
    pub fn new(
        loader: Arc<dyn TableLoader>,
        service: Arc<dyn InferenceService>,
        credentials: Arc<dyn CredentialSource>,
    ) -> Self {
        Self {
            loader,
            service,
            credentials,
        }
    }
}

#[derive(Debug)]
pub enum SessionError {
    Initialization {
        session: String,
        source: ControlError,
    },
}

impl SessionError {
    /// The underlying control failure.
    #[must_use]
    pub const fn control(&self) -> &ControlError {
        match self {
            Self::Initialization { source, .. } => source,
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialization { session, source } => {
                write!(f, "session '{session}' could not be initialized: {source}")
            }
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(self.control())
    }
}

/// Owns the process-wide default session.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionManagerInner>,
}

struct SessionManagerInner {
    default: RwLock<SharedSession>,
    config: SessionManagerConfig,
}

impl SessionManager {
    #[must_use]
    pub fn new(config: SessionManagerConfig) -> Self {
        let session = Self::build_session(&config);
        Self {
            inner: Arc::new(SessionManagerInner {
                default: RwLock::new(session),
                config,
            }),
        }
    }

    /// Returns the default session, authenticating it on first access.
    ///
    /// # Errors
    /// Returns `SessionError` if the session cannot be initialized. The session
    /// stays uninitialized in that case.
    pub async fn get_default_session(&self) -> Result<SharedSession, SessionError> {
        let session = self.peek_default_session().await;
        {
            let mut guard = session.lock().await;
            guard
                .initialize(self.inner.config.credentials.as_ref())
                .await
                .map_err(|source| SessionError::Initialization {
                    session: guard.name().to_string(),
                    source,
                })?;
        }
        Ok(session)
    }

    /// Returns the default session without initializing it.
    pub async fn peek_default_session(&self) -> SharedSession {
        self.inner.default.read().await.clone()
    }

    /// Replaces the default session with a fresh, uninitialized one.
    pub async fn reset(&self) {
        let fresh = Self::build_session(&self.inner.config);
        *self.inner.default.write().await = fresh;
        info!("default session reset");
    }

    fn build_session(config: &SessionManagerConfig) -> SharedSession {
        Arc::new(Mutex::new(Session::new(
            DEFAULT_SESSION_NAME,
            config.loader.clone(),
            config.service.clone(),
        )))
    }
}

static GLOBAL_SESSION_MANAGER: OnceLock<SessionManager> = OnceLock::new();

/// Returns the process-wide manager, building it with `init` on first call.
pub fn global_session_manager(init: impl FnOnce() -> SessionManager) -> &'static SessionManager {
    GLOBAL_SESSION_MANAGER.get_or_init(init)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use rfm_store::GraphMetadata;

    use super::*;
    use crate::inference::{InferenceError, ModelHandle};
    use crate::source::{LoadError, TableData};

    struct NoFiles;

    impl TableLoader for NoFiles {
        fn load(&self, path: &str) -> Result<TableData, LoadError> {
            Err(LoadError::UnsupportedFormat(path.to_string()))
        }
    }

    #[derive(Default)]
    struct CountingService {
        authentications: AtomicUsize,
    }

    #[async_trait]
    impl InferenceService for CountingService {
        async fn authenticate(&self, _: &str) -> Result<(), InferenceError> {
            self.authentications.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn materialize(
            &self,
            _: &GraphMetadata,
        ) -> Result<Arc<dyn ModelHandle>, InferenceError> {
            Err(InferenceError::NotAuthenticated)
        }
    }

    struct Credential(Option<&'static str>);

    impl CredentialSource for Credential {
        fn credential(&self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    fn manager(
        service: Arc<CountingService>,
        credential: Option<&'static str>,
    ) -> SessionManager {
        SessionManager::new(SessionManagerConfig::new(
            Arc::new(NoFiles),
            service,
            Arc::new(Credential(credential)),
        ))
    }

    #[tokio::test]
    async fn default_session_is_a_singleton() {
        let service = Arc::new(CountingService::default());
        let manager = manager(service.clone(), Some("kumo-key"));

        let (left, right) = tokio::join!(
            manager.get_default_session(),
            manager.get_default_session()
        );
        let left = left.expect("left session");
        let right = right.expect("right session");
        assert!(Arc::ptr_eq(&left, &right));
        assert!(left.lock().await.is_initialized());
        assert_eq!(service.authentications.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_credential_fails_and_leaves_session_uninitialized() {
        let manager = manager(Arc::new(CountingService::default()), None);
        let err = manager
            .get_default_session()
            .await
            .expect_err("missing credential");
        assert!(matches!(err.control(), ControlError::MissingCredential(_)));

        let session = manager.peek_default_session().await;
        assert!(!session.lock().await.is_initialized());
    }

    #[tokio::test]
    async fn reset_builds_a_fresh_session() {
        let service = Arc::new(CountingService::default());
        let manager = manager(service.clone(), Some("kumo-key"));
        let before = manager.get_default_session().await.expect("session");

        manager.reset().await;
        let peeked = manager.peek_default_session().await;
        assert!(!Arc::ptr_eq(&before, &peeked));
        assert!(!peeked.lock().await.is_initialized());

        manager.get_default_session().await.expect("session");
        assert_eq!(service.authentications.load(Ordering::SeqCst), 2);
    }
}
