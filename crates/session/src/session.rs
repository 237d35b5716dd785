use std::sync::Mutex;

use {
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, warn},
};

use propwire_common::{ApiError, RequestDescriptor, bearer_header};

use crate::store::TokenStore;

/// Single source of truth for the bearer token.
///
/// Holds the in-memory copy behind a mutex and keeps it in lockstep with
/// the [`TokenStore`]: a token only becomes visible once persisted (fail
/// closed), and is dropped from memory only after the persisted copy is
/// gone. Shared process-wide behind an `Arc`.
pub struct Session {
    store: TokenStore,
    token: Mutex<Option<Secret<String>>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("store", &self.store)
            .field("token", &self.token().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Session {
    pub fn new(store: TokenStore) -> Self {
        Self {
            store,
            token: Mutex::new(None),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Secret<String>>> {
        match self.token.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Load the persisted token at startup. A storage-read failure means
    /// "no session", never an error; absence routes the caller to login.
    pub fn restore(&self) -> Option<Secret<String>> {
        let loaded = self.store.load().map(Secret::new);
        let mut slot = self.slot();
        slot.clone_from(&loaded);
        if loaded.is_some() {
            debug!("restored persisted session");
        }
        loaded
    }

    /// Persist the token, then make it the active one. If persistence
    /// fails the in-memory token is left untouched and the caller must not
    /// issue dependent requests.
    pub fn set(&self, token: &str) -> Result<(), ApiError> {
        self.store.save(token)?;
        *self.slot() = Some(Secret::new(token.to_string()));
        Ok(())
    }

    /// Remove the persisted token, then the in-memory copy. Clearing an
    /// already-absent session succeeds silently.
    pub fn clear(&self) -> Result<(), ApiError> {
        self.store.delete()?;
        *self.slot() = None;
        Ok(())
    }

    /// The active token, if any.
    pub fn token(&self) -> Option<Secret<String>> {
        self.slot().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.slot().is_some()
    }

    /// Attach `Authorization: Bearer <token>` when a token is present;
    /// leave the descriptor untouched otherwise. Side-effect free.
    pub fn authorize(&self, desc: &mut RequestDescriptor) {
        let Some(token) = self.token() else {
            return;
        };
        match bearer_header(token.expose_secret()) {
            Some(value) => {
                desc.headers.insert(http::header::AUTHORIZATION, value);
            },
            None => warn!("stored token is not a valid header value, sending unauthenticated"),
        }
    }

    /// Inspect a response status. 401 means the backend rejected the
    /// token: the session is cleared and the caller gets `SessionExpired`
    /// so the UI can redirect to login. Everything else passes through.
    ///
    /// This is the only point where a failed call mutates session state,
    /// so a stored token is never stale beyond one rejected round trip.
    pub fn handle_status(&self, status: u16) -> Result<(), ApiError> {
        if status != 401 {
            return Ok(());
        }
        debug!("authentication rejected, clearing session");
        if let Err(e) = self.clear() {
            // The expiry signal still reaches the caller; the leftover
            // file will be rejected again on the next round trip.
            warn!(error = %e, "failed to clear persisted session");
        }
        Err(ApiError::SessionExpired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_session() -> (tempfile::TempDir, Session) {
        let dir = tempfile::tempdir().unwrap();
        let session = Session::new(TokenStore::with_path(dir.path().join("session.json")));
        (dir, session)
    }

    #[test]
    fn set_then_restore_returns_token() {
        let (dir, session) = temp_session();
        session.set("tok123").unwrap();

        // A fresh session over the same store sees the persisted token.
        let reopened = Session::new(TokenStore::with_path(dir.path().join("session.json")));
        let restored = reopened.restore().unwrap();
        assert_eq!(restored.expose_secret(), "tok123");
    }

    #[test]
    fn clear_then_restore_is_none() {
        let (_dir, session) = temp_session();
        session.set("tok123").unwrap();
        session.clear().unwrap();
        session.clear().unwrap(); // idempotent
        assert!(session.restore().is_none());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn authorize_attaches_bearer_header() {
        let (_dir, session) = temp_session();
        session.set("tok123").unwrap();

        let mut desc = RequestDescriptor::get("agent/user");
        session.authorize(&mut desc);
        assert_eq!(
            desc.authorization().unwrap().to_str().unwrap(),
            "Bearer tok123"
        );
    }

    #[test]
    fn authorize_without_token_leaves_no_header() {
        let (_dir, session) = temp_session();
        let mut desc = RequestDescriptor::get("agent/user");
        session.authorize(&mut desc);
        assert!(desc.authorization().is_none());
    }

    #[test]
    fn rejected_status_clears_session_and_signals_expiry() {
        let (_dir, session) = temp_session();
        session.set("tok123").unwrap();

        let err = session.handle_status(401).unwrap_err();
        assert!(matches!(err, ApiError::SessionExpired));
        assert!(!session.is_authenticated());
        assert!(session.restore().is_none());

        // A subsequent request carries no Authorization header.
        let mut desc = RequestDescriptor::get("agent/user");
        session.authorize(&mut desc);
        assert!(desc.authorization().is_none());
    }

    #[test]
    fn other_statuses_pass_through() {
        let (_dir, session) = temp_session();
        session.set("tok123").unwrap();
        session.handle_status(200).unwrap();
        session.handle_status(422).unwrap();
        session.handle_status(500).unwrap();
        assert!(session.is_authenticated());
    }

    #[test]
    fn failed_persistence_keeps_prior_token() {
        let dir = tempfile::tempdir().unwrap();
        // Parent "directory" is a regular file, so create_dir_all fails.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "x").unwrap();
        let session = Session::new(TokenStore::with_path(blocker.join("session.json")));

        let err = session.set("tok123").unwrap_err();
        assert!(matches!(err, ApiError::Storage { .. }));
        assert!(!session.is_authenticated());
    }
}
