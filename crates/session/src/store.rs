use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use propwire_common::ApiError;

/// On-disk shape of the persisted session. One opaque token, keyed by a
/// fixed file name; the only durable state this client owns.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedSession {
    token: String,
}

/// File-based token storage at `~/.config/propwire/session.json`.
#[derive(Debug, Clone)]
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new() -> Self {
        let dir = directories::BaseDirs::new()
            .map(|d| d.home_dir().join(".config").join("propwire"))
            .unwrap_or_else(|| PathBuf::from(".propwire"));
        Self {
            path: dir.join("session.json"),
        }
    }

    /// Create a token store at a specific path (useful for testing).
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Read the persisted token. Any read or parse failure is treated as
    /// "no session" — never an error.
    pub fn load(&self) -> Option<String> {
        let data = std::fs::read_to_string(&self.path).ok()?;
        let persisted: PersistedSession = serde_json::from_str(&data).ok()?;
        Some(persisted.token)
    }

    /// Persist the token, replacing any prior value.
    pub fn save(&self, token: &str) -> Result<(), ApiError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(ApiError::storage)?;
        }

        let data = serde_json::to_string_pretty(&PersistedSession {
            token: token.to_string(),
        })
        .map_err(ApiError::storage)?;
        std::fs::write(&self.path, &data).map_err(ApiError::storage)?;

        // Credential file: owner-only on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(ApiError::storage)?;
        }

        Ok(())
    }

    /// Remove the persisted token. Removing an already-absent session
    /// succeeds silently.
    pub fn delete(&self) -> Result<(), ApiError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ApiError::storage(e)),
        }
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> (tempfile::TempDir, TokenStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = TokenStore::with_path(dir.path().join("session.json"));
        (dir, store)
    }

    #[test]
    fn save_then_load_round_trips() {
        let (_dir, store) = temp_store();
        store.save("tok123").unwrap();
        assert_eq!(store.load().as_deref(), Some("tok123"));
    }

    #[test]
    fn save_replaces_prior_value() {
        let (_dir, store) = temp_store();
        store.save("first").unwrap();
        store.save("second").unwrap();
        assert_eq!(store.load().as_deref(), Some("second"));
    }

    #[test]
    fn load_missing_file_is_none() {
        let (_dir, store) = temp_store();
        assert!(store.load().is_none());
    }

    #[test]
    fn load_corrupt_file_is_none() {
        let (_dir, store) = temp_store();
        std::fs::write(store.path.clone(), "not json").unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, store) = temp_store();
        store.delete().unwrap();
        store.save("tok123").unwrap();
        store.delete().unwrap();
        store.delete().unwrap();
        assert!(store.load().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn saved_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let (_dir, store) = temp_store();
        store.save("tok123").unwrap();
        let mode = std::fs::metadata(&store.path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
