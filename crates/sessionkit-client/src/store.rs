//! Key/value persistence for the last-used [`Configuration`].
//!
//! A store is scoped to one profile namespace (the original host kept one
//! preferences file per profile). Only four typed accessors are required;
//! [`ConfigStoreExt`] layers the field-by-field `Configuration` mapping on
//! top of any store.
//!
//! ```text
//!   ConfigStore (get/put string, get/put bool)
//!        │
//!        ├── MemoryConfigStore      shared HashMap, clones see each other
//!        └── JsonFileConfigStore    one JSON document per profile
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sessionkit_types::Configuration;

use crate::StoreError;

/// Keys under which [`ConfigStoreExt`] persists a [`Configuration`].
pub mod keys {
    pub const CLIENT_ID: &str = "clientID";
    pub const ENDPOINT: &str = "endpoint";
    pub const SSO_ENABLED: &str = "isSsoEnabled";
    pub const USE_ALTERNATE_UI: &str = "useAlternateUi";
    pub const APP2APP_ENDPOINT: &str = "app2appEndpoint";
    pub const PRE_AUTH_ENABLED: &str = "isPreAuthenticatedUrlEnabled";
    pub const PRE_AUTH_CLIENT_ID: &str = "preAuthenticatedUrlClientID";
    pub const PRE_AUTH_REDIRECT_URI: &str = "preAuthenticatedUrlRedirectURI";
    pub const TRANSIENT_SESSION: &str = "transientSession";
}

/// Typed key/value storage within one profile namespace.
///
/// Missing keys read as `None`. Implementations must be safe to share
/// between the orchestrator and whatever reads the configuration at start.
pub trait ConfigStore: Send + Sync + 'static {
    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn put_string(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn get_bool(&self, key: &str) -> Result<Option<bool>, StoreError>;
    fn put_bool(&self, key: &str, value: bool) -> Result<(), StoreError>;
}

/// Field-by-field [`Configuration`] persistence for any [`ConfigStore`].
pub trait ConfigStoreExt: ConfigStore {
    /// Reads the stored configuration; absent fields take their defaults.
    fn load_configuration(&self) -> Result<Configuration, StoreError> {
        let string = |key| -> Result<String, StoreError> {
            Ok(self.get_string(key)?.unwrap_or_default())
        };
        let flag = |key| -> Result<bool, StoreError> {
            Ok(self.get_bool(key)?.unwrap_or(false))
        };

        Ok(Configuration {
            client_id: string(keys::CLIENT_ID)?,
            endpoint: string(keys::ENDPOINT)?,
            sso_enabled: flag(keys::SSO_ENABLED)?,
            use_alternate_ui: flag(keys::USE_ALTERNATE_UI)?,
            app2app_endpoint: string(keys::APP2APP_ENDPOINT)?,
            pre_auth_enabled: flag(keys::PRE_AUTH_ENABLED)?,
            pre_auth_client_id: string(keys::PRE_AUTH_CLIENT_ID)?,
            pre_auth_redirect_uri: string(keys::PRE_AUTH_REDIRECT_URI)?,
            transient_session: flag(keys::TRANSIENT_SESSION)?,
        })
    }

    /// Writes every field, overwriting whatever was stored before.
    fn save_configuration(&self, config: &Configuration) -> Result<(), StoreError> {
        self.put_string(keys::CLIENT_ID, &config.client_id)?;
        self.put_string(keys::ENDPOINT, &config.endpoint)?;
        self.put_bool(keys::SSO_ENABLED, config.sso_enabled)?;
        self.put_bool(keys::USE_ALTERNATE_UI, config.use_alternate_ui)?;
        self.put_string(keys::APP2APP_ENDPOINT, &config.app2app_endpoint)?;
        self.put_bool(keys::PRE_AUTH_ENABLED, config.pre_auth_enabled)?;
        self.put_string(keys::PRE_AUTH_CLIENT_ID, &config.pre_auth_client_id)?;
        self.put_string(
            keys::PRE_AUTH_REDIRECT_URI,
            &config.pre_auth_redirect_uri,
        )?;
        self.put_bool(keys::TRANSIENT_SESSION, config.transient_session)?;
        Ok(())
    }
}

impl<S: ConfigStore + ?Sized> ConfigStoreExt for S {}

// ---------------------------------------------------------------------------
// MemoryConfigStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Str(String),
    Bool(bool),
}

/// In-memory [`ConfigStore`].
///
/// Clones share the same backing map, so a clone handed to one
/// orchestrator can be read by another to simulate a restart.
#[derive(Debug, Clone)]
pub struct MemoryConfigStore {
    profile: String,
    entries: Arc<Mutex<HashMap<String, Value>>>,
}

impl MemoryConfigStore {
    pub fn new(profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// A store for another profile over the same backing map.
    pub fn with_profile(&self, profile: impl Into<String>) -> Self {
        Self {
            profile: profile.into(),
            entries: Arc::clone(&self.entries),
        }
    }

    fn scoped(&self, key: &str) -> String {
        format!("{}/{key}", self.profile)
    }
}

impl Default for MemoryConfigStore {
    fn default() -> Self {
        Self::new("default")
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        match entries.get(&self.scoped(key)) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(Value::Bool(_)) => Err(StoreError::TypeMismatch {
                key: key.to_string(),
                expected: "string",
            }),
        }
    }

    fn put_string(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries =
            self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(self.scoped(key), Value::Str(value.to_string()));
        Ok(())
    }

    fn get_bool(&self, key: &str) -> Result<Option<bool>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        match entries.get(&self.scoped(key)) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::Str(_)) => Err(StoreError::TypeMismatch {
                key: key.to_string(),
                expected: "bool",
            }),
        }
    }

    fn put_bool(&self, key: &str, value: bool) -> Result<(), StoreError> {
        let mut entries =
            self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(self.scoped(key), Value::Bool(value));
        Ok(())
    }
}
