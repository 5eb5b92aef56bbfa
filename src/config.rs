use serde::{Deserialize, Serialize};

use crate::models::Collection;

const DEFAULT_BACKEND_URL: &str = "http://localhost:3000";
const DEFAULT_NAMESPACE: &str = "offline_sync";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    pub backend_url: String,
    pub api_prefix: String,
    /// Prefijo de todas las claves en el almacenamiento local
    pub storage_namespace: String,
    /// Intentos antes de marcar una entrada como atascada
    pub max_attempts: u32,
    pub remote_timeout_ms: u32,
    /// Campos donde el merge prefiere el valor local (notas, tags)
    pub locally_authoritative_fields: Vec<String>,
    pub offline_collections: Vec<Collection>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            api_prefix: "/v1".to_string(),
            storage_namespace: DEFAULT_NAMESPACE.to_string(),
            max_attempts: 5,
            remote_timeout_ms: 15_000,
            locally_authoritative_fields: vec!["notes".to_string(), "tags".to_string()],
            offline_collections: Collection::offline_defaults(),
        }
    }
}

impl SyncConfig {
    /// Carga la configuración desde variables de entorno en tiempo de compilación
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            backend_url: option_env!("BACKEND_URL")
                .unwrap_or(DEFAULT_BACKEND_URL)
                .to_string(),
            api_prefix: option_env!("SYNC_API_PREFIX")
                .map(str::to_string)
                .unwrap_or(defaults.api_prefix),
            storage_namespace: option_env!("SYNC_STORAGE_NAMESPACE")
                .unwrap_or(DEFAULT_NAMESPACE)
                .to_string(),
            max_attempts: option_env!("SYNC_MAX_ATTEMPTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_attempts),
            remote_timeout_ms: option_env!("SYNC_REMOTE_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.remote_timeout_ms),
            locally_authoritative_fields: option_env!("SYNC_LOCAL_FIELDS")
                .map(parse_list)
                .unwrap_or(defaults.locally_authoritative_fields),
            offline_collections: option_env!("SYNC_OFFLINE_COLLECTIONS")
                .map(|v| parse_list(v).iter().filter_map(|c| c.parse().ok()).collect())
                .unwrap_or(defaults.offline_collections),
        }
    }

    pub fn with_backend_url(mut self, url: impl Into<String>) -> Self {
        self.backend_url = url.into();
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.storage_namespace = namespace.into();
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_locally_authoritative_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.locally_authoritative_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_offline_collections(mut self, collections: Vec<Collection>) -> Self {
        self.offline_collections = collections;
        self
    }

    pub fn is_offline_capable(&self, collection: Collection) -> bool {
        self.offline_collections.contains(&collection)
    }

    pub fn is_locally_authoritative(&self, field: &str) -> bool {
        self.locally_authoritative_fields.iter().any(|f| f == field)
    }

    /// URL completa del endpoint de una colección
    pub fn collection_url(&self, collection: Collection) -> String {
        format!(
            "{}{}/{}",
            self.backend_url.trim_end_matches('/'),
            self.api_prefix,
            collection.path()
        )
    }

    pub fn storage_key(&self, suffix: &str) -> String {
        format!("{}:{}", self.storage_namespace, suffix)
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

// Configuración global estática
lazy_static::lazy_static! {
    pub static ref CONFIG: SyncConfig = SyncConfig::from_env();
}
