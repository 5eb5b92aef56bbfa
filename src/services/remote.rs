// ============================================================================
// CONTRATO DEL SERVICIO REMOTO
// ============================================================================
// Lo implementa `api_client::HttpRemote` en el navegador. Cualquier error sin
// status HTTP es `Unreachable` (camino offline); con status es `Rejected`.
// ============================================================================

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::RemoteError;
use crate::models::{Collection, Operation, ReadFilter, RemoteRecord};

/// Escritura dirigida al servidor. Nunca lleva un id temporal.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteRequest {
    pub collection: Collection,
    pub operation: Operation,
    /// `None` en los create: el servidor asigna el id
    pub record_id: Option<String>,
    pub payload: Value,
    pub modified_at: DateTime<Utc>,
    /// Versión del servidor que el cliente vio por última vez. El servidor puede
    /// rechazar (409) si su copia es más reciente.
    pub base_modified_at: Option<DateTime<Utc>>,
}

#[async_trait(?Send)]
pub trait RemoteService {
    async fn read(&self, collection: Collection, filter: &ReadFilter) -> Result<Vec<RemoteRecord>, RemoteError>;

    /// Devuelve el registro confirmado (`None` para delete)
    async fn write(&self, request: WriteRequest) -> Result<Option<RemoteRecord>, RemoteError>;
}
