//! Errores de la capa offline

use thiserror::Error;

use crate::models::Collection;

/// Error del contrato remoto: sin status HTTP = inalcanzable, con status = rechazado
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    #[error("Servicio remoto inalcanzable: {0}")]
    Unreachable(String),

    #[error("HTTP {status}: {message}")]
    Rejected { status: u16, message: String },
}

impl RemoteError {
    pub fn is_unreachable(&self) -> bool {
        matches!(self, RemoteError::Unreachable(_))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Se absorbe en el router (fallback offline); no llega a la UI en escrituras
    #[error("Red no disponible: {0}")]
    NetworkUnreachable(String),

    #[error("Escritura rechazada por el servidor (HTTP {status}): {message}")]
    RejectedWrite { status: u16, message: String },

    /// Fatal solo para la operación en curso
    #[error("Almacenamiento local no disponible: {0}")]
    StorageUnavailable(String),

    #[error("La colección '{0}' no está disponible offline")]
    NotSupportedOffline(Collection),

    #[error("Registro no encontrado: {collection}/{id}")]
    NotFound { collection: Collection, id: String },

    #[error("Conflicto desconocido: {0}")]
    UnknownConflict(String),

    #[error("Entrada de queue desconocida: {0}")]
    UnknownEntry(u64),

    #[error("Error de serialización: {0}")]
    Serialization(String),
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Unreachable(message) => SyncError::NetworkUnreachable(message),
            RemoteError::Rejected { status, message } => SyncError::RejectedWrite { status, message },
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Serialization(err.to_string())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
