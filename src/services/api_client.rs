// ============================================================================
// API CLIENT - servicio remoto sobre HTTP (solo navegador)
// ============================================================================
// Sin lógica de negocio: traduce el contrato `RemoteService` a requests REST.
// Cualquier fallo sin respuesta HTTP (o timeout) es `Unreachable`.
// ============================================================================

use async_trait::async_trait;
use futures::future::{select, Either};
use futures::pin_mut;
use gloo_net::http::{Request, Response};
use gloo_timers::future::TimeoutFuture;
use std::future::Future;
use std::rc::Rc;

use crate::config::SyncConfig;
use crate::error::RemoteError;
use crate::models::{Collection, Operation, ReadFilter, RemoteRecord};
use crate::services::remote::{RemoteService, WriteRequest};

/// Cliente HTTP stateless
#[derive(Clone)]
pub struct HttpRemote {
    config: Rc<SyncConfig>,
}

impl HttpRemote {
    pub fn new(config: Rc<SyncConfig>) -> Self {
        Self { config }
    }

    async fn with_timeout<T, F>(&self, request: F) -> Result<T, RemoteError>
    where
        F: Future<Output = Result<T, RemoteError>>,
    {
        let timeout = TimeoutFuture::new(self.config.remote_timeout_ms);
        pin_mut!(request);
        pin_mut!(timeout);

        match select(request, timeout).await {
            Either::Left((result, _)) => result,
            Either::Right(_) => Err(RemoteError::Unreachable(format!(
                "timeout tras {} ms",
                self.config.remote_timeout_ms
            ))),
        }
    }
}

fn network_error(err: gloo_net::Error) -> RemoteError {
    RemoteError::Unreachable(format!("Network error: {}", err))
}

async fn rejected(response: Response) -> RemoteError {
    let status = response.status();
    let message = response
        .text()
        .await
        .unwrap_or_else(|_| response.status_text());
    RemoteError::Rejected { status, message }
}

async fn parse_record(response: Response) -> Result<Option<RemoteRecord>, RemoteError> {
    if !response.ok() {
        return Err(rejected(response).await);
    }
    // 204 en los delete
    if response.status() == 204 {
        return Ok(None);
    }
    let status = response.status();
    response
        .json::<RemoteRecord>()
        .await
        .map(Some)
        .map_err(|e| RemoteError::Rejected {
            status,
            message: format!("Parse error: {}", e),
        })
}

#[async_trait(?Send)]
impl RemoteService for HttpRemote {
    async fn read(&self, collection: Collection, filter: &ReadFilter) -> Result<Vec<RemoteRecord>, RemoteError> {
        let url = self.config.collection_url(collection);
        let pairs = filter.query_pairs();

        log::debug!("📡 [ROUTER] GET {} {:?}", url, pairs);

        self.with_timeout(async {
            let response = Request::get(&url)
                .query(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .send()
                .await
                .map_err(network_error)?;

            if !response.ok() {
                return Err(rejected(response).await);
            }
            let status = response.status();
            response
                .json::<Vec<RemoteRecord>>()
                .await
                .map_err(|e| RemoteError::Rejected {
                    status,
                    message: format!("Parse error: {}", e),
                })
        })
        .await
    }

    async fn write(&self, request: WriteRequest) -> Result<Option<RemoteRecord>, RemoteError> {
        let base_url = self.config.collection_url(request.collection);
        let url = match request.record_id {
            Some(ref id) => format!("{}/{}", base_url, id),
            None => base_url,
        };

        log::debug!("📡 [DRAIN] {:?} {}", request.operation, url);

        self.with_timeout(async {
            let builder = match request.operation {
                Operation::Create => Request::post(&url),
                Operation::Update => Request::put(&url),
                Operation::Delete => Request::delete(&url),
            };
            let response = builder
                .json(&request)
                .map_err(|e| RemoteError::Rejected {
                    status: 0,
                    message: format!("Serialization error: {}", e),
                })?
                .send()
                .await
                .map_err(network_error)?;

            parse_record(response).await
        })
        .await
    }
}
