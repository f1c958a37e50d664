use std::{collections::VecDeque, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use shared::{
    domain::{Sector, Task},
    error::ApiError,
    protocol::{
        LoginRequest, PedidoVendaDto, PedidoVendaPayload, RefreshRequest, RemoteErrorBody,
        TokenPairResponse, UpdateSectorRequest,
    },
};
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};
use url::Url;

use crate::credentials::{Credential, CredentialStore};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
pub struct ApiClientOptions {
    pub base_url: Url,
    pub request_timeout: Duration,
    pub refresh_timeout: Duration,
}

impl ApiClientOptions {
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }
}

/// Tracks the one refresh allowed in flight at a time. Requests that hit a
/// 401 while it is set park a oneshot here and observe the shared outcome;
/// the queue is drained exactly once, in registration order.
struct RefreshGate {
    in_flight: bool,
    waiters: VecDeque<oneshot::Sender<Option<String>>>,
}

/// The single entry point for every board operation against the remote API.
///
/// Each request carries the current bearer token. On a 401 the client runs
/// one token refresh (single-flight across concurrent callers) and replays
/// the request once with the new token; a second 401 resolves as
/// [`ApiError::AuthExpired`]. No other failure is retried at this layer.
pub struct ApiClient {
    http: Client,
    base_url: Url,
    refresh_timeout: Duration,
    credentials: Arc<CredentialStore>,
    refresh: Mutex<RefreshGate>,
}

impl ApiClient {
    pub fn new(options: ApiClientOptions, credentials: Arc<CredentialStore>) -> Result<Self> {
        let http = Client::builder()
            .timeout(options.request_timeout)
            .build()
            .context("building http client")?;
        Ok(Self {
            http,
            base_url: options.base_url,
            refresh_timeout: options.refresh_timeout,
            credentials,
            refresh: Mutex::new(RefreshGate {
                in_flight: false,
                waiters: VecDeque::new(),
            }),
        })
    }

    pub fn credentials(&self) -> &Arc<CredentialStore> {
        &self.credentials
    }

    /// Exchanges username/password for the session's credential pair.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let url = self.endpoint("/auth/login")?;
        let response = self
            .http
            .post(url)
            .json(&LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .map_err(map_transport_error)?;
        let response = check_status(response).await?;
        let pair: TokenPairResponse = response.json().await.map_err(map_transport_error)?;
        let (Some(access_token), Some(refresh_token)) = (pair.access_token, pair.refresh_token)
        else {
            return Err(ApiError::Transport(
                "login response missing token pair".to_string(),
            ));
        };
        self.credentials
            .set(Credential {
                access_token,
                refresh_token,
            })
            .await;
        info!(%username, "logged in");
        Ok(())
    }

    pub async fn logout(&self) {
        self.credentials.clear().await;
    }

    /// Fetches the orders issued within a period and maps them onto board
    /// tasks. Orders with an unmapped sector land in `usinagem`.
    pub async fn fetch_orders(
        &self,
        data_inicial: NaiveDate,
        data_final: NaiveDate,
    ) -> Result<Vec<Task>, ApiError> {
        let mut url = self.endpoint("/pedidos-venda")?;
        url.query_pairs_mut()
            .append_pair("dataInicial", &data_inicial.format("%Y-%m-%d").to_string())
            .append_pair("dataFinal", &data_final.format("%Y-%m-%d").to_string());
        let response = self.execute(Method::GET, url, None).await?;
        let orders: Vec<PedidoVendaDto> = response.json().await.map_err(map_transport_error)?;
        debug!(count = orders.len(), "fetched orders");
        Ok(orders.into_iter().map(PedidoVendaDto::into_task).collect())
    }

    /// Persists a sector move. Success has no required body; a failure body
    /// may carry a `message` surfaced verbatim in the returned error.
    pub async fn update_order_sector(
        &self,
        id_pedido: i64,
        sector: Sector,
    ) -> Result<(), ApiError> {
        let url = self.endpoint("/pedidos-venda/atualizarSetor")?;
        let body = to_body(&UpdateSectorRequest {
            id_pedido,
            id_novo_setor: sector.remote_id(),
        })?;
        self.execute(Method::PUT, url, Some(body)).await?;
        Ok(())
    }

    pub async fn create_order(&self, payload: &PedidoVendaPayload) -> Result<Task, ApiError> {
        let url = self.endpoint("/pedidos-venda")?;
        let response = self
            .execute(Method::POST, url, Some(to_body(payload)?))
            .await?;
        let created: PedidoVendaDto = response.json().await.map_err(map_transport_error)?;
        Ok(created.into_task())
    }

    pub async fn update_order(&self, task: &Task) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("/pedidos-venda/{}", task.id))?;
        let payload = PedidoVendaPayload::from_task(task);
        self.execute(Method::PUT, url, Some(to_body(&payload)?))
            .await?;
        Ok(())
    }

    /// Sends one authenticated request, running the 401 -> refresh -> replay
    /// protocol. The replay happens at most once per call.
    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<Value>,
    ) -> Result<Response, ApiError> {
        let token = self.credentials.access_token().await;
        let response = self
            .send_once(method.clone(), url.clone(), body.as_ref(), token.as_deref())
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        debug!(path = url.path(), "unauthorized, attempting token refresh");
        let refreshed = self.refresh_access_token().await?;
        let response = self
            .send_once(method, url.clone(), body.as_ref(), Some(&refreshed))
            .await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            warn!(path = url.path(), "still unauthorized after refresh");
            return Err(ApiError::AuthExpired);
        }
        check_status(response).await
    }

    async fn send_once(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> Result<Response, ApiError> {
        let mut request = self.http.request(method, url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        request.send().await.map_err(map_transport_error)
    }

    /// Single-flight refresh. The first caller performs the network call;
    /// every concurrent caller parks on a oneshot and shares its outcome.
    async fn refresh_access_token(&self) -> Result<String, ApiError> {
        let waiter = {
            let mut gate = self.refresh.lock().await;
            if gate.in_flight {
                let (tx, rx) = oneshot::channel();
                gate.waiters.push_back(tx);
                Some(rx)
            } else {
                gate.in_flight = true;
                None
            }
        };

        if let Some(rx) = waiter {
            return match rx.await {
                Ok(Some(token)) => Ok(token),
                _ => Err(ApiError::AuthExpired),
            };
        }

        let outcome = self.run_refresh().await;
        let shared = outcome.as_ref().ok().cloned();
        let waiters: Vec<_> = {
            let mut gate = self.refresh.lock().await;
            gate.in_flight = false;
            gate.waiters.drain(..).collect()
        };
        for waiter in waiters {
            let _ = waiter.send(shared.clone());
        }
        outcome
    }

    /// On failure the store is cleared before anyone observes the error, so
    /// no later request retries a refresh with stale data.
    async fn run_refresh(&self) -> Result<String, ApiError> {
        let Some(refresh_token) = self.credentials.refresh_token().await else {
            warn!("no refresh token, session cannot be recovered");
            self.credentials.clear().await;
            return Err(ApiError::AuthExpired);
        };

        let url = self.endpoint("/auth/refresh")?;
        let response = self
            .http
            .post(url)
            .timeout(self.refresh_timeout)
            .json(&RefreshRequest {
                refresh_token: refresh_token.clone(),
            })
            .send()
            .await;

        let pair = match response {
            Ok(resp) if resp.status().is_success() => {
                resp.json::<TokenPairResponse>().await.ok()
            }
            _ => None,
        };
        let Some(TokenPairResponse {
            access_token: Some(access_token),
            refresh_token: rotated,
        }) = pair
        else {
            warn!("token refresh failed, clearing credentials");
            self.credentials.clear().await;
            return Err(ApiError::AuthExpired);
        };

        // Keep the previous refresh token unless the server rotated it.
        self.credentials
            .set(Credential {
                access_token: access_token.clone(),
                refresh_token: rotated.unwrap_or(refresh_token),
            })
            .await;
        info!("access token refreshed");
        Ok(access_token)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|err| ApiError::Transport(format!("invalid endpoint {path}: {err}")))
    }
}

fn to_body<T: serde::Serialize>(value: &T) -> Result<Value, ApiError> {
    serde_json::to_value(value).map_err(|err| ApiError::Transport(err.to_string()))
}

fn map_transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Transport(err.to_string())
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response
        .json::<RemoteErrorBody>()
        .await
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    Err(ApiError::status(status.as_u16(), message))
}
