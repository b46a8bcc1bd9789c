//! HTTP Transport
//!
//! reqwest client for a remote RGS. Keyed mutations send their token both in
//! the body and as an `Idempotency-Key` header. Non-2xx replies carrying a
//! `{status: {code, message}}` body map onto `RgsError` by code.

use std::time::Duration;

use reqwest::{Client as HttpClient, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::{ErrorCode, Result, RgsError};
use crate::network::protocol::{
    AcknowledgeEventRequest, AcknowledgeEventResponse, ActivateFreeSpinsResponse, BalanceResponse,
    BetHistoryRequest, BetHistoryResponse, BonusOptionsResponse, BonusRequest, BuyBonusResponse,
    EndRoundResponse, ErrorBody, GameInfoResponse, JackpotInfoResponse, RotateSeedRequest,
    RotateSeedResponse, RoundResponse, SessionRequest, SessionSnapshot, SubmitRoundRequest,
    TriggerSpinResponse,
};
use crate::network::transport::RgsTransport;

/// Header carrying the idempotency token.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// RGS over HTTP.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    base_url: Url,
    http_client: HttpClient,
}

impl HttpTransport {
    /// Create a transport for `base_url` with a per-request timeout.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        match base_url.scheme() {
            "http" | "https" => {}
            scheme => {
                return Err(RgsError::Config(format!(
                    "invalid URL scheme: {} (expected http or https)",
                    scheme
                )))
            }
        }
        // Url::join drops the last segment unless the path ends in '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http_client = HttpClient::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(60))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self { base_url, http_client })
    }

    /// Base URL requests are joined onto.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path)?;
        self.send(self.http_client.request(Method::GET, url)).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        idempotency_key: Option<&str>,
    ) -> Result<T> {
        let url = self.url(path)?;
        let mut request = self.http_client.request(Method::POST, url).json(body);
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_HEADER, key);
        }
        self.send(request).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = request.send().await?;
        let status = response.status();
        debug!("RGS {} -> {}", response.url().path(), status);

        if status.is_success() {
            return Ok(response.json::<T>().await?);
        }

        let body = response.text().await.unwrap_or_default();
        Err(error_from_response(status, &body))
    }
}

/// Map a failed HTTP reply onto the error taxonomy.
pub fn error_from_response(status: StatusCode, body: &str) -> RgsError {
    if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
        let message = parsed.status.message.unwrap_or_else(|| status.to_string());
        return RgsError::from_status(&parsed.status.code, message);
    }
    match status {
        StatusCode::BAD_GATEWAY | StatusCode::GATEWAY_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            RgsError::Network(format!("transient HTTP status {}", status))
        }
        StatusCode::SERVICE_UNAVAILABLE => RgsError::Server {
            code: ErrorCode::Maintenance.as_str().to_string(),
            message: status.to_string(),
        },
        StatusCode::UNAUTHORIZED => RgsError::SessionNotFound(status.to_string()),
        _ => RgsError::Server {
            code: ErrorCode::General.as_str().to_string(),
            message: format!("HTTP {}: {}", status, body.trim()),
        },
    }
}

impl RgsTransport for HttpTransport {
    async fn create_session(&self) -> Result<SessionSnapshot> {
        self.post("session/create", &serde_json::json!({}), None).await
    }

    async fn get_session(&self, request: &SessionRequest) -> Result<SessionSnapshot> {
        self.get(&format!("session/{}", request.session_id)).await
    }

    async fn balance(&self, request: &SessionRequest) -> Result<BalanceResponse> {
        self.post("wallet/balance", request, None).await
    }

    async fn submit_round(&self, request: &SubmitRoundRequest) -> Result<RoundResponse> {
        self.post("wallet/play", request, Some(&request.idempotency_key)).await
    }

    async fn acknowledge_event(&self, request: &AcknowledgeEventRequest) -> Result<AcknowledgeEventResponse> {
        self.post("bet/event", request, None).await
    }

    async fn end_round(&self, request: &SessionRequest) -> Result<EndRoundResponse> {
        self.post("wallet/end-round", request, None).await
    }

    async fn rotate_seed(&self, request: &RotateSeedRequest) -> Result<RotateSeedResponse> {
        let path = format!("session/{}/rotate-seed", request.session_id);
        self.post(&path, request, Some(&request.idempotency_key)).await
    }

    async fn buy_bonus(&self, request: &BonusRequest) -> Result<BuyBonusResponse> {
        self.post("bonus/buy", request, Some(&request.idempotency_key)).await
    }

    async fn bonus_trigger_spin(&self, request: &BonusRequest) -> Result<TriggerSpinResponse> {
        self.post("bonus/trigger-spin", request, Some(&request.idempotency_key)).await
    }

    async fn activate_free_spins(&self, request: &SessionRequest) -> Result<ActivateFreeSpinsResponse> {
        self.post("bonus/activate-free-spins", request, None).await
    }

    async fn bonus_options(&self) -> Result<BonusOptionsResponse> {
        self.get("bonus/options").await
    }

    async fn jackpot_info(&self) -> Result<JackpotInfoResponse> {
        self.get("jackpot/info").await
    }

    async fn bet_history(&self, request: &BetHistoryRequest) -> Result<BetHistoryResponse> {
        self.get(&history_path(request)).await
    }

    async fn game_info(&self) -> Result<GameInfoResponse> {
        self.get("game/info").await
    }
}

fn history_path(request: &BetHistoryRequest) -> String {
    format!("session/{}/history?limit={}", request.session_id, request.limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let transport = HttpTransport::new("https://rgs.example.com/api", Duration::from_secs(1)).unwrap();
        assert_eq!(transport.base_url().as_str(), "https://rgs.example.com/api/");
        assert_eq!(
            transport.url("wallet/play").unwrap().as_str(),
            "https://rgs.example.com/api/wallet/play"
        );
    }

    #[test]
    fn test_history_url_carries_limit() {
        let transport = HttpTransport::new("https://rgs.example.com/api", Duration::from_secs(1)).unwrap();
        let request = BetHistoryRequest { session_id: "s1".to_string(), limit: 25 };
        let url = transport.url(&history_path(&request)).unwrap();
        assert_eq!(url.path(), "/api/session/s1/history");
        assert_eq!(url.query(), Some("limit=25"));
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let err = HttpTransport::new("ws://rgs.example.com", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, RgsError::Config(_)));
    }

    #[test]
    fn test_error_body_maps_by_code() {
        let body = r#"{"status":{"code":"ERR_EVENT_ORDER","message":"expected event 1, got 2"}}"#;
        let err = error_from_response(StatusCode::CONFLICT, body);
        assert_eq!(err, RgsError::OutOfOrderAcknowledgement("expected event 1, got 2".into()));
    }

    #[test]
    fn test_bare_status_fallbacks() {
        assert!(error_from_response(StatusCode::BAD_GATEWAY, "").is_retryable());
        assert!(error_from_response(StatusCode::UNAUTHORIZED, "").is_terminal());
        let err = error_from_response(StatusCode::SERVICE_UNAVAILABLE, "");
        assert_eq!(err.code(), ErrorCode::Maintenance);
    }
}
