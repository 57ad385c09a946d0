//! Control plane access over its HTTP API.
//!
//! ## Endpoints
//!
//! | Call | Request |
//! |------|---------|
//! | status | `GET /api/server/status`, `GET /api/client/status` |
//! | events | `GET /api/{server,client}/events?limit=N` |
//! | server | `POST /api/server/{start,stop,reset}` |
//! | client | `POST /api/client/configure`, `POST /api/client/close` |
//! | transfer | `POST /api/client/transfer/data`, `POST /api/client/transfer/file` (multipart) |
//! | history | `GET /api/transfers`, `GET /api/transfers/{id}` |
//! | reports | `GET /api/report/download`, `POST /api/report/generate` (PDF) |
//! | files | `GET /api/files/received`, `GET /api/files/download/{name}` |
//! | demo | `POST /api/demo/run` |
//! | info | `GET /api/protocols`, `GET /health` |
//!
//! Non-2xx responses carry `{"detail": "..."}`, surfaced as
//! [`ControlError::Rejected`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use rdtwatch_types::{
    ActionResponse, ClientConfig, ClientStatus, DemoRequest, DemoResult, EventsResponse,
    HealthReport, ProtocolInfo, ProtocolsResponse, RawEvent, ReceivedFile, ReceivedFilesResponse,
    ReportRequest, ServerConfig, ServerStatus, TransferRecord, TransferRequest, TransferResponse,
    TransfersResponse,
};

use super::{ControlError, ControlPlane, Download};

const DEFAULT_ENDPOINT: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound for raw-data transfers and demo runs, which only respond once
/// finished.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(600);

/// Query of `GET /api/report/download`.
#[derive(Debug, Serialize)]
struct ReportTarget<'a> {
    filename: &'a str,
    file_size: u64,
}

/// HTTP client for the transfer control plane.
#[derive(Debug, Clone)]
pub struct HttpControlPlane {
    client: Client,
    endpoint: String,
}

impl HttpControlPlane {
    /// Create a new builder for configuring the client.
    pub fn builder() -> HttpControlPlaneBuilder {
        HttpControlPlaneBuilder::default()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint, path)
    }

    /// `path` followed by one percent-encoded segment.
    fn segment_url(&self, path: &[&str], last: &str) -> Result<Url, ControlError> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| ControlError::Invalid(format!("{}: {}", self.endpoint, e)))?;
        url.path_segments_mut()
            .map_err(|()| ControlError::Invalid(format!("{} cannot take a path", self.endpoint)))?
            .pop_if_empty()
            .extend(path)
            .push(last);
        Ok(url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ControlError> {
        self.execute(self.client.get(self.url(path))).await
    }

    async fn post_action(&self, path: &str) -> Result<ActionResponse, ControlError> {
        self.execute(self.client.post(self.url(path))).await
    }

    async fn events(&self, origin: &str, limit: usize) -> Result<Vec<RawEvent>, ControlError> {
        let request = self
            .client
            .get(self.url(&format!("/api/{}/events", origin)))
            .query(&[("limit", limit)]);
        let body: EventsResponse = self.execute(request).await?;
        Ok(body.events)
    }

    async fn execute<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ControlError> {
        let response = check_status(request.send().await?).await?;
        response
            .json()
            .await
            .map_err(|e| ControlError::Parse(e.to_string()))
    }

    async fn download(&self, request: RequestBuilder) -> Result<Download, ControlError> {
        let response = check_status(request.send().await?).await?;
        let filename = response
            .headers()
            .get(CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(attachment_name);
        let bytes = response.bytes().await?;
        Ok(Download {
            filename,
            bytes: bytes.to_vec(),
        })
    }
}

/// The `filename` parameter of a `Content-Disposition` header.
fn attachment_name(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

/// Turn a non-success response into [`ControlError::Rejected`].
async fn check_status(response: Response) -> Result<Response, ControlError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ControlError::Rejected {
        status: status.as_u16(),
        detail: error_detail(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string()),
    })
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

// FastAPI-style errors put a string (or a validation list) under `detail`.
fn error_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail {
        serde_json::Value::String(detail) => Some(detail),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl ControlPlane for HttpControlPlane {
    async fn server_status(&self) -> Result<ServerStatus, ControlError> {
        self.get("/api/server/status").await
    }

    async fn client_status(&self) -> Result<ClientStatus, ControlError> {
        self.get("/api/client/status").await
    }

    async fn server_events(&self, limit: usize) -> Result<Vec<RawEvent>, ControlError> {
        self.events("server", limit).await
    }

    async fn client_events(&self, limit: usize) -> Result<Vec<RawEvent>, ControlError> {
        self.events("client", limit).await
    }

    async fn start_server(&self, config: &ServerConfig) -> Result<ActionResponse, ControlError> {
        let request = self.client.post(self.url("/api/server/start")).json(config);
        self.execute(request).await
    }

    async fn stop_server(&self) -> Result<ActionResponse, ControlError> {
        self.execute(self.client.post(self.url("/api/server/stop")))
            .await
    }

    async fn configure_client(
        &self,
        config: &ClientConfig,
    ) -> Result<ActionResponse, ControlError> {
        let request = self
            .client
            .post(self.url("/api/client/configure"))
            .json(config);
        self.execute(request).await
    }

    async fn transfer_data(
        &self,
        request: &TransferRequest,
    ) -> Result<TransferResponse, ControlError> {
        let request = self
            .client
            .post(self.url("/api/client/transfer/data"))
            .json(request)
            .timeout(TRANSFER_TIMEOUT);
        self.execute(request).await
    }

    async fn transfer_file(&self, path: &Path) -> Result<TransferResponse, ControlError> {
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| ControlError::Invalid(format!("not a file: {}", path.display())))?;
        let contents = tokio::fs::read(path).await?;

        let form = Form::new().part("file", Part::bytes(contents).file_name(filename));
        let request = self
            .client
            .post(self.url("/api/client/transfer/file"))
            .multipart(form);
        self.execute(request).await
    }

    async fn health(&self) -> Result<HealthReport, ControlError> {
        self.get("/health").await
    }

    async fn reset_server(&self) -> Result<ActionResponse, ControlError> {
        self.post_action("/api/server/reset").await
    }

    async fn close_client(&self) -> Result<ActionResponse, ControlError> {
        self.post_action("/api/client/close").await
    }

    async fn transfers(&self) -> Result<Vec<TransferRecord>, ControlError> {
        let body: TransfersResponse = self.get("/api/transfers").await?;
        Ok(body.transfers)
    }

    async fn transfer(&self, id: &str) -> Result<TransferRecord, ControlError> {
        let url = self.segment_url(&["api", "transfers"], id)?;
        self.execute(self.client.get(url)).await
    }

    async fn download_report(&self, request: &ReportRequest) -> Result<Download, ControlError> {
        let query = ReportTarget {
            filename: &request.filename,
            file_size: request.file_size,
        };
        let request = self
            .client
            .get(self.url("/api/report/download"))
            .query(&query);
        self.download(request).await
    }

    async fn generate_report(&self, request: &ReportRequest) -> Result<Download, ControlError> {
        let request = self
            .client
            .post(self.url("/api/report/generate"))
            .query(request);
        self.download(request).await
    }

    async fn received_files(&self) -> Result<Vec<ReceivedFile>, ControlError> {
        let body: ReceivedFilesResponse = self.get("/api/files/received").await?;
        Ok(body.files)
    }

    async fn download_file(&self, name: &str) -> Result<Download, ControlError> {
        let url = self.segment_url(&["api", "files", "download"], name)?;
        self.download(self.client.get(url)).await
    }

    async fn run_demo(&self, request: &DemoRequest) -> Result<DemoResult, ControlError> {
        let request = self
            .client
            .post(self.url("/api/demo/run"))
            .query(request)
            .timeout(TRANSFER_TIMEOUT);
        self.execute(request).await
    }

    async fn protocols(&self) -> Result<Vec<ProtocolInfo>, ControlError> {
        let body: ProtocolsResponse = self.get("/api/protocols").await?;
        Ok(body.protocols)
    }
}

/// Builder for HttpControlPlane.
#[derive(Debug, Default)]
pub struct HttpControlPlaneBuilder {
    endpoint: Option<String>,
    timeout: Option<Duration>,
}

impl HttpControlPlaneBuilder {
    /// Set the API base URL (e.g., "http://localhost:8000").
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the per-request timeout (default: 5 seconds).
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<HttpControlPlane, ControlError> {
        let endpoint = self
            .endpoint
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(ControlError::Invalid(format!(
                "expected http:// or https:// URL, got {}",
                endpoint
            )));
        }

        let client = Client::builder()
            .timeout(self.timeout.unwrap_or(DEFAULT_TIMEOUT))
            .build()?;

        Ok(HttpControlPlane {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let control = HttpControlPlane::builder().build().unwrap();
        assert_eq!(control.endpoint(), "http://localhost:8000");
    }

    #[test]
    fn test_builder_custom_trims_trailing_slash() {
        let control = HttpControlPlane::builder()
            .endpoint("http://rdt.local:9000/")
            .timeout(Duration::from_secs(1))
            .build()
            .unwrap();
        assert_eq!(control.endpoint(), "http://rdt.local:9000");
        assert_eq!(
            control.url("/api/server/status"),
            "http://rdt.local:9000/api/server/status"
        );
    }

    #[test]
    fn test_builder_rejects_websocket_url() {
        let err = HttpControlPlane::builder()
            .endpoint("ws://localhost:8000")
            .build()
            .unwrap_err();
        assert!(matches!(err, ControlError::Invalid(_)));
    }

    #[test]
    fn test_error_detail_string() {
        assert_eq!(
            error_detail(r#"{"detail": "Server already running"}"#).as_deref(),
            Some("Server already running")
        );
    }

    #[test]
    fn test_error_detail_validation_list() {
        let detail = error_detail(r#"{"detail": [{"loc": ["body", "port"]}]}"#).unwrap();
        assert!(detail.contains("port"));
    }

    #[test]
    fn test_error_detail_missing() {
        assert_eq!(error_detail("Internal Server Error"), None);
        assert_eq!(error_detail(r#"{"message": "nope"}"#), None);
    }

    #[test]
    fn test_segment_url_encodes_name() {
        let control = HttpControlPlane::builder()
            .endpoint("http://rdt.local:9000")
            .build()
            .unwrap();
        let url = control
            .segment_url(&["api", "files", "download"], "my report#1.pdf")
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://rdt.local:9000/api/files/download/my%20report%231.pdf"
        );
    }

    #[test]
    fn test_segment_url_keeps_base_path() {
        let control = HttpControlPlane::builder()
            .endpoint("http://rdt.local/rdt/")
            .build()
            .unwrap();
        let url = control
            .segment_url(&["api", "transfers"], "transfer_17")
            .unwrap();
        assert_eq!(url.as_str(), "http://rdt.local/rdt/api/transfers/transfer_17");
    }

    #[test]
    fn test_attachment_name() {
        assert_eq!(
            attachment_name("attachment; filename=transfer_report_transfer_1.pdf").as_deref(),
            Some("transfer_report_transfer_1.pdf")
        );
        assert_eq!(
            attachment_name(r#"attachment; filename="notes.txt""#).as_deref(),
            Some("notes.txt")
        );
        assert_eq!(attachment_name("inline"), None);
    }

    #[tokio::test]
    async fn test_transfer_file_missing_path() {
        let control = HttpControlPlane::builder().build().unwrap();
        let err = control
            .transfer_file(Path::new("/definitely/not/here.bin"))
            .await
            .unwrap_err();
        assert!(matches!(err, ControlError::Io(_)));
    }
}
