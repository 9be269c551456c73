use async_trait::async_trait;
use http::{Method, Request, Response, header};
use serde::{Deserialize, Serialize};

use manos_notes_core::LinkPreviewAttrs;

use crate::config::EndpointConfig;
use crate::error::FetchError;

/// The endpoints tried, in order, to resolve a chart figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartTier {
    Dashboard,
    Store,
    Refresh,
}

impl ChartTier {
    pub const ORDER: [ChartTier; 3] = [ChartTier::Dashboard, ChartTier::Store, ChartTier::Refresh];
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartFigure {
    pub figure_json: String,
    pub tier: ChartTier,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct LinkMetadata {
    pub kind: String,
    pub provider: Option<String>,
    pub title: Option<String>,
    pub subtitle: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "imageUrl")]
    pub image_url: Option<String>,
}

impl LinkMetadata {
    pub fn into_attrs(self, url: impl Into<String>) -> LinkPreviewAttrs {
        LinkPreviewAttrs {
            url: url.into(),
            kind: if self.kind.is_empty() {
                "link".into()
            } else {
                self.kind
            },
            provider: self.provider,
            title: self.title,
            subtitle: self.subtitle,
            description: self.description,
            image_url: self.image_url,
            ..LinkPreviewAttrs::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UploadedImage {
    #[serde(default)]
    pub id: Option<String>,
    pub url: String,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Fetchers run on the UI thread's executor, so their futures need not be
/// `Send`.
#[async_trait(?Send)]
pub trait ChartSource {
    async fn fetch_figure(&self, tier: ChartTier, chart_id: &str) -> Result<String, FetchError>;
}

#[async_trait(?Send)]
pub trait LinkMetadataSource {
    async fn fetch_metadata(&self, url: &str) -> Result<LinkMetadata, FetchError>;
}

#[async_trait(?Send)]
pub trait ImageUploader {
    async fn upload(&self, file: &ImageFile) -> Result<UploadedImage, FetchError>;
}

/// Sends a request over whatever HTTP stack the host has.
#[async_trait(?Send)]
pub trait HttpTransport {
    async fn send(&self, request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, FetchError>;
}

/// Resolve a chart's figure, falling through dashboard, store and forced
/// refresh endpoints until one answers.
pub async fn fetch_chart_figure(source: &dyn ChartSource, chart_id: &str) -> Result<ChartFigure, FetchError> {
    let mut last = FetchError::Transport("no tier attempted".into());
    for tier in ChartTier::ORDER {
        match source.fetch_figure(tier, chart_id).await {
            Ok(figure_json) => return Ok(ChartFigure { figure_json, tier }),
            Err(err) => {
                tracing::debug!(chart_id, ?tier, "chart figure tier failed: {err}");
                last = err;
            }
        }
    }
    tracing::warn!(chart_id, "all chart figure tiers failed");
    Err(FetchError::Exhausted {
        chart_id: chart_id.to_string(),
        last: Box::new(last),
    })
}

const UPLOAD_BOUNDARY: &str = "----manos-notes-upload";

/// Backend client speaking to the research API through a host transport.
pub struct ApiClient<T> {
    transport: T,
    endpoints: EndpointConfig,
}

impl<T: HttpTransport> ApiClient<T> {
    pub fn new(transport: T, endpoints: EndpointConfig) -> Self {
        Self { transport, endpoints }
    }

    fn url(&self, template: &str, key: &str, value: &str) -> String {
        format!(
            "{}{}",
            self.endpoints.base_url.trim_end_matches('/'),
            template.replace(key, value)
        )
    }

    pub(crate) fn chart_request(&self, tier: ChartTier, chart_id: &str) -> Result<Request<Vec<u8>>, FetchError> {
        let template = match tier {
            ChartTier::Dashboard => &self.endpoints.chart_dashboard,
            ChartTier::Store => &self.endpoints.chart_store,
            ChartTier::Refresh => &self.endpoints.chart_refresh,
        };
        let uri = self.url(template, "{id}", &urlencoding::encode(chart_id));
        Ok(Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::ACCEPT, "application/json")
            .body(Vec::new())?)
    }

    pub(crate) fn link_request(&self, url: &str) -> Result<Request<Vec<u8>>, FetchError> {
        let uri = self.url(&self.endpoints.link_metadata, "{url}", &urlencoding::encode(url));
        Ok(Request::builder()
            .method(Method::GET)
            .uri(uri)
            .header(header::ACCEPT, "application/json")
            .body(Vec::new())?)
    }

    pub(crate) fn upload_request(&self, file: &ImageFile) -> Result<Request<Vec<u8>>, FetchError> {
        let mut body = Vec::with_capacity(file.bytes.len() + 256);
        body.extend_from_slice(format!("--{UPLOAD_BOUNDARY}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
                file.name.replace('"', "")
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", file.mime).as_bytes());
        body.extend_from_slice(&file.bytes);
        body.extend_from_slice(format!("\r\n--{UPLOAD_BOUNDARY}--\r\n").as_bytes());

        let uri = format!(
            "{}{}",
            self.endpoints.base_url.trim_end_matches('/'),
            self.endpoints.image_upload
        );
        Ok(Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={UPLOAD_BOUNDARY}"),
            )
            .body(body)?)
    }

    async fn send_ok(&self, request: Request<Vec<u8>>) -> Result<Vec<u8>, FetchError> {
        let response = self.transport.send(request).await?;
        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }
        Ok(response.into_body())
    }
}

#[async_trait(?Send)]
impl<T: HttpTransport> ChartSource for ApiClient<T> {
    async fn fetch_figure(&self, tier: ChartTier, chart_id: &str) -> Result<String, FetchError> {
        let body = self.send_ok(self.chart_request(tier, chart_id)?).await?;
        // Accept either the bare figure or `{"figure": ...}`.
        let value: serde_json::Value = serde_json::from_slice(&body)?;
        let figure = match value {
            serde_json::Value::Object(mut map) if map.contains_key("figure") => {
                map.remove("figure").unwrap_or_default()
            }
            other => other,
        };
        if figure.is_null() {
            return Err(FetchError::Decode("empty figure".into()));
        }
        Ok(figure.to_string())
    }
}

#[async_trait(?Send)]
impl<T: HttpTransport> LinkMetadataSource for ApiClient<T> {
    async fn fetch_metadata(&self, url: &str) -> Result<LinkMetadata, FetchError> {
        let body = self.send_ok(self.link_request(url)?).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait(?Send)]
impl<T: HttpTransport> ImageUploader for ApiClient<T> {
    async fn upload(&self, file: &ImageFile) -> Result<UploadedImage, FetchError> {
        let body = self.send_ok(self.upload_request(file)?).await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoTransport;

    #[async_trait(?Send)]
    impl HttpTransport for NoTransport {
        async fn send(&self, _request: Request<Vec<u8>>) -> Result<Response<Vec<u8>>, FetchError> {
            Err(FetchError::Transport("offline".into()))
        }
    }

    fn client() -> ApiClient<NoTransport> {
        ApiClient::new(
            NoTransport,
            EndpointConfig {
                base_url: "https://research.example/".into(),
                ..EndpointConfig::default()
            },
        )
    }

    #[test]
    fn chart_tiers_use_their_own_endpoint() {
        let client = client();
        let uris: Vec<String> = ChartTier::ORDER
            .iter()
            .map(|tier| client.chart_request(*tier, "c 1").unwrap().uri().to_string())
            .collect();
        assert_eq!(
            uris,
            vec![
                "https://research.example/api/dashboard/charts/c%201/figure",
                "https://research.example/api/charts/c%201/figure",
                "https://research.example/api/charts/c%201/figure?refresh=true",
            ]
        );
    }

    #[test]
    fn reserved_characters_in_chart_ids_are_escaped() {
        let request = client().chart_request(ChartTier::Store, "a/b?c&d#e").unwrap();
        assert_eq!(
            request.uri().to_string(),
            "https://research.example/api/charts/a%2Fb%3Fc%26d%23e/figure"
        );
    }

    #[test]
    fn link_url_is_percent_encoded() {
        let request = client().link_request("https://a.com/x?y=1").unwrap();
        assert_eq!(
            request.uri().to_string(),
            "https://research.example/api/link-preview?url=https%3A%2F%2Fa.com%2Fx%3Fy%3D1"
        );
        assert_eq!(request.method(), Method::GET);
    }

    #[test]
    fn upload_is_multipart() {
        let file = ImageFile::new("a.png", "image/png", vec![1, 2, 3]);
        let request = client().upload_request(&file).unwrap();
        assert_eq!(request.method(), Method::POST);
        let content_type = request.headers()[header::CONTENT_TYPE].to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data; boundary="));
        let body = String::from_utf8_lossy(request.body());
        assert!(body.contains("filename=\"a.png\""));
        assert!(body.contains("Content-Type: image/png"));
    }

    #[test]
    fn metadata_accepts_camel_case_image_url() {
        let meta: LinkMetadata =
            serde_json::from_str(r#"{"kind":"article","imageUrl":"https://i/x.png"}"#).unwrap();
        assert_eq!(meta.image_url.as_deref(), Some("https://i/x.png"));
        let attrs = meta.into_attrs("https://a.com");
        assert_eq!(attrs.kind, "article");
    }
}
