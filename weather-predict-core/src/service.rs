use async_trait::async_trait;
use reqwest::{
    Client,
    multipart::{Form, Part},
};
use serde::Deserialize;
use std::{fmt::Debug, time::Duration};
use url::Url;

use crate::{Config, error::PredictError, model::ImageFile};

/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

#[async_trait]
pub trait PredictionService: Send + Sync + Debug {
    /// Upload `image` and return the predicted weather text.
    async fn predict(&self, image: &ImageFile) -> Result<String, PredictError>;
}

/// Talks to the prediction endpoint over HTTP.
///
/// One POST per call. No retries; no timeout unless one was configured.
#[derive(Debug, Clone)]
pub struct HttpPredictionService {
    endpoint: Url,
    http: Client,
}

impl HttpPredictionService {
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            http: Client::new(),
        }
    }

    pub fn with_timeout(endpoint: Url, timeout: Duration) -> Result<Self, PredictError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { endpoint, http })
    }

    /// Build from configuration: endpoint plus the optional timeout.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let endpoint = config.endpoint_url()?;

        match config.timeout() {
            Some(timeout) => Ok(Self::with_timeout(endpoint, timeout)?),
            None => Ok(Self::new(endpoint)),
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    result: String,
}

#[async_trait]
impl PredictionService for HttpPredictionService {
    async fn predict(&self, image: &ImageFile) -> Result<String, PredictError> {
        let mut part = Part::bytes(image.bytes.clone()).file_name(image.name.clone());
        if let Some(media_type) = image.media_type.as_deref() {
            part = part
                .mime_str(media_type)
                .map_err(|_| PredictError::InvalidMediaType(media_type.to_string()))?;
        }
        let form = Form::new().part(IMAGE_FIELD, part);

        tracing::debug!(endpoint = %self.endpoint, name = %image.name, "posting image");

        let res = self
            .http
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            return Err(PredictError::Server { status });
        }

        let body = res.bytes().await?;
        let parsed: PredictResponse = serde_json::from_slice(&body)
            .map_err(|err| PredictError::MalformedResponse(err.to_string()))?;

        if parsed.result.trim().is_empty() {
            return Err(PredictError::MalformedResponse(
                "`result` is empty".to_string(),
            ));
        }

        Ok(parsed.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;
    use wiremock::matchers::{body_string_contains, header_regex, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn image() -> ImageFile {
        ImageFile::new("cielo.png", vec![0x89, b'P', b'N', b'G']).with_media_type("image/png")
    }

    fn service_for(server: &MockServer) -> HttpPredictionService {
        let endpoint = Url::parse(&format!("{}/predict", server.uri())).expect("mock url");
        HttpPredictionService::new(endpoint)
    }

    #[tokio::test]
    async fn posts_multipart_image_field_and_returns_result() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/predict"))
            .and(header_regex("content-type", "^multipart/form-data"))
            .and(body_string_contains("name=\"image\""))
            .and(body_string_contains("filename=\"cielo.png\""))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "result": "Soleado" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let service = service_for(&server);
        let result = service.predict(&image()).await.expect("prediction");

        assert_eq!(result, "Soleado");
    }

    #[tokio::test]
    async fn server_error_is_not_parsed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/predict"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(serde_json::json!({ "result": "Nublado" })),
            )
            .mount(&server)
            .await;

        let service = service_for(&server);
        let err = service.predict(&image()).await.unwrap_err();

        assert!(matches!(
            err,
            PredictError::Server { status } if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
    }

    #[tokio::test]
    async fn missing_result_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "label": 3 })))
            .mount(&server)
            .await;

        let service = service_for(&server);
        let err = service.predict(&image()).await.unwrap_err();

        assert!(matches!(err, PredictError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn blank_result_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "result": "  " })))
            .mount(&server)
            .await;

        let service = service_for(&server);
        let err = service.predict(&image()).await.unwrap_err();

        assert!(matches!(err, PredictError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn unparseable_media_type_is_reported_as_such() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let service = service_for(&server);
        let file = ImageFile::new("raro.png", vec![1]).with_media_type("image/<png>");
        let err = service.predict(&file).await.unwrap_err();

        assert!(matches!(err, PredictError::InvalidMediaType(ref mt) if mt == "image/<png>"));
    }

    #[tokio::test]
    async fn non_string_result_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "result": 42 })))
            .mount(&server)
            .await;

        let service = service_for(&server);
        let err = service.predict(&image()).await.unwrap_err();

        assert!(matches!(err, PredictError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn invalid_json_is_malformed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let service = service_for(&server);
        let err = service.predict(&image()).await.unwrap_err();

        assert!(matches!(err, PredictError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn connection_refused_is_network_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let endpoint = Url::parse(&format!("http://{addr}/predict")).expect("url");
        let service = HttpPredictionService::new(endpoint);
        let err = service.predict(&image()).await.unwrap_err();

        assert!(matches!(err, PredictError::Network(_)));
    }

    #[test]
    fn from_config_uses_configured_endpoint() {
        let cfg = Config {
            endpoint: "http://localhost:9999/predict".to_string(),
            timeout_secs: Some(5),
        };

        let service = HttpPredictionService::from_config(&cfg).expect("service");
        assert_eq!(service.endpoint().as_str(), "http://localhost:9999/predict");
    }

    #[test]
    fn from_config_rejects_bad_endpoint() {
        let cfg = Config {
            endpoint: "not a url".to_string(),
            timeout_secs: None,
        };

        let err = HttpPredictionService::from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("Invalid prediction endpoint"));
    }
}
