use super::submission::InferenceRequest;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::fmt::Debug;
use std::time::Duration;
use tracing::debug;

/// Header used by the multi-model endpoint to route to a country's model.
pub const TARGET_MODEL_HEADER: &str = "x-amzn-sagemaker-target-model";

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("http client unavailable: {0}")]
    Client(#[source] reqwest::Error),
    #[error("remote service unavailable: {0}")]
    Unavailable(String),
}

/// Read side: schema exports, country configuration and metrics files.
pub trait DocumentSource: Debug + Send + Sync {
    fn fetch_text(&self, url: &str) -> Result<String, GatewayError>;
}

/// Write side: the hosted model endpoint. Returns the raw response body.
pub trait InferenceGateway: Debug + Send + Sync {
    fn predict(
        &self,
        endpoint: &str,
        model: &str,
        request: &InferenceRequest,
    ) -> Result<String, GatewayError>;
}

/// Blocking HTTP client covering both collaborators.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
}

impl HttpGateway {
    pub fn new(timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(GatewayError::Client)?;
        Ok(Self { client })
    }

    fn transport(url: &str) -> impl FnOnce(reqwest::Error) -> GatewayError + '_ {
        move |source| GatewayError::Transport {
            url: url.to_string(),
            source,
        }
    }
}

impl DocumentSource for HttpGateway {
    fn fetch_text(&self, url: &str) -> Result<String, GatewayError> {
        debug!(%url, "fetching document");
        let response = self.client.get(url).send().map_err(Self::transport(url))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().map_err(Self::transport(url))
    }
}

impl InferenceGateway for HttpGateway {
    fn predict(
        &self,
        endpoint: &str,
        model: &str,
        request: &InferenceRequest,
    ) -> Result<String, GatewayError> {
        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(TARGET_MODEL_HEADER, model)
            .json(request)
            .send()
            .map_err(Self::transport(endpoint))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                url: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().map_err(Self::transport(endpoint))
    }
}
