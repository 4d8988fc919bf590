use crate::server::{ErrorBody, ListResponse, UpdateConfigBody};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{StatusCode, Url};
use tessel_core::ConfigRecord;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("not found")]
    NotFound,

    #[error("{kind}: {message} (HTTP {status})")]
    Api {
        status: StatusCode,
        kind: String,
        message: String,
    },

    #[error("invalid server address '{0}'")]
    Address(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
}

/// HTTP client for a running tessel server.
pub struct ConfigClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ConfigClient {
    pub fn new(addr: &str) -> Result<Self, ClientError> {
        let addr = addr.trim();
        let with_scheme = if addr.contains("://") {
            addr.to_string()
        } else {
            format!("http://{}", addr)
        };
        let base_url =
            Url::parse(&with_scheme).map_err(|_| ClientError::Address(addr.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::Address(addr.to_string()));
        }

        Ok(Self {
            http: reqwest::Client::new(),
            base_url,
        })
    }

    pub async fn set(&self, namespace: &str, path: &str, body: &UpdateConfigBody) -> Result<(), ClientError> {
        let url = self.config_url(namespace, Some(path))?;
        let response = self.http.put(url).json(body).send().await?;
        check(response).await?;
        Ok(())
    }

    pub async fn get(&self, namespace: &str, path: &str) -> Result<ConfigRecord, ClientError> {
        let url = self.config_url(namespace, Some(path))?;
        let response = check(self.http.get(url).send().await?).await?;
        Ok(response.json::<ConfigRecord>().await?)
    }

    pub async fn delete(&self, namespace: &str, path: &str) -> Result<(), ClientError> {
        let url = self.config_url(namespace, Some(path))?;
        check(self.http.delete(url).send().await?).await?;
        Ok(())
    }

    pub async fn list(&self, namespace: &str) -> Result<Vec<String>, ClientError> {
        let url = self.config_url(namespace, None)?;
        let response = check(self.http.get(url).send().await?).await?;
        Ok(response.json::<ListResponse>().await?.paths)
    }

    fn config_url(&self, namespace: &str, path: Option<&str>) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| ClientError::Address(self.base_url.to_string()))?;
            segments.pop_if_empty().extend(["v1", "config", namespace]);
            if let Some(path) = path {
                // one segment; slashes inside the path are percent-encoded
                segments.push(path);
            }
        }
        Ok(url)
    }
}

pub fn encode_data(data: &[u8]) -> String {
    STANDARD.encode(data)
}

async fn check(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound);
    }

    let text = response.text().await.unwrap_or_default();
    let (kind, message) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.kind, body.error),
        Err(_) => ("error".to_string(), text),
    };

    Err(ClientError::Api {
        status,
        kind,
        message,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_url_encodes_path_as_one_segment() {
        let client = ConfigClient::new("127.0.0.1:8080").unwrap();
        let url = client.config_url("global", Some("a/b c")).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8080/v1/config/global/a%2Fb%20c");
    }

    #[test]
    fn test_list_url() {
        let client = ConfigClient::new("http://localhost:9000/").unwrap();
        let url = client.config_url("tenant-a", None).unwrap();
        assert_eq!(url.as_str(), "http://localhost:9000/v1/config/tenant-a");
    }

    #[test]
    fn test_invalid_address() {
        assert!(matches!(
            ConfigClient::new("http://"),
            Err(ClientError::Address(_))
        ));
    }
}
