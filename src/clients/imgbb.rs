use log::*;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::app::Table;
use crate::error::*;

use super::ImageHost;

pub const DEFAULT_UPLOAD_URL: &str = "https://api.imgbb.com/1/upload";

#[derive(Debug, Deserialize)]
struct UploadResponse {
  #[serde(default)]
  success: bool,
  data: Option<UploadData>,
  error: Option<UploadError>,
}

#[derive(Debug, Deserialize)]
struct UploadData {
  url: String,
}

#[derive(Debug, Deserialize)]
struct UploadError {
  message: Option<String>,
}

/// ImgBB image hosting client.
#[derive(Clone)]
pub struct ImgBb {
  http: reqwest::Client,
  api_key: String,
  upload_url: String,
}

impl ImgBb {
  pub fn new(api_key: &str, upload_url: &str) -> Self {
    Self {
      http: reqwest::Client::new(),
      api_key: api_key.to_string(),
      upload_url: upload_url.to_string(),
    }
  }

  pub fn from_config(table: &Table) -> Result<Self> {
    let api_key = table.get_str("api_key")?.unwrap_or_default();
    if api_key.is_empty() {
      warn!("imgbb.api_key not set, image uploads will fail");
    }
    let upload_url = table.get_str("upload_url")?
      .unwrap_or_else(|| DEFAULT_UPLOAD_URL.to_string());
    Ok(Self::new(&api_key, &upload_url))
  }
}

#[async_trait(?Send)]
impl ImageHost for ImgBb {
  async fn upload(&self, image: &[u8]) -> Result<String> {
    let encoded = STANDARD.encode(image);
    let resp = self.http.post(&self.upload_url)
      .form(&[("key", self.api_key.as_str()), ("image", encoded.as_str())])
      .send()
      .await?;

    let status = resp.status();
    if status == StatusCode::TOO_MANY_REQUESTS {
      return Err(Error::Upstream("imgbb: too many requests".to_string()));
    }
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      debug!("imgbb upload failed: status={}, body={}", status, body);
      return Err(Error::Upstream(format!("imgbb: HTTP {}", status)));
    }

    let body: UploadResponse = resp.json().await?;
    match body {
      UploadResponse { success: true, data: Some(data), .. } => {
        info!("Image uploaded to {}", data.url);
        Ok(data.url)
      },
      UploadResponse { error, .. } => {
        let message = error.and_then(|e| e.message)
          .unwrap_or_else(|| "unknown error".to_string());
        Err(Error::Upstream(format!("imgbb: {}", message)))
      },
    }
  }
}
