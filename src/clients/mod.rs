use log::*;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::ImageFormat;

use crate::app::AppConfig;
use crate::error::*;

mod imgbb;
pub use self::imgbb::ImgBb;

mod mailjet;
pub use self::mailjet::Mailjet;

#[cfg(test)]
pub mod memory;

pub const DEFAULT_IMAGE_URL: &str = "https://i.ibb.co/default-profile.png";
pub const DEFAULT_SITE_URL: &str = "http://localhost:5173";

/// Image hosting API.
#[async_trait(?Send)]
pub trait ImageHost {
  /// Upload raw image bytes, returning the public URL.
  async fn upload(&self, image: &[u8]) -> Result<String>;
}

/// Transactional email API.
#[async_trait(?Send)]
pub trait Mailer {
  async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()>;
}

/// Upload `image`, logging failures. Returns `fallback` when the host refuses it,
/// so a failed upload never blocks the surrounding save.
pub async fn upload_or_fallback<H>(host: &H, image: &[u8], fallback: Option<&str>) -> Option<String>
where
  H: ImageHost + ?Sized,
{
  match host.upload(image).await {
    Ok(url) => Some(url),
    Err(err) => {
      warn!("Image upload failed: {}", err);
      fallback.map(|url| url.to_string())
    },
  }
}

/// Image formats accepted for upload.
pub const ACCEPTED_FORMATS: [ImageFormat; 4] = [
  ImageFormat::Png,
  ImageFormat::Jpeg,
  ImageFormat::Gif,
  ImageFormat::WebP,
];

/// Format of `data` when it is one we accept.
pub fn image_format(data: &[u8]) -> Option<ImageFormat> {
  image::guess_format(data).ok()
    .filter(|format| ACCEPTED_FORMATS.contains(format))
}

/// Decode a base64 image payload (an optional `data:` URL prefix is allowed)
/// and check that it is a supported image type.
pub fn decode_image(field: &str, data: &str) -> Result<Vec<u8>> {
  let data = match data.find(";base64,") {
    Some(idx) if data.starts_with("data:") => &data[idx + ";base64,".len()..],
    _ => data,
  };
  let bytes = STANDARD.decode(data.trim())
    .map_err(|_| Error::invalid_field(field, "is not valid base64"))?;
  if image_format(&bytes).is_none() {
    return Err(Error::invalid_field(field,
      "unsupported file type, use PNG, JPG, JPEG, GIF or WebP"));
  }
  Ok(bytes)
}

pub fn is_hosted_url(image: &str) -> bool {
  let image = image.trim();
  image.starts_with("https://") || image.starts_with("http://")
}

/// Resolve one image field: hosted URLs are kept, base64 data is uploaded.
/// A failed upload yields `fallback`; only undecodable data is an error.
pub async fn resolve_image<H>(
  host: &H,
  field: &str,
  image: &str,
  fallback: Option<&str>,
) -> Result<Option<String>>
where
  H: ImageHost + ?Sized,
{
  if is_hosted_url(image) {
    return Ok(Some(image.trim().to_string()));
  }
  let bytes = decode_image(field, image)?;
  Ok(upload_or_fallback(host, &bytes, fallback).await)
}

/// External API clients and the site settings they need.
#[derive(Clone)]
pub struct Clients {
  pub images: ImgBb,
  pub mail: Mailjet,
  /// Public frontend base URL, used for links in emails.
  pub site_url: String,
  /// Image used when a service listing's upload fails.
  pub default_image_url: String,
  /// Address notified about new contact messages.
  pub contact_notify: Option<String>,
}

impl Clients {
  pub fn from_config(config: &AppConfig) -> Result<Self> {
    let imgbb = config.get_table("imgbb")?.unwrap_or_default();
    let mail = config.get_table("mail")?.unwrap_or_default();
    Ok(Clients {
      images: ImgBb::from_config(&imgbb)?,
      mail: Mailjet::from_config(&mail)?,
      site_url: mail.get_str("site_url")?
        .unwrap_or_else(|| DEFAULT_SITE_URL.to_string())
        .trim_end_matches('/')
        .to_string(),
      default_image_url: imgbb.get_str("default_image_url")?
        .unwrap_or_else(|| DEFAULT_IMAGE_URL.to_string()),
      contact_notify: mail.get_str("contact_notify")?,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use crate::clients::memory::MemoryImageHost;

  const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

  #[actix_rt::test]
  async fn upload_failure_falls_back() {
    let host = MemoryImageHost::failing();
    assert_eq!(upload_or_fallback(&host, PNG, Some("https://default/x.png")).await.as_deref(),
      Some("https://default/x.png"));
    assert_eq!(upload_or_fallback(&host, PNG, None).await, None);
  }

  #[actix_rt::test]
  async fn upload_success_returns_hosted_url() {
    let host = MemoryImageHost::new();
    let url = upload_or_fallback(&host, PNG, Some("https://default/x.png")).await;
    assert_eq!(url.as_deref(), Some("https://i.ibb.co/test/1.png"));
  }

  #[actix_rt::test]
  async fn hosted_urls_are_not_uploaded() {
    let host = MemoryImageHost::new();
    let url = resolve_image(&host, "image", " https://i.ibb.co/abc.png ", None).await.unwrap();
    assert_eq!(url.as_deref(), Some("https://i.ibb.co/abc.png"));
    assert_eq!(host.uploads(), 0);

    let url = resolve_image(&host, "image", &STANDARD.encode(PNG), None).await.unwrap();
    assert_eq!(url.as_deref(), Some("https://i.ibb.co/test/1.png"));
    assert_eq!(host.uploads(), 1);
  }

  #[actix_rt::test]
  async fn bad_image_data_is_a_validation_error() {
    let host = MemoryImageHost::new();
    let res = resolve_image(&host, "image", "ftp://nope", None).await;
    assert!(matches!(res, Err(Error::UnprocessableEntity(_))));
  }

  #[test]
  fn decode_accepts_data_urls() {
    let encoded = STANDARD.encode(PNG);
    assert_eq!(decode_image("image", &encoded).unwrap(), PNG);
    let data_url = format!("data:image/png;base64,{}", encoded);
    assert_eq!(decode_image("image", &data_url).unwrap(), PNG);
  }

  #[test]
  fn decode_rejects_other_files() {
    let pdf = STANDARD.encode(b"%PDF-1.7 something");
    assert!(matches!(decode_image("image", &pdf), Err(Error::UnprocessableEntity(_))));
    assert!(matches!(decode_image("image", "not base64!"), Err(Error::UnprocessableEntity(_))));
  }

  #[test]
  fn accepted_formats() {
    assert_eq!(image_format(PNG), Some(ImageFormat::Png));
    assert_eq!(image_format(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageFormat::Jpeg));
    assert_eq!(image_format(b"GIF89a"), Some(ImageFormat::Gif));
    assert_eq!(image_format(b"RIFF\x00\x00\x00\x00WEBPVP8 "), Some(ImageFormat::WebP));
    // Recognised, but not on the list.
    assert_eq!(image_format(b"BM\x00\x00\x00\x00"), None);
    assert_eq!(image_format(b"hello"), None);
  }

  #[test]
  fn clients_from_config() {
    let config = crate::app::test_config(r#"
      [imgbb]
      api_key = "k"

      [mail]
      api_key = "a"
      secret_key = "b"
      from_email = "news@example.com"
      site_url = "https://diario.example.com/"
    "#);
    let clients = Clients::from_config(&config).unwrap();
    assert_eq!(clients.site_url, "https://diario.example.com");
    assert_eq!(clients.default_image_url, DEFAULT_IMAGE_URL);
    assert_eq!(clients.contact_notify, None);
  }
}
