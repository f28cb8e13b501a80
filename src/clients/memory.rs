// In-memory stand-ins for the external APIs, used by unit tests.

use std::cell::{Cell, RefCell};

use async_trait::async_trait;

use crate::error::*;

use super::{ImageHost, Mailer};

#[derive(Default)]
pub struct MemoryImageHost {
  uploads: Cell<u32>,
  failing: bool,
}

impl MemoryImageHost {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn failing() -> Self {
    MemoryImageHost {
      failing: true,
      ..Default::default()
    }
  }

  pub fn uploads(&self) -> u32 {
    self.uploads.get()
  }
}

#[async_trait(?Send)]
impl ImageHost for MemoryImageHost {
  async fn upload(&self, _image: &[u8]) -> Result<String> {
    if self.failing {
      return Err(Error::Upstream("imgbb: HTTP 500".to_string()));
    }
    let n = self.uploads.get() + 1;
    self.uploads.set(n);
    Ok(format!("https://i.ibb.co/test/{}.png", n))
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentMail {
  pub to: String,
  pub subject: String,
  pub html: String,
}

#[derive(Default)]
pub struct MemoryMailer {
  sent: RefCell<Vec<SentMail>>,
  rejected: Vec<String>,
}

impl MemoryMailer {
  pub fn new() -> Self {
    Default::default()
  }

  /// Mailer that fails for the given recipients.
  pub fn rejecting(rejected: &[&str]) -> Self {
    MemoryMailer {
      rejected: rejected.iter().map(|s| s.to_string()).collect(),
      ..Default::default()
    }
  }

  pub fn sent(&self) -> Vec<SentMail> {
    self.sent.borrow().clone()
  }
}

#[async_trait(?Send)]
impl Mailer for MemoryMailer {
  async fn send(&self, to: &str, subject: &str, html: &str) -> Result<()> {
    if self.rejected.iter().any(|r| r == to) {
      return Err(Error::Upstream(format!("mailjet: rejected {}", to)));
    }
    self.sent.borrow_mut().push(SentMail {
      to: to.to_string(),
      subject: subject.to_string(),
      html: html.to_string(),
    });
    Ok(())
  }
}
