// In-memory stand-ins for the postgres services, used by unit tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use crate::error::*;
use crate::slug::SlugIndex;
use crate::visits::{VisitCounters, VisitStore};

#[derive(Default)]
pub struct MemorySlugIndex {
  rows: RefCell<Vec<(i32, String, String)>>,
}

impl MemorySlugIndex {
  pub fn new() -> Self {
    Default::default()
  }

  /// Store a new row, returning its id (starting at 1).
  pub fn insert(&self, title: &str, slug: &str) -> i32 {
    let mut rows = self.rows.borrow_mut();
    let id = rows.len() as i32 + 1;
    rows.push((id, title.to_string(), slug.to_string()));
    id
  }

  pub fn rename(&self, id: i32, title: &str, slug: &str) {
    for row in self.rows.borrow_mut().iter_mut() {
      if row.0 == id {
        row.1 = title.to_string();
        row.2 = slug.to_string();
      }
    }
  }

  pub fn slug_of(&self, id: i32) -> Option<String> {
    self.rows.borrow().iter()
      .find(|row| row.0 == id)
      .map(|row| row.2.clone())
  }
}

#[async_trait(?Send)]
impl SlugIndex for MemorySlugIndex {
  async fn slug_taken(&self, slug: &str, exclude_id: Option<i32>) -> Result<bool> {
    Ok(self.rows.borrow().iter()
      .any(|row| row.2 == slug && Some(row.0) != exclude_id))
  }
}

#[derive(Default)]
pub struct MemoryVisitStore {
  articles: RefCell<HashMap<i32, VisitCounters>>,
  visits: RefCell<Vec<(i32, Option<IpAddr>, NaiveDateTime)>>,
  fail_writes: Cell<bool>,
}

impl MemoryVisitStore {
  pub fn with_article(article_id: i32, counters: VisitCounters) -> Self {
    let store = Self::default();
    store.articles.borrow_mut().insert(article_id, counters);
    store
  }

  pub fn counters(&self, article_id: i32) -> VisitCounters {
    self.articles.borrow()[&article_id]
  }

  pub fn add_visit(&self, article_id: i32, origin: Option<IpAddr>, at: NaiveDateTime) {
    self.visits.borrow_mut().push((article_id, origin, at));
  }

  pub fn visit_count(&self, article_id: i32) -> usize {
    self.visits.borrow().iter().filter(|v| v.0 == article_id).count()
  }

  pub fn fail_writes(&self, fail: bool) {
    self.fail_writes.set(fail);
  }

  fn check_writable(&self) -> Result<()> {
    if self.fail_writes.get() {
      return Err(Error::DisconnectedError("write failed".to_string()));
    }
    Ok(())
  }
}

#[async_trait(?Send)]
impl VisitStore for MemoryVisitStore {
  async fn reset_weekly(&self, article_id: i32, now: NaiveDateTime) -> Result<()> {
    self.check_writable()?;
    let mut articles = self.articles.borrow_mut();
    let counters = articles.get_mut(&article_id).ok_or_else(|| Error::not_found("article"))?;
    counters.weekly = 0;
    counters.last_reset = now;
    Ok(())
  }

  async fn recent_visit(&self, article_id: i32, origin: IpAddr, since: NaiveDateTime) -> Result<bool> {
    Ok(self.visits.borrow().iter()
      .any(|v| v.0 == article_id && v.1 == Some(origin) && v.2 >= since))
  }

  async fn record_visit(
    &self,
    article_id: i32,
    origin: Option<IpAddr>,
    now: NaiveDateTime,
  ) -> Result<VisitCounters> {
    self.check_writable()?;
    let mut articles = self.articles.borrow_mut();
    let counters = articles.get_mut(&article_id).ok_or_else(|| Error::not_found("article"))?;
    self.visits.borrow_mut().push((article_id, origin, now));
    counters.weekly += 1;
    counters.total += 1;
    Ok(*counters)
  }
}
