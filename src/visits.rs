//! Article view counting with per-origin deduplication.
//!
//! Every article carries a rolling weekly counter and a lifetime counter. A view
//! is counted at most once per origin address within the cooldown window.

use log::*;

use std::net::{IpAddr, SocketAddr};

use async_trait::async_trait;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::app::AppConfig;
use crate::error::*;

pub const DEFAULT_COOLDOWN_SECS: i64 = 5 * 60;
pub const DEFAULT_WEEKLY_RESET_DAYS: i64 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitCounters {
  #[serde(rename = "visits_weekly")]
  pub weekly: i64,
  #[serde(rename = "visits_total")]
  pub total: i64,
  #[serde(rename = "counter_reset_at")]
  pub last_reset: NaiveDateTime,
}

impl VisitCounters {
  pub fn new(now: NaiveDateTime) -> Self {
    VisitCounters {
      weekly: 0,
      total: 0,
      last_reset: now,
    }
  }
}

/// Storage used by the counter. Implementations must make `record_visit` a
/// single atomic write.
#[async_trait(?Send)]
pub trait VisitStore {
  /// Zero the weekly counter and stamp `now` as the last reset.
  async fn reset_weekly(&self, article_id: i32, now: NaiveDateTime) -> Result<()>;

  /// Is there a visit from `origin` at or after `since`?
  async fn recent_visit(&self, article_id: i32, origin: IpAddr, since: NaiveDateTime) -> Result<bool>;

  /// Append a visit record and bump both counters, returning the stored counters.
  async fn record_visit(
    &self,
    article_id: i32,
    origin: Option<IpAddr>,
    now: NaiveDateTime,
  ) -> Result<VisitCounters>;
}

#[derive(Debug, Clone)]
pub struct VisitCounter {
  pub cooldown: Duration,
  pub reset_after: Duration,
  /// Count views without a known origin. They bypass deduplication.
  pub count_anonymous: bool,
}

impl Default for VisitCounter {
  fn default() -> Self {
    VisitCounter {
      cooldown: Duration::seconds(DEFAULT_COOLDOWN_SECS),
      reset_after: Duration::days(DEFAULT_WEEKLY_RESET_DAYS),
      count_anonymous: true,
    }
  }
}

impl VisitCounter {
  pub fn from_config(config: &AppConfig) -> Result<Self> {
    let cooldown = config.get_int("article.visit_cooldown_secs")?
      .unwrap_or(DEFAULT_COOLDOWN_SECS);
    let reset_days = config.get_int("article.weekly_reset_days")?
      .unwrap_or(DEFAULT_WEEKLY_RESET_DAYS);
    Ok(VisitCounter {
      cooldown: Duration::seconds(cooldown),
      reset_after: Duration::days(reset_days),
      count_anonymous: config.get_bool("article.count_anonymous_views")?.unwrap_or(true),
    })
  }

  /// Record one view of `article_id`. Returns whether it was counted.
  ///
  /// `counters` is the article as loaded for the request; it is updated to
  /// what was persisted.
  pub async fn record_view<S>(
    &self,
    store: &S,
    article_id: i32,
    counters: &mut VisitCounters,
    origin: Option<IpAddr>,
    now: NaiveDateTime,
  ) -> Result<bool>
  where
    S: VisitStore + ?Sized,
  {
    if now - counters.last_reset > self.reset_after {
      debug!("article {}: weekly counter reset (last {})", article_id, counters.last_reset);
      store.reset_weekly(article_id, now).await?;
      counters.weekly = 0;
      counters.last_reset = now;
    }

    match origin {
      Some(origin) => {
        if store.recent_visit(article_id, origin, now - self.cooldown).await? {
          trace!("article {}: repeat view from {}", article_id, origin);
          return Ok(false);
        }
      },
      None if !self.count_anonymous => {
        trace!("article {}: view without origin ignored", article_id);
        return Ok(false);
      },
      None => (),
    }

    *counters = store.record_visit(article_id, origin, now).await?;
    Ok(true)
  }
}

/// Parse the client address reported by the connection info, with or without port.
pub fn parse_origin(addr: &str) -> Option<IpAddr> {
  let addr = addr.trim();
  addr.parse::<IpAddr>().ok()
    .or_else(|| addr.parse::<SocketAddr>().ok().map(|sock| sock.ip()))
}
