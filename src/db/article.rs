use std::net::IpAddr;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use tokio_postgres::Row;

use crate::error::*;

use crate::models::*;
use crate::forms::article::*;
use crate::slug::SlugIndex;
use crate::visits::{VisitCounters, VisitStore};

use crate::db::*;

#[derive(Clone)]
pub struct ArticleService {
  // get one article
  article_by_id: VersionedStatement,

  // get multiple articles
  get_articles: VersionedStatement,
  most_viewed: VersionedStatement,
  recent: VersionedStatement,

  // store / update article
  slug_taken: VersionedStatement,
  store_article: VersionedStatement,
  update_article: VersionedStatement,
  set_state: VersionedStatement,

  // visit counting
  reset_weekly: VersionedStatement,
  recent_visit: VersionedStatement,
  record_visit: VersionedStatement,
}

fn article_from_row(row: &Row) -> Article {
  let state_id: i32 = row.get(7);
  Article {
    id: row.get(0),
    title: row.get(1),
    subtitle: row.get(2),
    body: row.get(3),
    keywords: row.get(4),
    slug: row.get(5),
    published_on: row.get(6),
    state: PublicationState::from_id_or_draft(state_id),
    subscribers_only: row.get(8),
    show_credits: row.get(9),
    images: row.get(10),
    visits: VisitCounters {
      weekly: row.get(11),
      total: row.get(12),
      last_reset: row.get(13),
    },
    created_at: row.get(14),
    updated_at: row.get(15),
    author: AuthorProfile {
      id: row.get(16),
      first_name: row.get(17),
      last_name: row.get(18),
      photo_url: row.get(19),
    },
    editor_ids: row.get(20),
  }
}

static ARTICLE_SELECT: &'static str = r#"
SELECT a.id, a.title, a.subtitle, a.body, a.keywords, a.slug, a.published_on, a.state_id,
  a.subscribers_only, a.show_credits, a.images,
  a.visits_weekly, a.visits_total, a.counter_reset_at,
  a.created_at, a.updated_at,
  au.id, au.first_name, au.last_name, au.photo_url,
  COALESCE((SELECT ARRAY_AGG(e.author_id ORDER BY e.author_id)
    FROM article_editors e WHERE e.article_id = a.id), '{}') AS editor_ids
FROM articles a INNER JOIN authors au ON a.author_id = au.id
"#;

impl ArticleService {
  pub fn new(cl: SharedClient) -> Result<ArticleService> {
    let article_by_id = VersionedStatement::new(cl.clone(),
        &format!(r#"{} WHERE a.id = $1"#, ARTICLE_SELECT))?;

    let get_articles = VersionedStatement::new(cl.clone(),
        &format!(r#"{}
        WHERE ($1::integer IS NULL OR a.state_id = $1)
          AND ($2::integer IS NULL OR a.author_id = $2)
        ORDER BY a.created_at DESC, a.id DESC LIMIT $3 OFFSET $4"#, ARTICLE_SELECT))?;
    let most_viewed = VersionedStatement::new(cl.clone(),
        &format!(r#"{} WHERE a.state_id = $1
        ORDER BY a.visits_weekly DESC, a.visits_total DESC, a.id DESC LIMIT $2"#, ARTICLE_SELECT))?;
    let recent = VersionedStatement::new(cl.clone(),
        &format!(r#"{} WHERE a.state_id = $1
        ORDER BY a.published_on DESC, a.id DESC LIMIT $2"#, ARTICLE_SELECT))?;

    let slug_taken = VersionedStatement::new(cl.clone(),
        r#"SELECT EXISTS(SELECT 1 FROM articles
        WHERE slug = $1 AND ($2::integer IS NULL OR id <> $2))"#)?;

    // Article row and editors in one statement.
    let store_article = VersionedStatement::new(cl.clone(),
        r#"WITH inserted AS (
          INSERT INTO articles(author_id, title, subtitle, body, keywords, slug,
            published_on, state_id, subscribers_only, show_credits, images)
          VALUES($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
          RETURNING id
        ), editors AS (
          INSERT INTO article_editors(article_id, author_id)
          SELECT inserted.id, e FROM inserted, UNNEST($12::integer[]) AS e
        )
        SELECT id FROM inserted"#)?;
    let update_article = VersionedStatement::new(cl.clone(),
        r#"WITH updated AS (
          UPDATE articles SET title = $2, subtitle = $3, body = $4, keywords = $5, slug = $6,
            published_on = $7, state_id = $8, subscribers_only = $9, show_credits = $10,
            images = $11, updated_at = NOW()
          WHERE id = $1
          RETURNING id
        ), removed AS (
          DELETE FROM article_editors
          WHERE article_id IN (SELECT id FROM updated) AND author_id <> ALL($12::integer[])
        ), added AS (
          INSERT INTO article_editors(article_id, author_id)
          SELECT updated.id, e FROM updated, UNNEST($12::integer[]) AS e
          ON CONFLICT DO NOTHING
        )
        SELECT id FROM updated"#)?;
    let set_state = VersionedStatement::new(cl.clone(),
        r#"UPDATE articles SET state_id = $2, updated_at = NOW() WHERE id = $1"#)?;

    let reset_weekly = VersionedStatement::new(cl.clone(),
        r#"UPDATE articles SET visits_weekly = 0, counter_reset_at = $2 WHERE id = $1"#)?;
    let recent_visit = VersionedStatement::new(cl.clone(),
        r#"SELECT EXISTS(SELECT 1 FROM article_visits
        WHERE article_id = $1 AND origin = $2 AND visited_at >= $3)"#)?;
    // Visit record and both counters in one statement.
    let record_visit = VersionedStatement::new(cl.clone(),
        r#"WITH visit AS (
          INSERT INTO article_visits(article_id, origin, visited_at) VALUES($1, $2, $3)
        )
        UPDATE articles SET visits_weekly = visits_weekly + 1, visits_total = visits_total + 1
        WHERE id = $1
        RETURNING visits_weekly, visits_total, counter_reset_at"#)?;

    Ok(ArticleService {
      article_by_id,

      get_articles,
      most_viewed,
      recent,

      slug_taken,
      store_article,
      update_article,
      set_state,

      reset_weekly,
      recent_visit,
      record_visit,
    })
  }

  pub async fn prepare(&self) -> Result<()> {
    self.article_by_id.prepare().await?;

    self.get_articles.prepare().await?;
    self.most_viewed.prepare().await?;
    self.recent.prepare().await?;

    self.slug_taken.prepare().await?;
    self.store_article.prepare().await?;
    self.update_article.prepare().await?;
    self.set_state.prepare().await?;

    self.reset_weekly.prepare().await?;
    self.recent_visit.prepare().await?;
    self.record_visit.prepare().await?;
    Ok(())
  }

  pub async fn get_by_id(&self, article_id: i32) -> Result<Option<Article>> {
    let row = self.article_by_id.query_opt(&[&article_id]).await?;
    Ok(row.as_ref().map(article_from_row))
  }

  pub async fn get_articles(&self, req: &ArticleQuery) -> Result<Vec<Article>> {
    let page = req.page();
    let rows = self.get_articles.query(&[
      &req.state, &req.author, &page.limit(), &page.offset(),
    ]).await?;
    Ok(rows.iter().map(article_from_row).collect())
  }

  /// Published articles by weekly visits.
  pub async fn most_viewed(&self, limit: i64) -> Result<Vec<Article>> {
    let state = PublicationState::Published.id();
    let rows = self.most_viewed.query(&[&state, &limit]).await?;
    Ok(rows.iter().map(article_from_row).collect())
  }

  /// Published articles by publication date.
  pub async fn recent(&self, limit: i64) -> Result<Vec<Article>> {
    let state = PublicationState::Published.id();
    let rows = self.recent.query(&[&state, &limit]).await?;
    Ok(rows.iter().map(article_from_row).collect())
  }

  pub async fn store(&self, article: &NewArticle, slug: &str) -> Result<i32> {
    let row = self.store_article.query_one(&[
      &article.author_id, &article.title, &article.subtitle, &article.body,
      &article.keywords, &slug, &article.published_on, &article.state.id(),
      &article.subscribers_only, &article.show_credits, &article.images,
      &article.editor_ids,
    ]).await?;
    Ok(row.get(0))
  }

  /// Store every editable field of `article`, including its slug and editors.
  pub async fn update(&self, article: &Article) -> Result<bool> {
    let row = self.update_article.query_opt(&[
      &article.id, &article.title, &article.subtitle, &article.body,
      &article.keywords, &article.slug, &article.published_on, &article.state.id(),
      &article.subscribers_only, &article.show_credits, &article.images,
      &article.editor_ids,
    ]).await?;
    Ok(row.is_some())
  }

  pub async fn set_state(&self, article_id: i32, state: PublicationState) -> Result<u64> {
    Ok(self.set_state.execute(&[&article_id, &state.id()]).await?)
  }
}

#[async_trait(?Send)]
impl SlugIndex for ArticleService {
  async fn slug_taken(&self, slug: &str, exclude_id: Option<i32>) -> Result<bool> {
    let row = self.slug_taken.query_one(&[&slug, &exclude_id]).await?;
    Ok(row.get(0))
  }
}

#[async_trait(?Send)]
impl VisitStore for ArticleService {
  async fn reset_weekly(&self, article_id: i32, now: NaiveDateTime) -> Result<()> {
    self.reset_weekly.execute(&[&article_id, &now]).await?;
    Ok(())
  }

  async fn recent_visit(&self, article_id: i32, origin: IpAddr, since: NaiveDateTime) -> Result<bool> {
    let row = self.recent_visit.query_one(&[&article_id, &origin, &since]).await?;
    Ok(row.get(0))
  }

  async fn record_visit(
    &self,
    article_id: i32,
    origin: Option<IpAddr>,
    now: NaiveDateTime,
  ) -> Result<VisitCounters> {
    match self.record_visit.query_opt(&[&article_id, &origin, &now]).await? {
      Some(row) => Ok(VisitCounters {
        weekly: row.get(0),
        total: row.get(1),
        last_reset: row.get(2),
      }),
      None => Err(Error::not_found("article")),
    }
  }
}
