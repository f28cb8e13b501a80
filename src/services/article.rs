use log::*;

use std::collections::BTreeSet;
use std::net::IpAddr;

use chrono::Utc;

use actix_web::{
  get, post, put, delete, web, HttpRequest, HttpResponse,
  Error
};

use crate::error::*;
use crate::error::Error as AppError;
use crate::app::*;
use crate::auth::AuthData;
use crate::clients::{resolve_image, Clients, ImageHost};
use crate::db::DbService;
use crate::forms::*;
use crate::forms::article::*;
use crate::middleware::Auth;
use crate::models::*;
use crate::slug::{update_with_slug, write_with_slug, Sluggable};
use crate::visits::{parse_origin, VisitCounter};

use super::{current_author, fan_out, parse_detail_key};

const DEFAULT_MOST_VIEWED: i64 = 10;
const DEFAULT_RECENT: i64 = 10;

/// Upload the base64 entries of `images`. Entries whose upload fails are dropped.
async fn resolve_images<H>(host: &H, images: &[String]) -> Result<Vec<String>>
where
  H: ImageHost + ?Sized,
{
  let mut urls = Vec::with_capacity(images.len());
  for (idx, image) in images.iter().enumerate() {
    match resolve_image(host, "images", image, None).await? {
      Some(url) => urls.push(url),
      None => warn!("Dropping article image {} after failed upload", idx),
    }
  }
  Ok(urls)
}

/// Deduplicated editor ids, all of which must be known authors.
async fn check_editors(db: &DbService, editor_ids: &[i32]) -> Result<Vec<i32>> {
  let ids: BTreeSet<i32> = editor_ids.iter().copied().collect();
  for id in ids.iter() {
    if db.author.get_by_id(*id).await?.is_none() {
      return Err(AppError::invalid_field("editor_ids", &format!("unknown author {}", id)));
    }
  }
  Ok(ids.into_iter().collect())
}

/// Address a view is deduplicated by. Forwarded headers only count when
/// `trust_proxy_headers` is set.
fn visit_origin(req: &HttpRequest, trust_proxy_headers: bool) -> Option<IpAddr> {
  if trust_proxy_headers {
    req.connection_info().realip_remote_addr().and_then(parse_origin)
  } else {
    req.peer_addr().map(|addr| addr.ip())
  }
}

fn article_not_found() -> AppError {
  AppError::not_found("article")
}

/// Get list of articles. Anonymous callers only see published ones.
#[get("/articles", wrap="Auth::optional()")]
async fn list(
  db: web::Data<DbService>,
  auth: Option<AuthData>,
  req: web::Query<ArticleQuery>,
) -> Result<HttpResponse, Error> {
  let mut req = req.into_inner();
  if auth.is_none() {
    req.state = Some(PublicationState::Published.id());
  }
  let articles = db.article.get_articles(&req).await?;

  Ok(HttpResponse::Ok().json(ArticleList::from(articles)))
}

/// Published articles with the most visits this week.
#[get("/articles/most-viewed")]
async fn most_viewed(
  db: web::Data<DbService>,
  req: web::Query<LimitQuery>,
) -> Result<HttpResponse, Error> {
  let articles = db.article.most_viewed(clamp_limit(req.limit, DEFAULT_MOST_VIEWED)).await?;
  Ok(HttpResponse::Ok().json(ArticleList::from(articles)))
}

/// Latest published articles.
#[get("/articles/recent")]
async fn recent(
  db: web::Data<DbService>,
  req: web::Query<LimitQuery>,
) -> Result<HttpResponse, Error> {
  let articles = db.article.recent(clamp_limit(req.limit, DEFAULT_RECENT)).await?;
  Ok(HttpResponse::Ok().json(ArticleList::from(articles)))
}

/// get article by `{id}` or `{id}-{slug}`, counting the visit.
#[get("/articles/{key}", wrap="Auth::optional()")]
async fn get_article(
  cfg: web::Data<ArticleService>,
  db: web::Data<DbService>,
  auth: Option<AuthData>,
  key: web::Path<String>,
  http_req: HttpRequest,
) -> Result<HttpResponse, Error> {
  let id = parse_detail_key(&key).ok_or_else(article_not_found)?;
  let mut article = db.article.get_by_id(id).await?.ok_or_else(article_not_found)?;
  if article.state != PublicationState::Published && auth.is_none() {
    return Err(article_not_found().into());
  }

  let origin = visit_origin(&http_req, cfg.trust_proxy_headers);
  let now = Utc::now().naive_utc();
  match cfg.visits.record_view(&db.article, article.id, &mut article.visits, origin, now).await {
    Ok(counted) => trace!("article {}: view counted={}", article.id, counted),
    Err(err) => warn!("Failed to record visit for article {}: {}", article.id, err),
  }

  Ok(HttpResponse::Ok().json(ArticleOut { article }))
}

/// post new article
#[post("/articles", wrap="Auth::required()")]
async fn store_article(
  db: web::Data<DbService>,
  clients: web::Data<Clients>,
  auth: AuthData,
  form: web::Json<CreateArticle>,
) -> Result<HttpResponse, Error> {
  let form = form.into_inner();
  form.check()?;

  let author = current_author(&db, &auth).await?;
  let author_id = match form.author_id {
    Some(id) if id != author.id => {
      db.author.get_by_id(id).await?
        .ok_or_else(|| AppError::not_found("author"))?
        .id
    },
    _ => author.id,
  };

  let new_article = NewArticle {
    author_id,
    title: form.title.trim().to_string(),
    subtitle: form.subtitle.clone(),
    body: form.body.clone(),
    keywords: form.keywords.clone(),
    published_on: form.published_on.unwrap_or_else(|| Utc::now().naive_utc().date()),
    state: form.state(),
    subscribers_only: form.subscribers_only,
    show_credits: form.show_credits,
    editor_ids: check_editors(&db, &form.editor_ids).await?,
    images: resolve_images(&clients.images, &form.images).await?,
  };

  let articles = &db.article;
  let new_ref = &new_article;
  let id = write_with_slug(articles, &new_article.title, &Article::SLUG_POLICY, None,
    move |slug| async move { articles.store(new_ref, &slug).await }).await?;
  let article = db.article.get_by_id(id).await?
    .ok_or(AppError::InternalServerError)?;
  info!("Article {} created as {}", article.id, article.absolute_url());

  let newsletter = if article.state.is_publish_transition(None) {
    fan_out(&db, &clients, &article).await
  } else {
    None
  };
  Ok(HttpResponse::Created().json(ArticleSaved { article, newsletter }))
}

/// update an existing article
#[put("/articles/{id}", wrap="Auth::required()")]
async fn update_article(
  cfg: web::Data<ArticleService>,
  db: web::Data<DbService>,
  clients: web::Data<Clients>,
  auth: AuthData,
  id: web::Path<i32>,
  form: web::Json<UpdateArticle>,
) -> Result<HttpResponse, Error> {
  if !cfg.allow_update {
    return Ok(HttpResponse::Forbidden().json(json!({ "error": "article updates are disabled" })));
  }
  let form = form.into_inner();
  form.check()?;
  current_author(&db, &auth).await?;

  let id = id.into_inner();
  let mut article = db.article.get_by_id(id).await?.ok_or_else(article_not_found)?;
  let old_state = article.state;
  let persisted_title = article.title.clone();

  form.apply(&mut article);
  if let Some(editor_ids) = &form.editor_ids {
    article.editor_ids = check_editors(&db, editor_ids).await?;
  }
  if let Some(images) = &form.images {
    article.images = resolve_images(&clients.images, images).await?;
  }
  let new_title = form.title.as_deref().map(str::trim);
  if let Some(title) = new_title {
    article.title = title.to_string();
  }

  let articles = &db.article;
  let changes = &article;
  let updated = update_with_slug(articles, &persisted_title, new_title, &Article::SLUG_POLICY, id,
    move |slug| {
      let mut article = changes.clone();
      if let Some(slug) = slug {
        article.slug = slug;
      }
      async move { articles.update(&article).await }
    }).await?;
  if !updated {
    return Err(article_not_found().into());
  }

  let article = db.article.get_by_id(id).await?.ok_or_else(article_not_found)?;
  debug!("Article {} updated, slug={}", article.id, article.slug);
  let newsletter = if article.state.is_publish_transition(Some(old_state)) {
    fan_out(&db, &clients, &article).await
  } else {
    None
  };
  Ok(HttpResponse::Ok().json(ArticleSaved { article, newsletter }))
}

/// Retire an article to the trash. Rows are never deleted.
#[delete("/articles/{id}", wrap="Auth::required()")]
async fn delete_article(
  cfg: web::Data<ArticleService>,
  db: web::Data<DbService>,
  auth: AuthData,
  id: web::Path<i32>,
) -> Result<HttpResponse, Error> {
  if !cfg.allow_delete {
    return Ok(HttpResponse::Forbidden().json(json!({ "error": "article deletes are disabled" })));
  }
  current_author(&db, &auth).await?;

  let id = id.into_inner();
  if db.article.set_state(id, PublicationState::Trashed).await? == 0 {
    return Err(article_not_found().into());
  }
  info!("Article {} moved to trash", id);
  Ok(HttpResponse::Ok().json(MessageOut::new("article moved to trash")))
}

#[derive(Debug, Clone, Default)]
pub struct ArticleService {
  pub allow_update: bool,
  pub allow_delete: bool,
  pub trust_proxy_headers: bool,
  pub visits: VisitCounter,
}

impl super::Service for ArticleService {
  fn load_app_config(&mut self, config: &AppConfig, _prefix: &str) -> Result<()> {
    self.allow_update = config.get_bool("article.allow_update")?.unwrap_or(true);
    self.allow_delete = config.get_bool("article.allow_delete")?.unwrap_or(true);
    self.trust_proxy_headers = config.get_bool("article.trust_proxy_headers")?.unwrap_or(false);
    self.visits = VisitCounter::from_config(config)?;
    Ok(())
  }

  fn api_config(&self, web: &mut web::ServiceConfig) {
    // Fixed routes go before the `{key}` detail route.
    web
      .app_data(web::Data::new(self.clone()))
      .service(list)
      .service(most_viewed)
      .service(recent)
      .service(get_article)
      .service(store_article)
      .service(update_article)
      .service(delete_article);
  }
}

pub fn new_factory() -> ArticleService {
  Default::default()
}

#[cfg(test)]
mod tests {
  use super::*;

  use base64::{engine::general_purpose::STANDARD, Engine as _};

  use crate::clients::memory::MemoryImageHost;

  const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

  #[actix_rt::test]
  async fn failed_uploads_are_dropped() {
    let images = vec![
      "https://i.ibb.co/keep.png".to_string(),
      STANDARD.encode(PNG),
    ];
    let urls = resolve_images(&MemoryImageHost::failing(), &images).await.unwrap();
    assert_eq!(urls, vec!["https://i.ibb.co/keep.png"]);

    let urls = resolve_images(&MemoryImageHost::new(), &images).await.unwrap();
    assert_eq!(urls, vec!["https://i.ibb.co/keep.png", "https://i.ibb.co/test/1.png"]);
  }

  fn forwarded_request() -> HttpRequest {
    actix_web::test::TestRequest::default()
      .peer_addr("10.0.0.1:1234".parse().unwrap())
      .insert_header(("X-Forwarded-For", "203.0.113.77"))
      .to_http_request()
  }

  #[test]
  fn origin_ignores_forwarded_headers_by_default() {
    let req = forwarded_request();
    assert_eq!(visit_origin(&req, false), Some("10.0.0.1".parse().unwrap()));
  }

  #[test]
  fn origin_uses_forwarded_headers_behind_a_proxy() {
    let req = forwarded_request();
    assert_eq!(visit_origin(&req, true), Some("203.0.113.77".parse().unwrap()));

    let direct = actix_web::test::TestRequest::default()
      .peer_addr("10.0.0.1:1234".parse().unwrap())
      .to_http_request();
    assert_eq!(visit_origin(&direct, true), Some("10.0.0.1".parse().unwrap()));
  }

  #[test]
  fn config_defaults() {
    let config = crate::app::test_config(r#"
      [article]
      allow_delete = false
      visit_cooldown_secs = 120
    "#);
    let mut service = new_factory();
    super::super::Service::load_app_config(&mut service, &config, "api").unwrap();
    assert!(service.allow_update);
    assert!(!service.allow_delete);
    assert!(!service.trust_proxy_headers);
    assert_eq!(service.visits.cooldown, chrono::Duration::seconds(120));
  }
}
