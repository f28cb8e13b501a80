//! Unique, URL-safe identifiers derived from titles.
//!
//! A slug is computed when an article or service listing is created, and
//! recomputed only when its title changes. Collisions with sibling rows are
//! resolved by trying numbered suffixes in order: `base`, `base-1`, `base-2`, ...

use log::*;

use std::future::Future;

use async_trait::async_trait;

use crate::error::*;

/// Per-entity slug settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlugPolicy {
  /// Base used when the title has nothing left after slugification.
  pub fallback: &'static str,
  /// Column width of the slug.
  pub max_len: usize,
}

/// Entities served under `/{ROUTE}/{id}-{slug}/`.
pub trait Sluggable {
  const ROUTE: &'static str;
  const SLUG_POLICY: SlugPolicy;

  fn id(&self) -> i32;

  fn slug(&self) -> &str;

  fn absolute_url(&self) -> String {
    format!("/{}/{}-{}/", Self::ROUTE, self.id(), self.slug())
  }
}

/// Uniqueness check scoped to one entity table.
#[async_trait(?Send)]
pub trait SlugIndex {
  /// Does any row other than `exclude_id` already use `slug`?
  async fn slug_taken(&self, slug: &str, exclude_id: Option<i32>) -> Result<bool>;
}

pub fn base_slug(title: &str, policy: &SlugPolicy) -> String {
  let slug = ::slug::slugify(title);
  if slug.is_empty() {
    return policy.fallback.to_string();
  }
  truncate(&slug, policy.max_len)
}

// slugify output is ASCII, byte slicing is safe.
fn truncate(slug: &str, max_len: usize) -> String {
  if slug.len() <= max_len {
    return slug.to_string();
  }
  slug[..max_len].trim_end_matches('-').to_string()
}

fn candidate(base: &str, n: u32, policy: &SlugPolicy) -> String {
  if n == 0 {
    return base.to_string();
  }
  let suffix = format!("-{}", n);
  let room = policy.max_len.saturating_sub(suffix.len());
  format!("{}{}", truncate(base, room), suffix)
}

/// Lowest free slug for `title`, ignoring the row `exclude_id`.
pub async fn assign_slug<I>(
  index: &I,
  title: &str,
  policy: &SlugPolicy,
  exclude_id: Option<i32>,
) -> Result<String>
where
  I: SlugIndex + ?Sized,
{
  let base = base_slug(title, policy);
  let mut n = 0u32;
  loop {
    let slug = candidate(&base, n, policy);
    if !index.slug_taken(&slug, exclude_id).await? {
      if n > 0 {
        debug!("slug '{}' taken, using '{}'", base, slug);
      }
      return Ok(slug);
    }
    n += 1;
  }
}

/// New slug for an update of row `id`, or `None` when the title did not change.
pub async fn slug_for_update<I>(
  index: &I,
  persisted_title: &str,
  new_title: Option<&str>,
  policy: &SlugPolicy,
  id: i32,
) -> Result<Option<String>>
where
  I: SlugIndex + ?Sized,
{
  match new_title {
    Some(title) if title != persisted_title => {
      Ok(Some(assign_slug(index, title, policy, Some(id)).await?))
    },
    _ => Ok(None),
  }
}

/// Assign a slug and run `write` with it.
///
/// The uniqueness check and the write are not atomic. When the write hits the
/// storage-level unique constraint (`Error::Conflict`), the slug is recomputed
/// and the write retried once. A second conflict is an internal error.
pub async fn write_with_slug<I, T, F, Fut>(
  index: &I,
  title: &str,
  policy: &SlugPolicy,
  exclude_id: Option<i32>,
  write: F,
) -> Result<T>
where
  I: SlugIndex + ?Sized,
  F: FnMut(String) -> Fut,
  Fut: Future<Output = Result<T>>,
{
  let slug = assign_slug(index, title, policy, exclude_id).await?;
  write_retrying(index, title, policy, exclude_id, slug, write).await
}

/// Update row `id`. `write` gets the new slug when the title changed, `None`
/// otherwise. Conflicts are retried like `write_with_slug`.
pub async fn update_with_slug<I, T, F, Fut>(
  index: &I,
  persisted_title: &str,
  new_title: Option<&str>,
  policy: &SlugPolicy,
  id: i32,
  mut write: F,
) -> Result<T>
where
  I: SlugIndex + ?Sized,
  F: FnMut(Option<String>) -> Fut,
  Fut: Future<Output = Result<T>>,
{
  match slug_for_update(index, persisted_title, new_title, policy, id).await? {
    Some(slug) => {
      let title = new_title.unwrap_or(persisted_title);
      write_retrying(index, title, policy, Some(id), slug, |slug| write(Some(slug))).await
    },
    None => write(None).await,
  }
}

async fn write_retrying<I, T, F, Fut>(
  index: &I,
  title: &str,
  policy: &SlugPolicy,
  exclude_id: Option<i32>,
  slug: String,
  mut write: F,
) -> Result<T>
where
  I: SlugIndex + ?Sized,
  F: FnMut(String) -> Fut,
  Fut: Future<Output = Result<T>>,
{
  match write(slug).await {
    Err(Error::Conflict(constraint)) => {
      warn!("Conflict on {} while saving {:?}, recomputing slug", constraint, title);
      let slug = assign_slug(index, title, policy, exclude_id).await?;
      match write(slug).await {
        Err(Error::Conflict(constraint)) => {
          error!("Conflict on {} again while saving {:?}", constraint, title);
          Err(Error::InternalServerError)
        },
        res => res,
      }
    },
    res => res,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use std::cell::Cell;

  use crate::db::memory::MemorySlugIndex;

  const POLICY: SlugPolicy = SlugPolicy {
    fallback: "noticia",
    max_len: 300,
  };

  struct BrokenIndex;

  #[async_trait(?Send)]
  impl SlugIndex for BrokenIndex {
    async fn slug_taken(&self, _slug: &str, _exclude_id: Option<i32>) -> Result<bool> {
      Err(Error::DisconnectedError("db down".to_string()))
    }
  }

  async fn create(index: &MemorySlugIndex, title: &str) -> (i32, String) {
    let slug = assign_slug(index, title, &POLICY, None).await.unwrap();
    (index.insert(title, &slug), slug)
  }

  #[test]
  fn base_slug_normalizes_titles() {
    assert_eq!(base_slug("Gran Final", &POLICY), "gran-final");
    assert_eq!(base_slug("  ¡Año Nuevo en Atenas!  ", &POLICY), "ano-nuevo-en-atenas");
    assert_eq!(base_slug("Crisis -- económica, 2024", &POLICY), "crisis-economica-2024");
  }

  #[test]
  fn empty_titles_use_the_fallback() {
    assert_eq!(base_slug("¡¿?!", &POLICY), "noticia");
    assert_eq!(base_slug("", &POLICY), "noticia");
  }

  #[test]
  fn long_titles_fit_the_column() {
    let policy = SlugPolicy { fallback: "x", max_len: 10 };
    assert_eq!(base_slug("abcd efgh ijkl", &policy), "abcd-efgh");
    assert_eq!(candidate("abcd-efgh", 12, &policy), "abcd-ef-12");
    assert!(candidate("abcd-efgh", 12, &policy).len() <= 10);
  }

  #[actix_rt::test]
  async fn same_title_gets_suffixes_in_creation_order() {
    let index = MemorySlugIndex::new();
    let mut slugs = Vec::new();
    for _ in 0..4 {
      slugs.push(create(&index, "Gran Final").await.1);
    }
    assert_eq!(slugs, vec!["gran-final", "gran-final-1", "gran-final-2", "gran-final-3"]);
  }

  #[actix_rt::test]
  async fn own_row_is_not_a_collision() {
    let index = MemorySlugIndex::new();
    let (id, slug) = create(&index, "Gran Final").await;
    let again = assign_slug(&index, "Gran Final", &POLICY, Some(id)).await.unwrap();
    assert_eq!(again, slug);
  }

  #[actix_rt::test]
  async fn unchanged_title_keeps_slug() {
    let index = MemorySlugIndex::new();
    create(&index, "Gran Final").await;
    let (id, _) = create(&index, "Gran Final").await;

    // First row got renamed in between, the base is free now. Same title still keeps "-1".
    index.rename(1, "Otra cosa", "otra-cosa");
    assert_eq!(slug_for_update(&index, "Gran Final", Some("Gran Final"), &POLICY, id).await.unwrap(), None);
    assert_eq!(slug_for_update(&index, "Gran Final", None, &POLICY, id).await.unwrap(), None);
    assert_eq!(index.slug_of(id).as_deref(), Some("gran-final-1"));
  }

  #[actix_rt::test]
  async fn new_title_recomputes_slug() {
    let index = MemorySlugIndex::new();
    let (id, _) = create(&index, "Gran Final").await;
    let slug = slug_for_update(&index, "Gran Final", Some("Copa de Verano"), &POLICY, id).await.unwrap();
    assert_eq!(slug.as_deref(), Some("copa-de-verano"));
  }

  #[actix_rt::test]
  async fn rename_frees_the_old_slug() {
    let index = MemorySlugIndex::new();
    let (first, first_slug) = create(&index, "Gran Final").await;
    let (second, second_slug) = create(&index, "Gran Final").await;
    assert_eq!(first_slug, "gran-final");
    assert_eq!(second_slug, "gran-final-1");

    let renamed = slug_for_update(&index, "Gran Final", Some("Gran Final 2024"), &POLICY, first)
      .await.unwrap().unwrap();
    index.rename(first, "Gran Final 2024", &renamed);
    assert_eq!(renamed, "gran-final-2024");

    // Nothing is reassigned; the second article keeps its suffix.
    assert_eq!(index.slug_of(second).as_deref(), Some("gran-final-1"));
    // The bare slug is available again for a future title.
    let (_, third) = create(&index, "Gran Final").await;
    assert_eq!(third, "gran-final");
  }

  #[actix_rt::test]
  async fn empty_titles_fall_back_to_the_default_base() {
    let index = MemorySlugIndex::new();
    assert_eq!(create(&index, "???").await.1, "noticia");
    assert_eq!(create(&index, "!!!").await.1, "noticia-1");
  }

  #[actix_rt::test]
  async fn index_failure_aborts() {
    let res = assign_slug(&BrokenIndex, "Gran Final", &POLICY, None).await;
    assert!(matches!(res, Err(Error::DisconnectedError(_))));

    let writes = Cell::new(0);
    let res = write_with_slug(&BrokenIndex, "Gran Final", &POLICY, None, |_slug| {
      writes.set(writes.get() + 1);
      async { Ok(()) }
    }).await;
    assert!(res.is_err());
    assert_eq!(writes.get(), 0);
  }

  #[actix_rt::test]
  async fn conflict_retries_once_with_a_fresh_slug() {
    let index = MemorySlugIndex::new();
    let attempts = Cell::new(0);
    let slug = write_with_slug(&index, "Gran Final", &POLICY, None, |slug| {
      attempts.set(attempts.get() + 1);
      let first = attempts.get() == 1;
      if first {
        // A concurrent request stored the same slug after our check.
        index.insert("Gran Final", &slug);
      }
      async move {
        if first {
          Err(Error::Conflict("articles_slug_key".to_string()))
        } else {
          Ok(slug)
        }
      }
    }).await.unwrap();
    assert_eq!(attempts.get(), 2);
    assert_eq!(slug, "gran-final-1");
  }

  #[actix_rt::test]
  async fn second_conflict_is_internal_error() {
    let index = MemorySlugIndex::new();
    let res: Result<()> = write_with_slug(&index, "Gran Final", &POLICY, None, |_slug| async {
      Err(Error::Conflict("articles_slug_key".to_string()))
    }).await;
    assert!(matches!(res, Err(Error::InternalServerError)));
  }

  #[actix_rt::test]
  async fn update_passes_a_slug_only_for_new_titles() {
    let index = MemorySlugIndex::new();
    let (id, _) = create(&index, "Gran Final").await;

    let unchanged = update_with_slug(&index, "Gran Final", Some("Gran Final"), &POLICY, id,
      |slug| async move { Ok(slug) }).await.unwrap();
    assert_eq!(unchanged, None);

    let renamed = update_with_slug(&index, "Gran Final", Some("Gran Final 2024"), &POLICY, id,
      |slug| async move { Ok(slug) }).await.unwrap();
    assert_eq!(renamed.as_deref(), Some("gran-final-2024"));
  }

  #[test]
  fn absolute_url_uses_id_and_slug() {
    struct Doc;
    impl Sluggable for Doc {
      const ROUTE: &'static str = "noticias";
      const SLUG_POLICY: SlugPolicy = POLICY;
      fn id(&self) -> i32 { 7 }
      fn slug(&self) -> &str { "gran-final" }
    }
    assert_eq!(Doc.absolute_url(), "/noticias/7-gran-final/");
  }
}
