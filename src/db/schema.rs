//! Table creation and fixed-row seeding. Safe to run on every start.

use log::*;

use crate::error::*;
use crate::models::{OfferingCategory, PublicationState};

use crate::db::SharedClient;

static SCHEMA: &'static str = r#"
CREATE TABLE IF NOT EXISTS authors (
  id SERIAL PRIMARY KEY,
  user_id INTEGER NOT NULL UNIQUE,
  email VARCHAR(254) NOT NULL,
  first_name VARCHAR(100) NOT NULL,
  last_name VARCHAR(100) NOT NULL,
  photo_url TEXT NOT NULL DEFAULT '',
  created_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS publication_states (
  id INTEGER PRIMARY KEY,
  name VARCHAR(50) NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS service_categories (
  id INTEGER PRIMARY KEY,
  name VARCHAR(100) NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS articles (
  id SERIAL PRIMARY KEY,
  author_id INTEGER NOT NULL REFERENCES authors(id),
  title VARCHAR(500) NOT NULL,
  subtitle TEXT NOT NULL DEFAULT '',
  body TEXT NOT NULL,
  keywords TEXT NOT NULL DEFAULT '',
  slug VARCHAR(300) NOT NULL UNIQUE,
  published_on DATE NOT NULL DEFAULT CURRENT_DATE,
  state_id INTEGER NOT NULL REFERENCES publication_states(id),
  subscribers_only BOOLEAN NOT NULL DEFAULT FALSE,
  show_credits BOOLEAN NOT NULL DEFAULT TRUE,
  images TEXT[] NOT NULL DEFAULT '{}',
  visits_weekly BIGINT NOT NULL DEFAULT 0 CHECK (visits_weekly >= 0),
  visits_total BIGINT NOT NULL DEFAULT 0 CHECK (visits_total >= 0),
  counter_reset_at TIMESTAMP NOT NULL DEFAULT NOW(),
  created_at TIMESTAMP NOT NULL DEFAULT NOW(),
  updated_at TIMESTAMP NOT NULL DEFAULT NOW()
);
CREATE INDEX IF NOT EXISTS articles_state_published_idx ON articles(state_id, published_on);

CREATE TABLE IF NOT EXISTS article_editors (
  article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
  author_id INTEGER NOT NULL REFERENCES authors(id) ON DELETE CASCADE,
  PRIMARY KEY (article_id, author_id)
);

CREATE TABLE IF NOT EXISTS article_visits (
  id BIGSERIAL PRIMARY KEY,
  article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
  origin INET,
  visited_at TIMESTAMP NOT NULL
);
CREATE INDEX IF NOT EXISTS article_visits_origin_idx ON article_visits(article_id, origin, visited_at);

CREATE TABLE IF NOT EXISTS services (
  id SERIAL PRIMARY KEY,
  title VARCHAR(200) NOT NULL,
  description TEXT,
  keywords TEXT,
  image_url TEXT,
  category_id INTEGER NOT NULL REFERENCES service_categories(id),
  active BOOLEAN NOT NULL DEFAULT TRUE,
  slug VARCHAR(250) NOT NULL UNIQUE,
  created_at TIMESTAMP NOT NULL DEFAULT NOW(),
  updated_at TIMESTAMP NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS ads (
  id SERIAL PRIMARY KEY,
  article_id INTEGER NOT NULL REFERENCES articles(id) ON DELETE CASCADE,
  kind VARCHAR(50) NOT NULL,
  starts_on DATE NOT NULL,
  ends_on DATE NOT NULL,
  target_url VARCHAR(500) NOT NULL,
  impressions BIGINT NOT NULL DEFAULT 0,
  clicks BIGINT NOT NULL DEFAULT 0,
  created_at TIMESTAMP NOT NULL DEFAULT NOW(),
  CHECK (ends_on >= starts_on)
);
CREATE INDEX IF NOT EXISTS ads_article_idx ON ads(article_id, starts_on, ends_on);

CREATE TABLE IF NOT EXISTS newsletter_subscribers (
  id SERIAL PRIMARY KEY,
  email VARCHAR(254) NOT NULL UNIQUE,
  name VARCHAR(100),
  subscribed_at TIMESTAMP NOT NULL DEFAULT NOW(),
  active BOOLEAN NOT NULL DEFAULT TRUE,
  confirmation_token VARCHAR(100) NOT NULL UNIQUE,
  confirmed BOOLEAN NOT NULL DEFAULT FALSE
);

CREATE TABLE IF NOT EXISTS contact_messages (
  id SERIAL PRIMARY KEY,
  name VARCHAR(100) NOT NULL,
  email VARCHAR(254) NOT NULL,
  subject VARCHAR(200) NOT NULL,
  message TEXT NOT NULL,
  sent_at TIMESTAMP NOT NULL DEFAULT NOW(),
  read BOOLEAN NOT NULL DEFAULT FALSE,
  replied BOOLEAN NOT NULL DEFAULT FALSE
);
CREATE INDEX IF NOT EXISTS contact_messages_sent_idx ON contact_messages(sent_at DESC);
"#;

fn quote(val: &str) -> String {
  format!("'{}'", val.replace('\'', "''"))
}

/// Inserts for the fixed-id lookup rows. Existing rows are left alone.
pub fn seed_sql() -> String {
  let states = PublicationState::ALL.iter()
    .map(|state| format!("({}, {})", state.id(), quote(state.name())))
    .collect::<Vec<_>>()
    .join(", ");
  let categories = OfferingCategory::ALL.iter()
    .map(|cat| format!("({}, {})", cat.id(), quote(cat.name())))
    .collect::<Vec<_>>()
    .join(", ");
  format!(
    "INSERT INTO publication_states(id, name) VALUES {} ON CONFLICT (id) DO NOTHING;\n\
     INSERT INTO service_categories(id, name) VALUES {} ON CONFLICT (id) DO NOTHING;\n",
    states, categories)
}

/// Create missing tables and seed the lookup rows.
pub async fn ensure_schema(cl: &SharedClient) -> Result<()> {
  info!("Schema: creating missing tables.");
  cl.batch_execute(SCHEMA).await?;
  info!("Schema: seeding publication states and service categories.");
  cl.batch_execute(&seed_sql()).await?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn seed_rows_use_stable_ids() {
    let sql = seed_sql();
    assert!(sql.contains("(1, 'draft'), (2, 'trashed'), (3, 'published'), (4, 'ready_to_edit')"));
    assert!(sql.contains("(1, 'consultoria_estrategica'), (2, 'capacitaciones_especializadas')"));
    assert_eq!(sql.matches("ON CONFLICT (id) DO NOTHING").count(), 2);
  }

  #[test]
  fn schema_backs_slug_uniqueness() {
    assert!(SCHEMA.contains("slug VARCHAR(300) NOT NULL UNIQUE"));
    assert!(SCHEMA.contains("slug VARCHAR(250) NOT NULL UNIQUE"));
    assert_eq!(quote("it's"), "'it''s'");
  }

  #[test]
  fn form_limits_fit_the_columns() {
    use crate::forms::{article, offering};
    assert!(SCHEMA.contains(&format!("title VARCHAR({}) NOT NULL", article::MAX_TITLE_LEN)));
    assert!(SCHEMA.contains(&format!("title VARCHAR({}) NOT NULL", offering::MAX_TITLE_LEN)));
    assert!(SCHEMA.contains("kind VARCHAR(50) NOT NULL"));
    assert!(SCHEMA.contains("REFERENCES articles(id) ON DELETE CASCADE,\n  kind"));
  }
}
