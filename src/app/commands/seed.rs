use log::*;

use actix_rt::System;

use crate::{
  error::*,
  app::*,
  db::{schema, SharedClient},
};

/// Create missing tables and seed the fixed lookup rows, then return.
pub fn execute(config: AppConfig) -> Result<()> {
  let db_url = config.require_str("db.url")?;
  let sys = System::new();
  sys.block_on(async move {
    let cl = SharedClient::new(&db_url);
    schema::ensure_schema(&cl).await
  })?;
  info!("Schema ready.");
  Ok(())
}
