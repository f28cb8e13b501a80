use serde::de::Deserialize;

use std::collections::HashMap;

use clap::ArgMatches;
use config::{Config, ConfigError, Value, File, Environment};

use crate::error::*;

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub conf: Config
}

impl AppConfig {
  pub fn new_clap(cli: &ArgMatches) -> Result<Self> {
    // Load defaults
    let mut builder = Config::builder()
      .add_source(File::with_name("conf/default"));

    if let Some(config_file) = cli.get_one::<String>("config") {
      builder = builder.add_source(File::with_name(config_file));
    } else {
      // Get RUN_MODE from environment
      let env = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());
      builder = builder
        .add_source(File::with_name(&format!("conf/{}", env)).required(false))
        // Allow overrides from environment
        .add_source(Environment::with_prefix("app").separator("_"));
    }

    Ok(AppConfig {
      conf: builder.build()?,
    })
  }

  /// Wrap an already built `Config`.
  pub fn from_config(conf: Config) -> Self {
    AppConfig { conf }
  }

  pub fn get<'de, T: Deserialize<'de>>(&self, key: &str) -> Result<Option<T>> {
    match self.conf.get(key) {
      Ok(val) => Ok(Some(val)),
      Err(ConfigError::NotFound(_)) => Ok(None),
      Err(err) => Err(err.into()),
    }
  }

  pub fn get_str(&self, key: &str) -> Result<Option<String>> {
    let val = if let Some(val) = self.get::<Value>(key)? {
      Some(val.into_string()?)
    } else {
      None
    };
    Ok(val)
  }

  pub fn get_float(&self, key: &str) -> Result<Option<f64>> {
    let val = if let Some(val) = self.get::<Value>(key)? {
      Some(val.into_float()?)
    } else {
      None
    };
    Ok(val)
  }

  pub fn get_int(&self, key: &str) -> Result<Option<i64>> {
    let val = if let Some(val) = self.get::<Value>(key)? {
      Some(val.into_int()?)
    } else {
      None
    };
    Ok(val)
  }

  pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
    let val = if let Some(val) = self.get::<Value>(key)? {
      Some(val.into_bool()?)
    } else {
      None
    };
    Ok(val)
  }

  pub fn get_table(&self, key: &str) -> Result<Option<Table>> {
    let val = if let Some(val) = self.get::<Value>(key)? {
      Some(Table(val.into_table()?.into_iter().collect()))
    } else {
      None
    };
    Ok(val)
  }

  pub fn get_array(&self, key: &str) -> Result<Option<Vec<Value>>> {
    let val = if let Some(val) = self.get::<Value>(key)? {
      Some(val.into_array()?)
    } else {
      None
    };
    Ok(val)
  }

  /// A list of strings, e.g. `servers` or `<server>.services`.
  pub fn get_str_list(&self, key: &str) -> Result<Option<Vec<String>>> {
    let val = if let Some(list) = self.get_array(key)? {
      let mut out = Vec::with_capacity(list.len());
      for item in list {
        out.push(item.into_string()?);
      }
      Some(out)
    } else {
      None
    };
    Ok(val)
  }

  /// Required string setting.
  pub fn require_str(&self, key: &str) -> Result<String> {
    self.get_str(key)?
      .ok_or_else(|| ConfigError::NotFound(key.to_string()).into())
  }
}

/// A config section, e.g. `[imgbb]` or `[mail]`.
#[derive(Debug, Default, Clone)]
pub struct Table(HashMap<String, Value>);

impl From<HashMap<String, Value>> for Table {
  fn from(map: HashMap<String, Value>) -> Self {
    Table(map)
  }
}

impl Table {
  pub fn new() -> Self {
    Default::default()
  }

  pub fn into_inner(self) -> HashMap<String, Value> {
    self.0
  }

  pub fn get(&self, key: &str) -> Option<Value> {
    self.0.get(key).cloned()
  }

  pub fn get_str(&self, key: &str) -> Result<Option<String>> {
    let val = if let Some(val) = self.get(key) {
      Some(val.into_string()?)
    } else {
      None
    };
    Ok(val)
  }

  pub fn get_int(&self, key: &str) -> Result<Option<i64>> {
    let val = if let Some(val) = self.get(key) {
      Some(val.into_int()?)
    } else {
      None
    };
    Ok(val)
  }

  pub fn get_bool(&self, key: &str) -> Result<Option<bool>> {
    let val = if let Some(val) = self.get(key) {
      Some(val.into_bool()?)
    } else {
      None
    };
    Ok(val)
  }
}

#[cfg(test)]
pub(crate) fn test_config(toml: &str) -> AppConfig {
  let conf = Config::builder()
    .add_source(File::from_str(toml, config::FileFormat::Toml))
    .build()
    .expect("valid test config");
  AppConfig::from_config(conf)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn missing_keys_are_none() {
    let config = test_config(r#"
      debug = true
      servers = ["api"]

      [imgbb]
      api_key = "abc"
    "#);
    assert_eq!(config.get_bool("debug").unwrap(), Some(true));
    assert_eq!(config.get_bool("nope").unwrap(), None);
    assert_eq!(config.get_str_list("servers").unwrap(), Some(vec!["api".to_string()]));

    let imgbb = config.get_table("imgbb").unwrap().unwrap();
    assert_eq!(imgbb.get_str("api_key").unwrap().as_deref(), Some("abc"));
    assert!(imgbb.get_str("upload_url").unwrap().is_none());
  }

  #[test]
  fn required_keys_report_not_found() {
    let config = test_config("debug = false");
    assert!(config.require_str("db.url").is_err());
  }
}
