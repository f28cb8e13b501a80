mod config;
pub use self::config::*;
#[cfg(test)]
pub(crate) use self::config::test_config;

pub mod commands;
pub use self::commands::*;
