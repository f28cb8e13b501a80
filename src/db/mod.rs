pub mod util;

mod author;
mod article;
mod offering;
mod catalog;
mod newsletter;
mod contact;
mod ad;
pub use self::{
  author::*,
  article::*,
  offering::*,
  catalog::*,
  newsletter::*,
  contact::*,
  ad::*,
};

pub mod schema;

mod service;
pub use service::*;

#[cfg(test)]
pub mod memory;
