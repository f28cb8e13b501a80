pub mod author;
pub mod article;
pub mod offering;
pub mod newsletter;
pub mod contact;
pub mod ad;
pub use self::{
  author::*,
  article::*,
  offering::*,
  newsletter::*,
  contact::*,
  ad::*,
};
