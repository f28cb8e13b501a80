#[macro_use]
extern crate lazy_static;

#[macro_use]
extern crate serde_json;

pub mod error;
pub use error::Error;

pub mod app;

pub mod auth;

pub mod middleware;

pub mod forms;

pub mod models;

pub mod slug;

pub mod visits;

pub mod clients;

pub mod newsletter;

pub mod services;

pub mod db;
