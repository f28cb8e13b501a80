pub mod jwt;
pub use self::jwt::*;
