pub mod serve;
pub mod seed;
