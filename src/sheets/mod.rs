pub mod client;
pub mod entities;
pub mod error;
