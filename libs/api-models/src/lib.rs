//! Wire models shared by the deployd control API and its clients

pub mod models;

pub use models::*;
