//! Database queries

pub mod user;
