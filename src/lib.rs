//! Mindpop: REST backend for children's cognitive mini-games, progress
//! dashboards and support tickets.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod games;
pub mod llm;
pub mod logger;
pub mod speech;
pub mod store;
