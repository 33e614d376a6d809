// src/lib.rs
// Talkwire - streaming support-chat backend

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod functions;
pub mod llm;
pub mod retrieval;
pub mod server;

pub use error::{Result, TalkwireError};
