pub mod attachments;
pub mod config;
pub mod domain;
pub mod error;
pub mod identity;
pub mod repository;
pub mod security;
pub mod server;
pub mod storage;
