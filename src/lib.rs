pub mod calendar;
pub mod chat;
pub mod config;
pub mod crypto;
pub mod error;
pub mod store;
pub mod utils;
pub mod web;
