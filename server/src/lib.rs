//! HomeGuard alert distribution server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod alerts;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod push;
pub mod routes;
pub mod state;
pub mod ws;
