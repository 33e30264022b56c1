//! Library crate for quiz-arena-back, exposing modules for binaries and integration tests.

pub mod config;
/// Storage access: live tree, document store and their models.
pub mod dao;
/// Request and response bodies of the HTTP API.
pub mod dto;
/// Service errors and their HTTP mapping.
pub mod error;
/// HTTP routers.
pub mod routes;
/// Game orchestration logic.
pub mod services;
/// Process-wide state shared by handlers and timers.
pub mod state;
