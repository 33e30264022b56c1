/// Bodies of the game endpoints.
pub mod game;
/// Health check body.
pub mod health;
/// Custom validators.
pub mod validation;
