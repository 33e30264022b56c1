/// Round-over and abort decisions.
pub mod completion;
/// OpenAPI documentation generation.
pub mod documentation;
/// Game lifecycle of a room.
pub mod game_service;
/// Health check service.
pub mod health_service;
/// Token credits, leaderboard mirror and transaction log.
pub mod ledger;
/// Question providers per game type.
pub mod questions;
/// Quest catalog and progress tracking.
pub mod quests;
/// Token reward resolution.
pub mod rewards;
/// Question loop: timers, reveals and answers.
pub mod round_driver;
/// End-of-game session summaries.
pub mod sessions;
/// Lifetime answer statistics.
pub mod stats;
/// Document store connection supervisor toggling degraded mode.
pub mod storage_supervisor;
