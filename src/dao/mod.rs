/// Document store abstraction (players, ledger, quests, stats, sessions).
pub mod document_store;
/// Live-state tree store abstraction (rooms, presence).
pub mod live_store;
/// Database model definitions.
pub mod models;
/// Typed room access on top of the live-state store.
pub mod room;
/// Storage abstraction layer for database operations.
pub mod storage;
