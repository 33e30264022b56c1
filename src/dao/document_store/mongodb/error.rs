use mongodb::error::Error as MongoError;
use thiserror::Error;
use uuid::Uuid;

/// Result alias for MongoDB backend operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

/// Failures of the MongoDB document store.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// A required environment variable is not set.
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar {
        /// Variable name.
        var: &'static str,
    },
    /// The connection URI could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Offending URI.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The client could not be built from the parsed options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// The server never answered the ping issued while connecting.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Pings attempted.
        attempts: u32,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A health check ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Creating a collection index failed.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection name.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reading the reward configuration failed.
    #[error("failed to load token reward configuration")]
    LoadTokenRewards {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reading a player failed.
    #[error("failed to load player `{player_id}`")]
    LoadPlayer {
        /// Player concerned.
        player_id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Crediting a balance failed.
    #[error("failed to credit tokens to player `{player_id}`")]
    CreditTokens {
        /// Player concerned.
        player_id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Appending a ledger record failed.
    #[error("failed to record transaction `{id}`")]
    RecordTransaction {
        /// Record id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Updating a leaderboard mirror failed.
    #[error("failed to sync leaderboard entry of `{player_id}`")]
    SyncLeaderboard {
        /// Player concerned.
        player_id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Updating answer statistics failed.
    #[error("failed to update stats of `{player_id}`")]
    IncrementStats {
        /// Player concerned.
        player_id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reading quest progress failed.
    #[error("failed to load quest progress of `{player_id}`")]
    LoadQuestProgress {
        /// Player concerned.
        player_id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Writing quest progress failed.
    #[error("failed to save quest progress of `{player_id}`")]
    SaveQuestProgress {
        /// Player concerned.
        player_id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Writing a game session failed.
    #[error("failed to save game session `{id}`")]
    SaveGameSession {
        /// Record id.
        id: Uuid,
        /// Driver error.
        #[source]
        source: MongoError,
    },
}
