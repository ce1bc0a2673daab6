//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EngineConfig (validated, immutable)
//!     → ledger / engine / observability built from its sections
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → rewards section swapped into the running engine
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only the emission rate and display units are hot-reloadable;
//!   ledger endpoints require a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::EngineConfig;
pub use schema::LedgerConfig;
pub use schema::ObservabilityConfig;
pub use schema::PollingConfig;
pub use schema::RewardsConfig;
pub use schema::SessionConfig;
