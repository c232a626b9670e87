//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → WafConfig (validated, immutable)
//!     → compiled into a Settings snapshot shared via ArcSwap
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server rebuilds Settings and swaps it in
//!     → new connections observe new settings, open ones keep theirs
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Upstream topology is fixed at startup; reload only swaps filters and the lb toggle

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::WafConfig;
pub use schema::LbMode;
pub use schema::ListenerConfig;
pub use schema::UpstreamGroupConfig;
pub use schema::UpstreamServerConfig;
pub use schema::HealthCheckConfig;
