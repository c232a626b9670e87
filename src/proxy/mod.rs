//! Proxy core: connection coordination between client and server legs.
//!
//! # Data Flow
//! ```text
//! host engine event
//!     → coordinator.rs (ProxyHooks impl)
//!         → pair.rs (per-connection record, keyed by ConnectionId)
//!         → settings.rs (snapshot captured at connect)
//!         → pipeline / scheduler
//! ```
//!
//! Both legs of a pair must speak the same wire protocol; the coordinator
//! does not translate between them.

pub mod coordinator;
pub mod hooks;
pub mod pair;
pub mod settings;

pub use coordinator::{ConnectionCoordinator, UpstreamChoice};
pub use hooks::{ClientLeg, PipelineStage, ProxyHooks, ServerLegId, ServerPipeline, UpstreamBinding};
pub use settings::{BuildError, Settings, SettingsStore};
