//! # dispatch-core
//!
//! Client library for a CAD dispatch backend: keeps the logged-in user's
//! active unit (officer or EMS/FD deputy) in sync with the server and drives
//! the status panel.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Blocking HTTP, one thread
//!   per push signal, one reader thread for the push channel.
//! - **Explicit state**: The [`SessionStore`] is a handle passed to whoever
//!   needs it; there is no global session.
//! - **Invalidate, then fetch**: Push events carry no data. They only tell
//!   the [`Reconciler`] to refetch.
//! - **Graceful degradation**: A failed refresh leaves the last known state
//!   in place; "no active unit" is an answer, not an error.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use dispatch_core::DispatchEngine;
//!
//! let engine = DispatchEngine::new()?;
//! engine.bootstrap();
//! engine.set_status("10-6")?;
//! ```

pub mod api;
pub mod backoff;
pub mod board;
pub mod config;
pub mod dashboard;
pub mod duty;
pub mod engine;
pub mod error;
pub mod listener;
pub mod push;
pub mod reconcile;
pub mod search;
pub mod storage;
pub mod store;
pub mod transport;
pub mod values;

pub use api::{ActiveUnitReply, ApiClient};
pub use backoff::ReconnectBackoff;
pub use board::{build_status_board, ButtonAction, ButtonVariant, StatusButton};
pub use config::{
    load_client_config, save_client_config, ClientConfig, ReconnectConfig, StaleResponsePolicy,
};
pub use dashboard::load_dashboard;
pub use duty::{current_status, duty_state, status_actions_enabled, DutyState, StatusBlock};
pub use engine::DispatchEngine;
pub use error::{DispatchError, Result};
pub use listener::{watch_unit_status, StatusListener};
pub use push::{Invalidation, PushHub, PushStream, PushSubscription};
pub use reconcile::{ReconcileOutcome, Reconciler, RequestSequence, StatusChange};
pub use search::{submit_name_search, NameSearchOutcome};
pub use storage::StorageConfig;
pub use store::{SessionState, SessionStore, StoreSubscription};
pub use transport::{ApiRequest, ApiResponse, HttpMethod, HttpTransport, Transport};
pub use values::StatusValues;

pub use dispatch_protocol as protocol;
