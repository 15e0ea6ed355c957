//! DispatchEngine - one handle over configuration, session state, the
//! reconciler and the push channel.
//!
//! Front ends build an engine, call [`DispatchEngine::bootstrap`] once, and
//! then either act on the session (status changes, searches) or keep it live
//! with [`DispatchEngine::watch`] plus [`DispatchEngine::start_push`].
//!
//! ```rust,ignore
//! use dispatch_core::DispatchEngine;
//!
//! let engine = DispatchEngine::new()?;
//! engine.bootstrap();
//! let _listener = engine.watch()?;
//! let _push = engine.start_push()?;
//! ```

use dispatch_protocol::{Citizen, NameSearchRequest, UnitKind};
use std::sync::Arc;

use crate::api::ApiClient;
use crate::backoff::ReconnectBackoff;
use crate::board::{build_status_board, StatusButton};
use crate::config::{load_client_config, ClientConfig};
use crate::dashboard::load_dashboard;
use crate::duty::{self, DutyState};
use crate::error::{DispatchError, Result};
use crate::listener::{watch_unit_status, StatusListener};
use crate::push::{PushHub, PushStream};
use crate::reconcile::{ReconcileOutcome, Reconciler, StatusChange};
use crate::search::{submit_name_search, NameSearchOutcome};
use crate::storage::StorageConfig;
use crate::store::SessionStore;
use crate::transport::{HttpTransport, Transport};
use crate::values::StatusValues;

pub struct DispatchEngine<T: Transport + 'static = HttpTransport> {
    storage: StorageConfig,
    config: ClientConfig,
    hub: PushHub,
    reconciler: Arc<Reconciler<T>>,
}

impl DispatchEngine<HttpTransport> {
    /// Engine over `~/.dispatch/client.toml` and the environment.
    pub fn new() -> Result<Self> {
        Self::with_storage(StorageConfig::default())
    }

    pub fn with_storage(storage: StorageConfig) -> Result<Self> {
        let config = load_client_config(&storage)?;
        Self::from_config(storage, config)
    }

    pub fn from_config(storage: StorageConfig, config: ClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(storage, config, transport))
    }
}

impl<T: Transport + 'static> DispatchEngine<T> {
    pub fn with_transport(storage: StorageConfig, config: ClientConfig, transport: T) -> Self {
        let reconciler = Reconciler::new(
            ApiClient::new(transport),
            SessionStore::default(),
            config.unit_kind,
        )
        .with_policy(config.stale_responses);

        Self {
            storage,
            config,
            hub: PushHub::new(),
            reconciler: Arc::new(reconciler),
        }
    }

    pub fn storage(&self) -> &StorageConfig {
        &self.storage
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn kind(&self) -> UnitKind {
        self.config.unit_kind
    }

    pub fn store(&self) -> &SessionStore {
        self.reconciler.store()
    }

    pub fn hub(&self) -> &PushHub {
        &self.hub
    }

    pub fn reconciler(&self) -> &Arc<Reconciler<T>> {
        &self.reconciler
    }

    pub fn values(&self) -> StatusValues {
        self.reconciler.values()
    }

    /// Loads the dashboard into the session and installs its status values.
    pub fn bootstrap(&self) -> StatusValues {
        let values = load_dashboard(self.reconciler.client(), self.kind(), self.store());
        self.reconciler.set_values(values.clone());
        values
    }

    pub fn refresh(&self) -> ReconcileOutcome {
        self.reconciler.reconcile()
    }

    pub fn duty_state(&self) -> Option<DutyState> {
        duty::duty_state(self.store().active_unit().as_ref(), &self.values())
    }

    pub fn status_board(&self) -> Vec<StatusButton> {
        build_status_board(&self.values(), self.store().active_unit().as_ref())
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Actions
    // ─────────────────────────────────────────────────────────────────────────────

    /// Changes the active unit's status to the code with this id or label.
    pub fn set_status(&self, id_or_label: &str) -> Result<StatusChange> {
        let values = self.values();
        let target = values.lookup(id_or_label).ok_or_else(|| {
            DispatchError::InvalidRequest(dispatch_protocol::ErrorInfo::new(
                "unknown_status",
                format!("no status code matches '{}'", id_or_label.trim()),
            ))
        })?;
        self.reconciler.change_status(target)
    }

    pub fn go_on_duty(&self, unit_id: &str) -> Result<StatusChange> {
        self.reconciler.go_on_duty(unit_id)
    }

    pub fn search_name(&self, name: &str) -> Result<NameSearchOutcome> {
        submit_name_search(self.reconciler.client(), &NameSearchRequest::new(name))
    }

    pub fn citizens(&self) -> Result<Vec<Citizen>> {
        self.reconciler.client().citizens()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Live updates
    // ─────────────────────────────────────────────────────────────────────────────

    /// Reconciles on every status event for this engine's unit kind.
    pub fn watch(&self) -> Result<StatusListener> {
        watch_unit_status(&self.hub, Arc::clone(&self.reconciler))
    }

    /// Connects the push channel when an address is configured.
    pub fn start_push(&self) -> Result<Option<PushStream>> {
        let Some(addr) = self.config.push_addr.as_deref() else {
            return Ok(None);
        };
        let backoff = ReconnectBackoff::new(self.config.reconnect.clone());
        PushStream::connect(addr, self.hub.clone(), backoff).map(Some)
    }
}
