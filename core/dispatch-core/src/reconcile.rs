//! Keeps the stored active unit in line with the server.
//!
//! Every refresh and status change takes a number from one
//! [`RequestSequence`]. Under [`StaleResponsePolicy::DropSuperseded`] a
//! response is applied only if no newer request's answer has been applied
//! yet; the check and the write happen inside a single
//! [`SessionStore::update`], so a response can never overwrite the answer to a
//! newer request. Newer requests that fail or return nothing don't count.

use dispatch_protocol::{overlay_unit, ShouldDo, StatusValue, Unit, UnitKind};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;
use tracing::{debug, info};

use crate::api::{ActiveUnitReply, ApiClient};
use crate::config::StaleResponsePolicy;
use crate::duty::{check_status_actions, StatusBlock};
use crate::error::{DispatchError, Result};
use crate::store::SessionStore;
use crate::transport::Transport;
use crate::values::StatusValues;

/// Monotonic request numbering shared by every request that writes the
/// active unit, plus the number of the newest answer applied so far.
#[derive(Debug, Default)]
pub struct RequestSequence {
    latest: AtomicU64,
    applied: AtomicU64,
}

impl RequestSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues the next number. The first one is 1.
    pub fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    /// Number of the newest applied answer; 0 before the first.
    pub fn applied(&self) -> u64 {
        self.applied.load(Ordering::SeqCst)
    }

    /// True unless an answer to a newer request has already been applied.
    pub fn is_current(&self, seq: u64) -> bool {
        seq > self.applied()
    }

    pub fn mark_applied(&self, seq: u64) {
        self.applied.fetch_max(seq, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// The server's record was merged into the stored unit.
    Applied(Unit),
    /// The server reported no active unit; the store now holds `None`.
    Cleared,
    /// The answer to a newer request was applied before this one arrived.
    Superseded,
    /// The answer carried no usable record; nothing changed.
    Ignored,
    /// The request failed; nothing changed.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StatusChange {
    Applied(Unit),
    /// The target is already the current status; no request was sent.
    Unchanged,
    /// Refused client-side; no request was sent.
    Blocked(StatusBlock),
    Superseded,
    /// The server accepted the change without returning a record.
    Ignored,
}

enum NextUnit {
    Merge(Map<String, Value>),
    Replace(Map<String, Value>),
    Clear,
}

enum Commit {
    Applied(Option<Unit>),
    Superseded,
    Invalid(serde_json::Error),
}

pub struct Reconciler<T: Transport> {
    client: ApiClient<T>,
    store: SessionStore,
    values: RwLock<StatusValues>,
    kind: UnitKind,
    policy: StaleResponsePolicy,
    sequence: RequestSequence,
    in_flight: AtomicUsize,
}

impl<T: Transport> Reconciler<T> {
    pub fn new(client: ApiClient<T>, store: SessionStore, kind: UnitKind) -> Self {
        Self {
            client,
            store,
            values: RwLock::new(StatusValues::default()),
            kind,
            policy: StaleResponsePolicy::default(),
            sequence: RequestSequence::new(),
            in_flight: AtomicUsize::new(0),
        }
    }

    pub fn with_values(self, values: StatusValues) -> Self {
        self.set_values(values);
        self
    }

    /// Replaces the session's status values, e.g. after the dashboard loads.
    pub fn set_values(&self, values: StatusValues) {
        *self
            .values
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = values;
    }

    pub fn with_policy(mut self, policy: StaleResponsePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn client(&self) -> &ApiClient<T> {
        &self.client
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn values(&self) -> StatusValues {
        self.values
            .read()
            .map(|values| values.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    /// True while at least one request is outstanding.
    pub fn is_loading(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst) > 0
    }

    /// Refetches the active unit and applies the answer.
    ///
    /// Never fails: errors other than "no active unit" leave the store as it
    /// was and are only logged. The next push signal or user action retries.
    pub fn reconcile(&self) -> ReconcileOutcome {
        let seq = self.sequence.issue();
        let reply = {
            let _loading = InFlight::enter(&self.in_flight);
            self.client.active_unit(self.kind)
        };

        let next = match reply {
            Ok(ActiveUnitReply::Found(record)) => NextUnit::Merge(record),
            Ok(ActiveUnitReply::NoActiveUnit) => NextUnit::Clear,
            Ok(ActiveUnitReply::Empty) => {
                debug!(kind = %self.kind, seq, "Active unit response had no record");
                return ReconcileOutcome::Ignored;
            }
            Err(err) => {
                debug!(kind = %self.kind, seq, error = %err, "Active unit refresh failed");
                return ReconcileOutcome::Failed;
            }
        };

        match self.commit(seq, next) {
            Commit::Applied(Some(unit)) => ReconcileOutcome::Applied(unit),
            Commit::Applied(None) => ReconcileOutcome::Cleared,
            Commit::Superseded => {
                debug!(kind = %self.kind, seq, "Dropped superseded active unit response");
                ReconcileOutcome::Superseded
            }
            Commit::Invalid(err) => {
                debug!(kind = %self.kind, seq, error = %err, "Active unit record did not decode");
                ReconcileOutcome::Failed
            }
        }
    }

    /// Moves the active unit to `target`.
    ///
    /// Off-duty units are refused here; they go on duty through
    /// [`Reconciler::go_on_duty`].
    pub fn change_status(&self, target: &StatusValue) -> Result<StatusChange> {
        let unit = self.store.active_unit();
        if let Err(block) = check_status_actions(unit.as_ref(), &self.values()) {
            debug!(kind = %self.kind, status = %target.id, ?block, "Status change blocked");
            return Ok(StatusChange::Blocked(block));
        }
        let Some(unit) = unit else {
            return Ok(StatusChange::Blocked(StatusBlock::NoActiveUnit));
        };
        if unit.status_id.as_deref() == Some(target.id.as_str()) {
            return Ok(StatusChange::Unchanged);
        }

        self.send_status(&unit.id, target, NextUnit::Merge)
    }

    /// Puts `unit_id` on duty with the session's `SET_ON_DUTY` code and makes
    /// it the active unit.
    pub fn go_on_duty(&self, unit_id: &str) -> Result<StatusChange> {
        let values = self.values();
        let on_duty = values
            .on_duty_code()
            .ok_or(DispatchError::MissingStatusCode(ShouldDo::SetOnDuty))?;

        let current = self.store.active_unit();
        let same_unit = current.as_ref().map(|unit| unit.id.as_str()) == Some(unit_id);
        if same_unit
            && current.as_ref().and_then(|unit| unit.status_id.as_deref())
                == Some(on_duty.id.as_str())
        {
            return Ok(StatusChange::Unchanged);
        }

        if same_unit {
            self.send_status(unit_id, on_duty, NextUnit::Merge)
        } else {
            self.send_status(unit_id, on_duty, NextUnit::Replace)
        }
    }

    fn send_status(
        &self,
        unit_id: &str,
        target: &StatusValue,
        apply: fn(Map<String, Value>) -> NextUnit,
    ) -> Result<StatusChange> {
        let seq = self.sequence.issue();
        let record = {
            let _loading = InFlight::enter(&self.in_flight);
            self.client.update_status(self.kind, unit_id, &target.id)?
        };
        let Some(record) = record else {
            return Ok(StatusChange::Ignored);
        };

        match self.commit(seq, apply(record)) {
            Commit::Applied(Some(unit)) => {
                info!(
                    kind = %self.kind,
                    unit = %unit.id,
                    status = %target.label(),
                    "Unit status changed"
                );
                Ok(StatusChange::Applied(unit))
            }
            Commit::Applied(None) => Ok(StatusChange::Ignored),
            Commit::Superseded => Ok(StatusChange::Superseded),
            Commit::Invalid(source) => Err(DispatchError::Json {
                context: format!("decoding {}", self.kind.status_path(unit_id)),
                source,
            }),
        }
    }

    fn accepts(&self, seq: u64) -> bool {
        match self.policy {
            StaleResponsePolicy::DropSuperseded => self.sequence.is_current(seq),
            StaleResponsePolicy::LastResolvedWins => true,
        }
    }

    fn commit(&self, seq: u64, next: NextUnit) -> Commit {
        let mut commit = Commit::Superseded;
        self.store.update(|state| {
            if !self.accepts(seq) {
                return false;
            }
            let unit = match next {
                NextUnit::Merge(record) => overlay_unit(state.active_unit.as_ref(), &record).map(Some),
                NextUnit::Replace(record) => Unit::from_record(record).map(Some),
                NextUnit::Clear => Ok(None),
            };
            match unit {
                Ok(unit) => {
                    self.sequence.mark_applied(seq);
                    let changed = state.active_unit != unit;
                    state.active_unit = unit.clone();
                    commit = Commit::Applied(unit);
                    changed
                }
                Err(err) => {
                    commit = Commit::Invalid(err);
                    false
                }
            }
        });
        commit
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ApiRequest, ApiResponse, HttpMethod};
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct Scripted {
        replies: Mutex<VecDeque<Result<ApiResponse>>>,
        sent: Mutex<Vec<ApiRequest>>,
    }

    impl Scripted {
        fn new(replies: Vec<Result<ApiResponse>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    impl Transport for Scripted {
        fn execute(&self, request: &ApiRequest) -> Result<ApiResponse> {
            self.sent.lock().unwrap().push(request.clone());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ApiResponse::new(500, Value::Null)))
        }
    }

    fn values() -> StatusValues {
        StatusValues::new(vec![
            StatusValue::new("s-on-duty", "10-8", ShouldDo::SetOnDuty, Some(0)),
            StatusValue::new("s-off-duty", "10-7", ShouldDo::SetOffDuty, Some(1)),
            StatusValue::new("s-busy", "10-6", ShouldDo::SetStatus, Some(2)),
        ])
    }

    fn reconciler(replies: Vec<Result<ApiResponse>>) -> Reconciler<Scripted> {
        Reconciler::new(
            ApiClient::new(Scripted::new(replies)),
            SessionStore::default(),
            UnitKind::Leo,
        )
        .with_values(values())
    }

    fn unit(id: &str, status_id: &str) -> Unit {
        Unit {
            id: id.to_string(),
            status_id: Some(status_id.to_string()),
            ..Unit::default()
        }
    }

    #[test]
    fn sequence_numbers_increase() {
        let sequence = RequestSequence::new();
        assert_eq!(sequence.latest(), 0);
        let first = sequence.issue();
        let second = sequence.issue();
        assert!(second > first);
        assert!(sequence.is_current(first));
        assert!(sequence.is_current(second));

        sequence.mark_applied(second);
        assert!(!sequence.is_current(first));
        sequence.mark_applied(first);
        assert_eq!(sequence.applied(), second);
    }

    #[test]
    fn reconcile_merges_onto_existing_unit() {
        let reconciler = reconciler(vec![Ok(ApiResponse::ok(
            json!({ "id": "u1", "statusId": "s-busy" }),
        ))]);
        let mut existing = unit("u1", "s-on-duty");
        existing.callsign = Some("1A-12".to_string());
        reconciler.store().set_active_unit(Some(existing));

        let outcome = reconciler.reconcile();

        let stored = reconciler.store().active_unit().unwrap();
        assert_eq!(outcome, ReconcileOutcome::Applied(stored.clone()));
        assert_eq!(stored.status_id.as_deref(), Some("s-busy"));
        assert_eq!(stored.callsign.as_deref(), Some("1A-12"));
    }

    #[test]
    fn reconcile_clears_on_no_active_unit() {
        let reconciler = reconciler(vec![Ok(ApiResponse::new(
            400,
            json!({ "error": "noActiveOfficer" }),
        ))]);
        reconciler.store().set_active_unit(Some(unit("u1", "s-busy")));

        assert_eq!(reconciler.reconcile(), ReconcileOutcome::Cleared);
        assert_eq!(reconciler.store().active_unit(), None);
    }

    #[test]
    fn reconcile_swallows_failures() {
        let reconciler = reconciler(vec![
            Err(DispatchError::Transport {
                path: "/leo/active-officer".to_string(),
                details: "connection refused".to_string(),
            }),
            Ok(ApiResponse::new(500, json!({ "error": "internal" }))),
        ]);
        reconciler.store().set_active_unit(Some(unit("u1", "s-busy")));

        assert_eq!(reconciler.reconcile(), ReconcileOutcome::Failed);
        assert_eq!(reconciler.reconcile(), ReconcileOutcome::Failed);
        assert_eq!(
            reconciler.store().active_unit(),
            Some(unit("u1", "s-busy"))
        );
        assert!(!reconciler.is_loading());
    }

    #[test]
    fn reconcile_ignores_record_without_id() {
        let reconciler = reconciler(vec![Ok(ApiResponse::ok(json!({ "id": "" })))]);
        assert_eq!(reconciler.reconcile(), ReconcileOutcome::Ignored);
        assert_eq!(reconciler.store().active_unit(), None);
    }

    #[test]
    fn change_status_sends_put_and_merges() {
        let reconciler = reconciler(vec![Ok(ApiResponse::ok(
            json!({ "id": "u1", "statusId": "s-busy" }),
        ))]);
        reconciler.store().set_active_unit(Some(unit("u1", "s-on-duty")));
        let busy = reconciler.values().find("s-busy").unwrap().clone();

        let change = reconciler.change_status(&busy).unwrap();

        assert!(matches!(change, StatusChange::Applied(ref u) if u.status_id.as_deref() == Some("s-busy")));
        let sent = reconciler.client().transport().sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, HttpMethod::Put);
        assert_eq!(sent[0].path, "/leo/u1/status");
    }

    #[test]
    fn change_status_to_current_status_sends_nothing() {
        let reconciler = reconciler(vec![]);
        reconciler.store().set_active_unit(Some(unit("u1", "s-busy")));
        let busy = reconciler.values().find("s-busy").unwrap().clone();

        assert_eq!(
            reconciler.change_status(&busy).unwrap(),
            StatusChange::Unchanged
        );
        assert!(reconciler.client().transport().sent.lock().unwrap().is_empty());
    }

    #[test]
    fn change_status_blocked_when_off_duty_or_missing() {
        let reconciler = reconciler(vec![]);
        let busy = reconciler.values().find("s-busy").unwrap().clone();

        assert_eq!(
            reconciler.change_status(&busy).unwrap(),
            StatusChange::Blocked(StatusBlock::NoActiveUnit)
        );
        reconciler
            .store()
            .set_active_unit(Some(unit("u1", "s-off-duty")));
        assert_eq!(
            reconciler.change_status(&busy).unwrap(),
            StatusChange::Blocked(StatusBlock::OffDuty)
        );
        assert!(reconciler.client().transport().sent.lock().unwrap().is_empty());
    }

    #[test]
    fn change_status_returns_transport_errors() {
        let reconciler = reconciler(vec![Ok(ApiResponse::new(
            422,
            json!({ "error": "invalidStatus" }),
        ))]);
        reconciler.store().set_active_unit(Some(unit("u1", "s-on-duty")));
        let busy = reconciler.values().find("s-busy").unwrap().clone();

        let err = reconciler.change_status(&busy).unwrap_err();
        assert_eq!(err.code(), Some("invalidStatus"));
        assert_eq!(
            reconciler.store().active_unit(),
            Some(unit("u1", "s-on-duty"))
        );
    }

    #[test]
    fn go_on_duty_replaces_different_unit() {
        let reconciler = reconciler(vec![Ok(ApiResponse::ok(
            json!({ "id": "u2", "statusId": "s-on-duty", "callsign": "2B-01" }),
        ))]);
        let mut previous = unit("u1", "s-off-duty");
        previous.name = Some("Old Name".to_string());
        reconciler.store().set_active_unit(Some(previous));

        let change = reconciler.go_on_duty("u2").unwrap();

        let stored = reconciler.store().active_unit().unwrap();
        assert_eq!(change, StatusChange::Applied(stored.clone()));
        assert_eq!(stored.id, "u2");
        assert_eq!(stored.name, None);
        let sent = reconciler.client().transport().sent.lock().unwrap();
        assert_eq!(sent[0].path, "/leo/u2/status");
        assert_eq!(sent[0].body, Some(json!({ "status": "s-on-duty" })));
    }

    #[test]
    fn go_on_duty_requires_on_duty_code() {
        let reconciler = Reconciler::new(
            ApiClient::new(Scripted::new(vec![])),
            SessionStore::default(),
            UnitKind::EmsFd,
        );
        let err = reconciler.go_on_duty("u1").unwrap_err();
        assert!(matches!(
            err,
            DispatchError::MissingStatusCode(ShouldDo::SetOnDuty)
        ));
    }

    #[test]
    fn superseded_commit_is_dropped() {
        let reconciler = reconciler(vec![]);
        let stale = reconciler.sequence.issue();
        let newer = reconciler.sequence.issue();

        let mut record = Map::new();
        record.insert("id".to_string(), json!("u1"));
        let mut newer_record = record.clone();
        newer_record.insert("statusId".to_string(), json!("s-busy"));
        assert!(matches!(
            reconciler.commit(newer, NextUnit::Merge(newer_record)),
            Commit::Applied(Some(_))
        ));
        assert!(matches!(
            reconciler.commit(stale, NextUnit::Merge(record.clone())),
            Commit::Superseded
        ));
        assert_eq!(
            reconciler.store().active_unit(),
            Some(unit("u1", "s-busy"))
        );

        let reconciler = reconciler.with_policy(StaleResponsePolicy::LastResolvedWins);
        assert!(matches!(
            reconciler.commit(stale, NextUnit::Merge(record)),
            Commit::Applied(Some(_))
        ));
    }

    #[test]
    fn older_commit_applies_when_newer_request_failed() {
        let reconciler = reconciler(vec![]);
        let older = reconciler.sequence.issue();
        let _failed = reconciler.sequence.issue();

        let mut record = Map::new();
        record.insert("id".to_string(), json!("u1"));
        record.insert("statusId".to_string(), json!("s-busy"));
        assert!(matches!(
            reconciler.commit(older, NextUnit::Merge(record)),
            Commit::Applied(Some(_))
        ));
        assert_eq!(reconciler.sequence.applied(), older);
    }
}
