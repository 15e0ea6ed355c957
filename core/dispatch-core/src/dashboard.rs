//! Initial load of the unit dashboard.

use dispatch_protocol::UnitKind;
use tracing::{info, warn};

use crate::api::{ActiveUnitReply, ApiClient};
use crate::error::Result;
use crate::store::SessionStore;
use crate::transport::Transport;
use crate::values::StatusValues;

/// Fetches the roster, the active unit, the status values and the active
/// calls, then populates `store` in one update.
///
/// Each fetch degrades on its own: a failure is logged and leaves that part
/// empty, so a partial outage still yields a usable dashboard.
pub fn load_dashboard<T: Transport>(
    client: &ApiClient<T>,
    kind: UnitKind,
    store: &SessionStore,
) -> StatusValues {
    let roster = or_default(client.roster(kind), "roster");
    let active_unit = match client.active_unit(kind) {
        Ok(ActiveUnitReply::Found(record)) => match dispatch_protocol::Unit::from_record(record) {
            Ok(unit) => Some(unit),
            Err(err) => {
                warn!(kind = %kind, error = %err, "Active unit record did not decode");
                None
            }
        },
        Ok(ActiveUnitReply::NoActiveUnit | ActiveUnitReply::Empty) => None,
        Err(err) => {
            warn!(kind = %kind, error = %err, "Failed to load active unit");
            None
        }
    };
    let values = StatusValues::new(or_default(client.status_codes(), "status values"));
    let calls = or_default(client.active_calls(), "active calls");

    info!(
        kind = %kind,
        units = roster.len(),
        on_duty = active_unit.is_some(),
        codes = values.all().len(),
        calls = calls.len(),
        "Dashboard loaded"
    );

    store.update(|state| {
        state.roster = roster;
        state.active_unit = active_unit;
        state.calls = calls;
        true
    });
    values
}

fn or_default<V: Default>(result: Result<V>, what: &str) -> V {
    result.unwrap_or_else(|err| {
        warn!(error = %err, "Failed to load {}", what);
        V::default()
    })
}
