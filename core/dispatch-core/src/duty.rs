//! Duty state of the active unit and the guard on status actions.
//!
//! ```text
//!            go on duty                 status button
//! OffDuty ─────────────▶ OnDuty ◀──────────────────▶ OnDutyWithSubStatus
//!    ▲                     │                                 │
//!    └──── SET_OFF_DUTY ───┴─────────── SET_OFF_DUTY ────────┘
//! ```
//!
//! There is no terminal state.

use dispatch_protocol::{ShouldDo, StatusValue, Unit};

use crate::values::StatusValues;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DutyState {
    OffDuty,
    OnDuty,
    /// On duty with any status that neither sets on nor off duty.
    OnDutyWithSubStatus,
}

impl DutyState {
    pub fn as_str(self) -> &'static str {
        match self {
            DutyState::OffDuty => "off duty",
            DutyState::OnDuty => "on duty",
            DutyState::OnDutyWithSubStatus => "on duty (sub-status)",
        }
    }
}

/// Why a status action was refused without contacting the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusBlock {
    NoActiveUnit,
    /// Off-duty units go through the dedicated on-duty action.
    OffDuty,
}

/// The unit's current status.
///
/// `status_id` is authoritative: an overlay may update it without replacing
/// the embedded record, so the embedded record is used only when it matches
/// (or when there is no id at all). Otherwise the id is resolved against the
/// session's values.
pub fn current_status<'a>(unit: &'a Unit, values: &'a StatusValues) -> Option<&'a StatusValue> {
    match (unit.status.as_ref(), unit.status_id.as_deref()) {
        (Some(status), None) => Some(status),
        (Some(status), Some(status_id)) if status.id == status_id => Some(status),
        (_, Some(status_id)) => values.find(status_id),
        (None, None) => None,
    }
}

/// Duty state of `unit`; `None` when no unit is active.
pub fn duty_state(unit: Option<&Unit>, values: &StatusValues) -> Option<DutyState> {
    let unit = unit?;
    let state = match current_status(unit, values).map(|status| &status.should_do) {
        None | Some(ShouldDo::SetOffDuty) => DutyState::OffDuty,
        Some(ShouldDo::SetOnDuty) => DutyState::OnDuty,
        Some(_) => DutyState::OnDutyWithSubStatus,
    };
    Some(state)
}

/// Checks whether status buttons may act for `unit`.
pub fn check_status_actions(unit: Option<&Unit>, values: &StatusValues) -> Result<(), StatusBlock> {
    match duty_state(unit, values) {
        None => Err(StatusBlock::NoActiveUnit),
        Some(DutyState::OffDuty) => Err(StatusBlock::OffDuty),
        Some(_) => Ok(()),
    }
}

pub fn status_actions_enabled(unit: Option<&Unit>, values: &StatusValues) -> bool {
    check_status_actions(unit, values).is_ok()
}
