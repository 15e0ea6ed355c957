//! Button model for the status panel.

use dispatch_protocol::{ShouldDo, Unit};
use serde::Serialize;

use crate::duty::{current_status, status_actions_enabled};
use crate::values::StatusValues;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonVariant {
    Default,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonAction {
    /// Pick which of the user's units goes on duty.
    SelectUnit,
    ChangeStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusButton {
    pub status_id: String,
    pub label: String,
    pub variant: ButtonVariant,
    pub action: ButtonAction,
    pub active: bool,
    pub disabled: bool,
}

/// Builds the status panel: the on-duty button first, then every other code
/// in display order.
pub fn build_status_board(values: &StatusValues, unit: Option<&Unit>) -> Vec<StatusButton> {
    let actions_enabled = status_actions_enabled(unit, values);
    let mut buttons = Vec::with_capacity(values.all().len());

    if let Some(on_duty) = values.on_duty_code() {
        let current_id = unit
            .and_then(|unit| current_status(unit, values))
            .map(|status| status.id.as_str());
        buttons.push(StatusButton {
            status_id: on_duty.id.clone(),
            label: on_duty.label().to_string(),
            variant: ButtonVariant::Default,
            action: ButtonAction::SelectUnit,
            active: actions_enabled && current_id == Some(on_duty.id.as_str()),
            disabled: false,
        });
    }

    let unit_status_id = unit.and_then(|unit| unit.status_id.as_deref());
    for code in values.selectable_codes() {
        let variant = if code.should_do == ShouldDo::SetOffDuty {
            ButtonVariant::Danger
        } else {
            ButtonVariant::Default
        };
        buttons.push(StatusButton {
            status_id: code.id.clone(),
            label: code.label().to_string(),
            variant,
            action: ButtonAction::ChangeStatus,
            active: unit_status_id == Some(code.id.as_str()),
            disabled: !actions_enabled,
        });
    }

    buttons
}
