//! Plain-text rendering of session state for the terminal.

use chrono::NaiveDate;
use dispatch_core::{
    current_status, ButtonAction, ButtonVariant, DutyState, NameSearchOutcome, StatusBlock, StatusButton,
    StatusChange, StatusValues,
};
use dispatch_protocol::{Citizen, Unit, UnitKind};
use std::fmt::Write;

pub fn unit_summary(kind: UnitKind, unit: Option<&Unit>, duty: Option<DutyState>, values: &StatusValues) -> String {
    let Some(unit) = unit else {
        return format!("No active {}.", kind.unit_label());
    };
    let status = current_status(unit, values)
        .map(|status| status.label().to_string())
        .or_else(|| unit.status_id.clone())
        .unwrap_or_else(|| "none".to_string());
    format!(
        "Active {}: {} [{}]\nStatus: {} ({})",
        kind.unit_label(),
        unit.display_name(),
        unit.id,
        status,
        duty.unwrap_or(DutyState::OffDuty).as_str()
    )
}

pub fn status_board(buttons: &[StatusButton]) -> String {
    let mut out = String::new();
    for button in buttons {
        let marker = if button.active {
            '*'
        } else if button.disabled {
            '-'
        } else {
            ' '
        };
        let mut notes = Vec::new();
        if button.action == ButtonAction::SelectUnit {
            notes.push("on-duty");
        }
        if button.variant == ButtonVariant::Danger {
            notes.push("danger");
        }
        if button.disabled {
            notes.push("disabled");
        }
        let _ = write!(out, "{} {:<12} {}", marker, button.label, button.status_id);
        if !notes.is_empty() {
            let _ = write!(out, "  ({})", notes.join(", "));
        }
        out.push('\n');
    }
    out
}

pub fn status_change(change: &StatusChange) -> String {
    match change {
        StatusChange::Applied(unit) => format!(
            "Status updated: {} is now {}",
            unit.display_name(),
            unit.status
                .as_ref()
                .map(|status| status.label().to_string())
                .or_else(|| unit.status_id.clone())
                .unwrap_or_else(|| "unknown".to_string())
        ),
        StatusChange::Unchanged => "Status unchanged; already set.".to_string(),
        StatusChange::Blocked(StatusBlock::NoActiveUnit) => {
            "Blocked: no active unit. Go on duty first.".to_string()
        }
        StatusChange::Blocked(StatusBlock::OffDuty) => {
            "Blocked: unit is off duty. Go on duty first.".to_string()
        }
        StatusChange::Superseded => "A newer update arrived first; nothing applied.".to_string(),
        StatusChange::Ignored => "Server accepted the change without returning the unit.".to_string(),
    }
}

pub fn name_search(outcome: &NameSearchOutcome, today: NaiveDate) -> String {
    match outcome {
        NameSearchOutcome::NotFound => "No citizen found.".to_string(),
        NameSearchOutcome::Invalid(errors) => {
            let mut out = String::new();
            for (field, error) in errors.iter() {
                let _ = writeln!(out, "{}: {}", field, error.message);
            }
            out.trim_end().to_string()
        }
        NameSearchOutcome::Found(result) => {
            let citizen = &result.citizen;
            let mut out = String::new();
            let _ = writeln!(out, "{} [{}]", citizen.full_name(), citizen.id);
            if let Some(born) = citizen.birth_date() {
                let age = citizen
                    .age_on(today)
                    .map_or_else(String::new, |age| format!(" ({})", age));
                let _ = writeln!(out, "Date of birth: {}{}", born, age);
            }
            for (label, value) in [
                ("Gender", citizen.gender.as_ref().map(|v| v.value.clone())),
                ("Ethnicity", citizen.ethnicity.as_ref().map(|v| v.value.clone())),
                ("Hair color", citizen.hair_color.clone()),
                ("Eye color", citizen.eye_color.clone()),
                ("Weight", citizen.weight.clone()),
                ("Height", citizen.height.clone()),
                ("Address", citizen.address.clone()),
                ("Drivers license", citizen.drivers_license.as_ref().map(|v| v.value.clone())),
                ("Weapon license", citizen.weapon_license.as_ref().map(|v| v.value.clone())),
                ("Pilot license", citizen.pilot_license.as_ref().map(|v| v.value.clone())),
                ("CCW", citizen.ccw.as_ref().map(|v| v.value.clone())),
            ] {
                if let Some(value) = value {
                    let _ = writeln!(out, "{}: {}", label, value);
                }
            }
            let plates = result.registered_plates();
            if !plates.is_empty() {
                let _ = writeln!(out, "Vehicles: {}", plates.join(", "));
            }
            if !result.weapons.is_empty() {
                let _ = writeln!(out, "Weapons: {}", result.weapons.len());
            }
            let _ = write!(out, "Tickets: {}", result.tickets().count());
            out
        }
    }
}

pub fn citizens(citizens: &[Citizen]) -> String {
    if citizens.is_empty() {
        return "No citizens.".to_string();
    }
    citizens
        .iter()
        .map(|citizen| format!("{}  {}", citizen.id, citizen.full_name()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn roster(units: &[Unit]) -> String {
    units
        .iter()
        .map(|unit| format!("{}  {}", unit.id, unit.display_name()))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_core::build_status_board;
    use dispatch_protocol::{NameSearchRequest, ShouldDo, StatusValue};

    fn values() -> StatusValues {
        StatusValues::new(vec![
            StatusValue::new("s-on", "10-8", ShouldDo::SetOnDuty, Some(0)),
            StatusValue::new("s-off", "10-7", ShouldDo::SetOffDuty, Some(2)),
            StatusValue::new("s-busy", "10-6", ShouldDo::SetStatus, Some(1)),
        ])
    }

    #[test]
    fn summary_without_unit() {
        assert_eq!(
            unit_summary(UnitKind::EmsFd, None, None, &values()),
            "No active deputy."
        );
    }

    #[test]
    fn summary_resolves_status_label() {
        let unit = Unit {
            id: "u1".to_string(),
            callsign: Some("1A-12".to_string()),
            status_id: Some("s-busy".to_string()),
            ..Unit::default()
        };
        let text = unit_summary(
            UnitKind::Leo,
            Some(&unit),
            Some(DutyState::OnDutyWithSubStatus),
            &values(),
        );
        assert!(text.contains("1A-12 [u1]"));
        assert!(text.contains("Status: 10-6"));
    }

    #[test]
    fn summary_prefers_status_id_over_stale_embedded_status() {
        let unit = Unit {
            id: "u1".to_string(),
            status_id: Some("s-busy".to_string()),
            status: Some(StatusValue::new("s-on", "10-8", ShouldDo::SetOnDuty, Some(0))),
            ..Unit::default()
        };
        let text = unit_summary(UnitKind::Leo, Some(&unit), None, &values());
        assert!(text.contains("Status: 10-6"));
    }

    #[test]
    fn board_marks_disabled_and_danger() {
        let text = status_board(&build_status_board(&values(), None));
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("10-8") && lines[0].contains("on-duty"));
        assert!(lines[1].starts_with('-') && lines[1].contains("10-6"));
        assert!(lines[2].contains("danger") && lines[2].contains("disabled"));
    }

    #[test]
    fn invalid_search_lists_field_errors() {
        let errors = NameSearchRequest::new("").validate().unwrap_err();
        let text = name_search(
            &NameSearchOutcome::Invalid(errors),
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        );
        assert!(text.starts_with("name: "));
    }

    #[test]
    fn blocked_change_explains_next_step() {
        assert!(status_change(&StatusChange::Blocked(StatusBlock::OffDuty)).contains("off duty"));
    }
}
