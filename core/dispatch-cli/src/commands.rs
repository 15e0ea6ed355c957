//! Subcommand bodies. Each builds an engine from the effective config.

use chrono::Local;
use dispatch_core::{
    duty_state, save_client_config, ClientConfig, DispatchEngine, DispatchError, SessionState,
    StatusValues, StorageConfig,
};
use dispatch_protocol::{ErrorInfo, UnitKind};
use std::thread;
use std::time::Duration;

use crate::render;

fn engine(storage: StorageConfig, config: ClientConfig) -> Result<DispatchEngine, DispatchError> {
    DispatchEngine::from_config(storage, config)
}

pub fn status(storage: StorageConfig, config: ClientConfig, json: bool) -> Result<(), DispatchError> {
    let engine = engine(storage, config)?;
    let values = engine.bootstrap();
    let unit = engine.store().active_unit();

    if json {
        let report = serde_json::json!({
            "kind": engine.kind(),
            "activeUnit": unit,
            "duty": engine.duty_state().map(|duty| duty.as_str()),
            "board": engine.status_board(),
        });
        let text = serde_json::to_string_pretty(&report).map_err(|source| DispatchError::Json {
            context: "encoding status report".to_string(),
            source,
        })?;
        println!("{}", text);
        return Ok(());
    }

    println!(
        "{}",
        render::unit_summary(engine.kind(), unit.as_ref(), engine.duty_state(), &values)
    );
    if values.is_empty() {
        println!("No status codes configured.");
    } else {
        print!("{}", render::status_board(&engine.status_board()));
    }
    Ok(())
}

pub fn set_status(
    storage: StorageConfig,
    config: ClientConfig,
    status: &str,
) -> Result<(), DispatchError> {
    let engine = engine(storage, config)?;
    engine.bootstrap();
    let change = engine.set_status(status)?;
    println!("{}", render::status_change(&change));
    Ok(())
}

pub fn on_duty(
    storage: StorageConfig,
    config: ClientConfig,
    unit_id: Option<&str>,
) -> Result<(), DispatchError> {
    let engine = engine(storage, config)?;
    engine.bootstrap();

    let unit_id = match unit_id {
        Some(id) => id.to_string(),
        None => {
            let roster = engine.store().get().roster;
            match roster.as_slice() {
                [only] => only.id.clone(),
                [] => {
                    return Err(DispatchError::InvalidRequest(ErrorInfo::new(
                        "no_units",
                        format!("you have no {} units", engine.kind()),
                    )))
                }
                units => {
                    println!("{}", render::roster(units));
                    return Err(DispatchError::InvalidRequest(ErrorInfo::new(
                        "unit_required",
                        "more than one unit; pass the unit id",
                    )));
                }
            }
        }
    };

    let change = engine.go_on_duty(&unit_id)?;
    println!("{}", render::status_change(&change));
    Ok(())
}

pub fn watch(
    storage: StorageConfig,
    config: ClientConfig,
    duration: Option<u64>,
) -> Result<(), DispatchError> {
    let engine = engine(storage, config)?;
    let values = engine.bootstrap();
    let kind = engine.kind();

    let print_values = values.clone();
    let _subscription = engine.store().subscribe(move |state| {
        println!("{}", live_summary(kind, state, &print_values));
    });
    let _listener = engine.watch()?;
    let Some(_push) = engine.start_push()? else {
        return Err(DispatchError::InvalidConfig {
            field: "push_addr",
            details: "watch needs a push channel address".to_string(),
        });
    };

    println!(
        "{}",
        render::unit_summary(
            kind,
            engine.store().active_unit().as_ref(),
            engine.duty_state(),
            &values
        )
    );
    tracing::info!(kind = %kind, "Watching for status updates");

    match duration {
        Some(secs) => thread::sleep(Duration::from_secs(secs)),
        None => loop {
            thread::park();
        },
    }
    Ok(())
}

/// One line block per store change while watching.
fn live_summary(kind: UnitKind, state: &SessionState, values: &StatusValues) -> String {
    let unit = state.active_unit.as_ref();
    render::unit_summary(kind, unit, duty_state(unit, values), values)
}

pub fn search_name(
    storage: StorageConfig,
    config: ClientConfig,
    name: &str,
) -> Result<(), DispatchError> {
    let engine = engine(storage, config)?;
    let outcome = engine.search_name(name)?;
    println!("{}", render::name_search(&outcome, Local::now().date_naive()));
    Ok(())
}

pub fn citizens(storage: StorageConfig, config: ClientConfig) -> Result<(), DispatchError> {
    let engine = engine(storage, config)?;
    println!("{}", render::citizens(&engine.citizens()?));
    Ok(())
}

pub fn show_config(config: &ClientConfig) -> Result<(), DispatchError> {
    let text = toml::to_string_pretty(config).map_err(|err| DispatchError::InvalidConfig {
        field: "client.toml",
        details: err.to_string(),
    })?;
    print!("{}", text);
    Ok(())
}

/// Writes a default client.toml unless one exists (or `force`).
pub fn init_config(storage: &StorageConfig, force: bool) -> Result<(), DispatchError> {
    let path = storage.config_file();
    if path.exists() && !force {
        println!("{} already exists (use --force to overwrite)", path.display());
        return Ok(());
    }
    save_client_config(storage, &ClientConfig::default())?;
    println!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dispatch_protocol::{ShouldDo, StatusValue, Unit};
    use fs_err as fs;
    use tempfile::TempDir;

    #[test]
    fn live_summary_shows_duty_state() {
        let values = StatusValues::new(vec![
            StatusValue::new("s-on", "10-8", ShouldDo::SetOnDuty, Some(0)),
            StatusValue::new("s-busy", "10-6", ShouldDo::SetStatus, Some(1)),
        ]);
        let state = SessionState {
            active_unit: Some(Unit {
                id: "u1".to_string(),
                status_id: Some("s-busy".to_string()),
                ..Unit::default()
            }),
            ..SessionState::default()
        };

        let text = live_summary(UnitKind::Leo, &state, &values);
        assert!(text.contains("(on duty (sub-status))"));
        assert_eq!(
            live_summary(UnitKind::Leo, &SessionState::default(), &values),
            "No active officer."
        );
    }

    #[test]
    fn init_config_writes_defaults_once() {
        let temp = TempDir::new().unwrap();
        let storage = StorageConfig::with_root(temp.path().join(".dispatch"));

        init_config(&storage, false).unwrap();
        let written = fs::read_to_string(storage.config_file()).unwrap();
        assert!(written.contains("api_url"));

        fs::write(storage.config_file(), "api_url = \"http://cad.local/v1\"\n").unwrap();
        init_config(&storage, false).unwrap();
        let kept = fs::read_to_string(storage.config_file()).unwrap();
        assert!(kept.contains("cad.local"));

        init_config(&storage, true).unwrap();
        let reset = fs::read_to_string(storage.config_file()).unwrap();
        assert!(!reset.contains("cad.local"));
    }
}
