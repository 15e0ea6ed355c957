//! Session-wide status values ("10-codes"), loaded once per session.

use dispatch_protocol::{ShouldDo, StatusValue};
use std::cmp::Ordering;
use std::sync::Arc;

/// Read-only list of status codes, cheap to clone and share between threads.
#[derive(Debug, Clone, Default)]
pub struct StatusValues {
    codes: Arc<Vec<StatusValue>>,
}

impl StatusValues {
    pub fn new(codes: Vec<StatusValue>) -> Self {
        Self {
            codes: Arc::new(codes),
        }
    }

    pub fn all(&self) -> &[StatusValue] {
        &self.codes
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&StatusValue> {
        self.codes.iter().find(|code| code.id == id)
    }

    /// Looks a code up by id, then by its display label (case-insensitive).
    pub fn lookup(&self, id_or_label: &str) -> Option<&StatusValue> {
        let needle = id_or_label.trim();
        self.find(needle).or_else(|| {
            self.codes
                .iter()
                .find(|code| code.label().eq_ignore_ascii_case(needle))
        })
    }

    pub fn first_with(&self, should_do: &ShouldDo) -> Option<&StatusValue> {
        self.codes.iter().find(|code| &code.should_do == should_do)
    }

    pub fn on_duty_code(&self) -> Option<&StatusValue> {
        self.first_with(&ShouldDo::SetOnDuty)
    }

    /// Every code except the on-duty one, in display order.
    ///
    /// Codes without a position sort after positioned ones; ties keep the
    /// server's order.
    pub fn selectable_codes(&self) -> Vec<&StatusValue> {
        let mut codes: Vec<&StatusValue> = self
            .codes
            .iter()
            .filter(|code| code.should_do != ShouldDo::SetOnDuty)
            .collect();
        codes.sort_by(|a, b| compare_positions(a.position, b.position));
        codes
    }
}

fn compare_positions(a: Option<i64>, b: Option<i64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
