// SPDX-FileCopyrightText: 2022-2026 Noah Fontes
//
// SPDX-License-Identifier: Apache-2.0

use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

use crate::{
    api::{AttendanceStatus, VerificationResult},
    capture::Notice,
};

const EMPTY: &str = "—";
const MISSING: &str = "N/A";

/// Renders an attendance time as `HH:MM`. Accepts ISO datetimes as well as
/// bare `HH:MM[:SS]` times.
pub(crate) fn format_time(value: Option<&str>) -> String {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return EMPTY.to_owned();
    };

    if let Some((_, time)) = value.split_once('T') {
        return time.chars().take(5).collect();
    }

    let mut parts = value.split(':');
    match (parts.next(), parts.next()) {
        (Some(hours), Some(minutes)) => format!("{hours:0>2}:{minutes:0>2}"),
        _ => value.to_owned(),
    }
}

/// The one-line message shown under the scanner after an attempt ends.
pub(crate) fn notice_message(notice: &Notice) -> String {
    match notice {
        Notice::Duplicate { roll_no, .. } => {
            format!("Attendance already done for Roll No: {roll_no}")
        }
        Notice::Recorded(result) if result.success => format!(
            "Attendance marked for {} ({}) - {} / {}",
            result.name.as_deref().unwrap_or_default(),
            result.roll_no,
            result.class_group.as_deref().unwrap_or_default(),
            result.batch.as_deref().unwrap_or_default(),
        ),
        Notice::Recorded(result) => match result.message.as_deref() {
            Some(message) => format!("Attendance not marked for Roll No: {} ({message})", result.roll_no),
            None => format!("Attendance not marked for Roll No: {}", result.roll_no),
        },
    }
}

#[derive(Tabled)]
struct Row {
    #[tabled(rename = "Field")]
    field: &'static str,
    #[tabled(rename = "Value")]
    value: String,
}

impl Row {
    fn new(field: &'static str, value: Option<&str>) -> Self {
        Self {
            field,
            value: value.filter(|v| !v.is_empty()).unwrap_or(MISSING).to_owned(),
        }
    }
}

fn render(rows: Vec<Row>) -> String {
    Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::first()).with(Alignment::right()))
        .to_string()
}

fn result_rows(result: &VerificationResult, status: &str) -> Vec<Row> {
    vec![
        Row::new("Name", result.name.as_deref()),
        Row::new("Roll No", Some(&result.roll_no)),
        Row::new("Class", result.class_group.as_deref()),
        Row::new("Batch", result.batch.as_deref()),
        Row::new("Department", result.department.as_deref()),
        Row::new("Time", Some(&format_time(result.time.as_deref()))),
        Row::new("Status", Some(status)),
    ]
}

/// The "Last Attendance" panel shown while waiting for the next scan.
pub(crate) fn last_attendance(notice: &Notice) -> String {
    let rows = match notice {
        Notice::Recorded(result) => {
            result_rows(result, if result.success { "✓ Marked" } else { "✗ Failed" })
        }
        Notice::Duplicate { roll_no, name } => vec![
            Row::new("Name", name.as_deref()),
            Row::new("Roll No", Some(roll_no)),
            Row::new("Status", Some("Already marked today")),
        ],
    };
    render(rows)
}

pub(crate) fn verification(result: &VerificationResult) -> String {
    let status = if result.success {
        "✓ Verified"
    } else if result.error {
        "✗ Error"
    } else {
        "✗ Not verified"
    };

    let mut rows = result_rows(result, status);
    if let Some(message) = result.message.as_deref() {
        rows.push(Row::new("Message", Some(message)));
    }
    render(rows)
}

pub(crate) fn attendance_status(roll_no: &str, status: &AttendanceStatus) -> String {
    render(vec![
        Row::new("Name", status.name.as_deref()),
        Row::new("Roll No", Some(status.roll_no.as_deref().unwrap_or(roll_no))),
        Row::new("Class", status.class_group.as_deref()),
        Row::new("Batch", status.batch.as_deref()),
        Row::new("Department", status.department.as_deref()),
        Row::new("Time", Some(&format_time(status.time.as_deref()))),
        Row::new(
            "Marked Today",
            Some(if status.already_marked { "Yes" } else { "No" }),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn times_are_shown_as_hours_and_minutes() {
        assert_eq!(format_time(Some("2026-01-26T09:15:30")), "09:15");
        assert_eq!(format_time(Some("9:5:30")), "09:05");
        assert_eq!(format_time(Some("14:02")), "14:02");
        assert_eq!(format_time(Some("noon")), "noon");
    }

    #[test]
    fn missing_time_is_a_dash() {
        assert_eq!(format_time(None), "—");
        assert_eq!(format_time(Some("")), "—");
    }

    fn asha() -> VerificationResult {
        VerificationResult {
            success: true,
            roll_no: "S100".to_owned(),
            name: Some("Asha".to_owned()),
            class_group: Some("BCA".to_owned()),
            batch: Some("2023".to_owned()),
            time: Some("2026-01-26T09:15:30".to_owned()),
            ..VerificationResult::default()
        }
    }

    #[test]
    fn recorded_notice_names_student() {
        assert_eq!(
            notice_message(&Notice::Recorded(asha())),
            "Attendance marked for Asha (S100) - BCA / 2023"
        );
    }

    #[test]
    fn duplicate_notice_names_roll_number() {
        let notice = Notice::Duplicate {
            roll_no: "S101".to_owned(),
            name: None,
        };
        assert_eq!(notice_message(&notice), "Attendance already done for Roll No: S101");
    }

    #[test]
    fn failed_notice_carries_message() {
        let notice = Notice::Recorded(VerificationResult::failed("S102", "Face not matched"));
        assert_eq!(
            notice_message(&notice),
            "Attendance not marked for Roll No: S102 (Face not matched)"
        );
    }

    #[test]
    fn last_attendance_fills_gaps() {
        let table = last_attendance(&Notice::Recorded(asha()));
        assert!(table.contains("Asha"));
        assert!(table.contains("09:15"));
        assert!(table.contains("✓ Marked"));
        // No department was reported.
        assert!(table.contains("N/A"));
    }
}
