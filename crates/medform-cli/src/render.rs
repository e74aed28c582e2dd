//! Plain-text rendering of snapshots for the terminal.

use std::fmt::Write;

use medform_core::FieldValue;
use medform_session::{FieldSnapshot, FormSnapshot, GroupSnapshot};

pub fn value_text(value: &FieldValue) -> String {
    match value {
        FieldValue::Empty => String::new(),
        FieldValue::Text(s) | FieldValue::Code(s) | FieldValue::Reference(s) => s.clone(),
        FieldValue::Decimal(d) => d.to_string(),
        FieldValue::Boolean(true) => "yes".to_string(),
        FieldValue::Boolean(false) => "no".to_string(),
        FieldValue::Date(d) => d.to_string(),
        FieldValue::Range(r) => format!(
            "{}..{}",
            r.low.as_ref().map(ToString::to_string).unwrap_or_default(),
            r.high.as_ref().map(ToString::to_string).unwrap_or_default()
        ),
        FieldValue::Quantity(q) => match (&q.value, &q.unit) {
            (Some(v), Some(u)) => format!("{v} {u}"),
            (Some(v), None) => v.to_string(),
            (None, Some(u)) => format!("? {u}"),
            (None, None) => String::new(),
        },
    }
}

fn field_line(out: &mut String, indent: &str, field: &FieldSnapshot) {
    if !field.state.visible {
        return;
    }
    let shown = match &field.display {
        Some(label) => label.clone(),
        None => value_text(&field.value),
    };
    let mut flags = Vec::new();
    if field.state.required {
        flags.push("required");
    }
    if field.state.disabled {
        flags.push("disabled");
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    };
    let _ = writeln!(out, "{indent}{} ({}){flags}: {shown}", field.label, field.id);
    if let Some(issue) = &field.issue {
        let _ = writeln!(out, "{indent}  ! {}", issue.message);
    }
}

pub fn form(snapshot: &FormSnapshot) -> String {
    let mut out = format!("{} {}\n", snapshot.form, snapshot.key);
    for field in &snapshot.fields {
        field_line(&mut out, "  ", field);
    }
    out
}

pub fn group(snapshot: &GroupSnapshot) -> String {
    let mut out = format!("{} {}\n", snapshot.form, snapshot.index);
    if snapshot.entries.is_empty() {
        out.push_str("  (no entries)\n");
    }
    for entry in &snapshot.entries {
        let _ = writeln!(out, "  #{} {}", entry.ordinal + 1, entry.id);
        for field in &entry.fields {
            field_line(&mut out, "    ", field);
        }
    }
    out
}
