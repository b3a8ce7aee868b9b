use crate::error::DispatchError;
use crate::tasks::deadlines::mapper::AssignmentRecord;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Timelike};

pub const NOTHING_DUE: &str = "**No assignments due soon! **🎉";

const DIVIDER: &str = "─────────────────────────";
const INDENT: &str = "      ";

const CLASS_ICONS: &[(&str, &str)] = &[
    ("CS 380", "💻"),
    ("STAT 201", "💼"),
    ("INFO 103", "📊"),
    ("INFO 310", "➕"),
    ("INFO 212", "🎨"),
    ("MUSC 191", "🎸"),
];
const DEFAULT_CLASS_ICON: &str = "📚";

const TYPE_ICONS: &[(&str, &str)] = &[
    ("Homework", "📝"),
    ("Reflection", "🪞"),
    ("Lab", "🔬"),
    ("Reading", "📖"),
    ("Quiz", "❓"),
    ("Exam", "💯"),
    ("Extra Credit", "💯"),
    ("Project", "📐"),
];
const DEFAULT_TYPE_ICON: &str = "📋";

fn icon_for(table: &[(&str, &'static str)], key: &str, fallback: &'static str) -> &'static str {
    table
        .iter()
        .find(|(label, _)| *label == key)
        .map_or(fallback, |(_, icon)| *icon)
}

fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, DispatchError> {
    // the wall clock in whatever offset the timestamp carries, no conversion
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.naive_local());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M") {
        return Ok(dt);
    }
    if let Some(dt) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
    {
        return Ok(dt);
    }
    Err(DispatchError::malformed(format!("unparsable due date: {raw}")))
}

/// `1/22` for midnight (date-only entries), `1/22 11:59PM` otherwise.
pub fn format_date_display(iso_timestamp: &str) -> Result<String, DispatchError> {
    let dt = parse_timestamp(iso_timestamp)?;
    let (month, day) = (dt.month(), dt.day());
    let (hour, minute) = (dt.hour(), dt.minute());

    if hour == 0 && minute == 0 {
        return Ok(format!("{month}/{day}"));
    }
    let (is_pm, hour12) = dt.hour12();
    let meridiem = if is_pm { "PM" } else { "AM" };
    Ok(format!("{month}/{day} {hour12}:{minute:02}{meridiem}"))
}

pub fn format(assignments: &[AssignmentRecord]) -> Result<String, DispatchError> {
    if assignments.is_empty() {
        return Ok(NOTHING_DUE.to_string());
    }

    let mut message = format!("🚨 **{} ASSIGNMENTS DUE SOON!**\n\n", assignments.len());
    message.push_str(&format!("{DIVIDER}\n📚 **Upcoming Assignments**\n{DIVIDER}\n\n"));

    for a in assignments {
        let class_icon = icon_for(CLASS_ICONS, &a.class_label, DEFAULT_CLASS_ICON);
        let type_icon = icon_for(TYPE_ICONS, &a.assignment_type, DEFAULT_TYPE_ICON);
        let due = format_date_display(&a.due_date)?;

        message.push_str(&format!("{class_icon} **{}: {}**\n", a.class_label, a.name));
        message.push_str(&format!("{INDENT}{type_icon} {}\n", a.assignment_type));
        message.push_str(&format!("{INDENT}📅 {due}\n"));
        if a.has_notes() {
            message.push_str(&format!("{INDENT}📋 {}\n", a.notes));
        }
        message.push('\n');
    }
    message.push_str("\n\n");
    Ok(message)
}
