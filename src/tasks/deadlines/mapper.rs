use crate::error::DispatchError;
use crate::tasks::deadlines::query::{
    RawRecord, SelectProperty, CLASS_PROPERTY, DUE_PROPERTY, TITLE_PROPERTY, TYPE_PROPERTY,
};

pub const UNKNOWN_CLASS: &str = "Unknown";
pub const DEFAULT_TYPE: &str = "Assignment";
pub const NO_NOTES: &str = "No notes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentRecord {
    pub name: String,
    pub class_label: String,
    pub assignment_type: String,
    /// ISO-8601, exactly as the database stored it.
    pub due_date: String,
    pub notes: String,
}

impl AssignmentRecord {
    pub fn has_notes(&self) -> bool {
        self.notes != NO_NOTES
    }
}

fn select_name(property: Option<&SelectProperty>) -> Option<&str> {
    property
        .and_then(|p| p.select.as_ref())
        .map(|option| option.name.as_str())
        .filter(|name| !name.is_empty())
}

fn select_or_default(
    property: Option<&SelectProperty>,
    field: &str,
    fallback: &str,
    assignment: &str,
) -> String {
    match select_name(property) {
        Some(name) => name.to_string(),
        None => {
            tracing::warn!("entry '{assignment}' has empty {field} field");
            fallback.to_string()
        }
    }
}

pub fn map(raw: &RawRecord) -> Result<AssignmentRecord, DispatchError> {
    let props = &raw.properties;

    let name = props
        .assignment
        .as_ref()
        .and_then(|title| title.title.first())
        .map(|segment| segment.plain_text.clone())
        .ok_or_else(|| {
            DispatchError::malformed(format!("page {} has no {TITLE_PROPERTY} title", raw.id))
        })?;

    let class_label =
        select_or_default(props.class.as_ref(), CLASS_PROPERTY, UNKNOWN_CLASS, &name);
    let assignment_type =
        select_or_default(props.kind.as_ref(), TYPE_PROPERTY, DEFAULT_TYPE, &name);

    let due_date = props
        .due_date
        .as_ref()
        .and_then(|d| d.date.as_ref())
        .and_then(|d| d.start.clone())
        .ok_or_else(|| {
            DispatchError::malformed(format!("'{name}' has no {DUE_PROPERTY} start"))
        })?;

    let notes = props
        .notes
        .as_ref()
        .and_then(|n| n.rich_text.first())
        .map(|segment| segment.plain_text.clone())
        .unwrap_or_else(|| NO_NOTES.to_string());

    Ok(AssignmentRecord {
        name,
        class_label,
        assignment_type,
        due_date,
        notes,
    })
}

/// Maps in source order. The first malformed page fails the whole batch.
pub fn map_all(raws: &[RawRecord]) -> Result<Vec<AssignmentRecord>, DispatchError> {
    let assignments = raws.iter().map(map).collect::<Result<Vec<_>, _>>()?;
    tracing::info!("successfully retrieved {} assignments", assignments.len());
    Ok(assignments)
}
