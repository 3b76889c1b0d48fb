use std::cmp::Ordering;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tracing::trace;

use crate::task::{Priority, Task};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Pending,
    Completed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortField {
    #[default]
    CreatedAt,
    UpdatedAt,
    Title,
    Priority,
    DueDate,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

/// Transient view state for the task list. Never persisted; a fresh
/// invocation starts from the defaults (everything, newest first).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    pub search_term: String,
    pub status: StatusFilter,
    pub priority: Option<Priority>,
    pub sort_field: SortField,
    pub sort_direction: SortDirection,
}

impl FilterState {
    /// Parse free-form filter terms from the command line. Recognized
    /// tokens are `status:`, `priority:` and `sort:`; everything else is
    /// collected into the search term.
    #[tracing::instrument(skip(terms))]
    pub fn parse(terms: &[String]) -> anyhow::Result<Self> {
        let mut state = Self::default();
        let mut search_words: Vec<&str> = Vec::new();

        for term in terms {
            if let Some(value) = term.strip_prefix("status:") {
                state.status = match value.to_ascii_lowercase().as_str() {
                    "all" => StatusFilter::All,
                    "pending" => StatusFilter::Pending,
                    "completed" => StatusFilter::Completed,
                    other => return Err(anyhow!("invalid status filter: {other}")),
                };
                continue;
            }

            if let Some(value) = term.strip_prefix("priority:") {
                state.priority = match value.to_ascii_lowercase().as_str() {
                    "all" => None,
                    other => Some(
                        Priority::parse(other)
                            .ok_or_else(|| anyhow!("invalid priority filter: {other}"))?,
                    ),
                };
                continue;
            }

            if let Some(value) = term.strip_prefix("sort:") {
                let (field, direction) = parse_sort_spec(value)?;
                state.sort_field = field;
                state.sort_direction = direction;
                continue;
            }

            search_words.push(term);
        }

        state.search_term = search_words.join(" ");
        Ok(state)
    }
}

fn parse_sort_spec(value: &str) -> anyhow::Result<(SortField, SortDirection)> {
    let lowered = value.to_ascii_lowercase();
    let (name, direction) = if let Some(rest) = lowered.strip_suffix('-') {
        (rest, SortDirection::Desc)
    } else if let Some(rest) = lowered.strip_suffix('+') {
        (rest, SortDirection::Asc)
    } else {
        (lowered.as_str(), SortDirection::Asc)
    };

    let field = match name {
        "created" | "created_at" => SortField::CreatedAt,
        "updated" | "updated_at" => SortField::UpdatedAt,
        "title" => SortField::Title,
        "priority" | "pri" => SortField::Priority,
        "due" | "due_date" => SortField::DueDate,
        other => return Err(anyhow!("invalid sort field: {other}")),
    };

    Ok((field, direction))
}

/// Derive the displayed list from the full collection and the current
/// filter/sort state. Pure and deterministic; ties keep input order.
pub fn project(tasks: &[Task], filters: &FilterState) -> Vec<Task> {
    let needle = filters.search_term.to_lowercase();

    let mut out: Vec<Task> = tasks
        .iter()
        .filter(|task| {
            let ok = matches(task, filters, &needle);
            trace!(id = task.id, ok, "projection predicate");
            ok
        })
        .cloned()
        .collect();

    out.sort_by(|a, b| {
        let ord = compare_by(a, b, filters.sort_field);
        match filters.sort_direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });

    out
}

fn matches(task: &Task, filters: &FilterState, needle: &str) -> bool {
    let matches_search = needle.is_empty()
        || task.title.to_lowercase().contains(needle)
        || task.description.to_lowercase().contains(needle);

    let matches_status = match filters.status {
        StatusFilter::All => true,
        StatusFilter::Pending => !task.completed,
        StatusFilter::Completed => task.completed,
    };

    let matches_priority = filters
        .priority
        .is_none_or(|priority| task.priority == priority);

    matches_search && matches_status && matches_priority
}

fn compare_by(a: &Task, b: &Task, field: SortField) -> Ordering {
    match field {
        SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        SortField::UpdatedAt => a.updated_at.cmp(&b.updated_at),
        SortField::Title => a.title.cmp(&b.title),
        SortField::Priority => a.priority.cmp(&b.priority),
        SortField::DueDate => date_or_epoch(a.due_date).cmp(&date_or_epoch(b.due_date)),
    }
}

// Missing dates sort as the epoch origin, i.e. before any real date.
fn date_or_epoch(date: Option<DateTime<Utc>>) -> DateTime<Utc> {
    date.unwrap_or(DateTime::UNIX_EPOCH)
}
