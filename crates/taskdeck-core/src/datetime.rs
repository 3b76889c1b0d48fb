use anyhow::anyhow;
use chrono::{DateTime, Days, NaiveDate, Utc};

/// Parse a user-entered due date: `YYYY-MM-DD`, `today`, `tomorrow`, or
/// `+Nd` relative to today. An empty value means "no due date" (on modify
/// this clears it).
pub fn parse_due_input(raw: &str, now: DateTime<Utc>) -> anyhow::Result<Option<NaiveDate>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let today = now.date_naive();
    match trimmed.to_ascii_lowercase().as_str() {
        "today" => return Ok(Some(today)),
        "tomorrow" => {
            return Ok(Some(
                today
                    .checked_add_days(Days::new(1))
                    .ok_or_else(|| anyhow!("date out of range"))?,
            ));
        }
        _ => {}
    }

    if let Some(rest) = trimmed.strip_prefix('+')
        && let Some(count) = rest.strip_suffix('d')
        && let Ok(days) = count.parse::<u64>()
    {
        return Ok(Some(
            today
                .checked_add_days(Days::new(days))
                .ok_or_else(|| anyhow!("date out of range: +{days}d"))?,
        ));
    }

    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| anyhow!("invalid due date '{trimmed}': expected YYYY-MM-DD, today, tomorrow or +Nd"))
}

pub fn format_date(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d").to_string()
}
