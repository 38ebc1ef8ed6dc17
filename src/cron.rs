//! Five-field cron expression validation (`minute hour day month weekday`).
//!
//! Each field is `*` or a comma-separated list of items. An item is a value,
//! `*`, or a `start-end` range, optionally followed by `/step`. Values must
//! fall inside the field's bounds.

/// Why an expression was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CronError {
    #[error("invalid cron expression format")]
    Format,

    #[error("invalid cron expression value")]
    Value,
}

struct Field {
    min: u32,
    max: u32,
}

const FIELDS: [Field; 5] = [
    Field { min: 0, max: 59 },
    Field { min: 0, max: 23 },
    Field { min: 1, max: 31 },
    Field { min: 1, max: 12 },
    Field { min: 0, max: 6 },
];

/// Check a cron expression.
pub fn validate(expr: &str) -> Result<(), CronError> {
    let parts: Vec<&str> = expr.split_whitespace().collect();
    if parts.len() != FIELDS.len() {
        return Err(CronError::Format);
    }

    for (part, field) in parts.iter().zip(FIELDS.iter()) {
        if !part
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '-' | '*' | '/' | ','))
        {
            return Err(CronError::Format);
        }
        if *part == "*" {
            continue;
        }
        for item in part.split(',') {
            check_item(item, field)?;
        }
    }
    Ok(())
}

fn check_item(item: &str, field: &Field) -> Result<(), CronError> {
    let mut pieces = item.split('/');
    let base = pieces.next().unwrap_or_default();
    let step = pieces.next();
    if pieces.next().is_some() {
        return Err(CronError::Value);
    }

    if let Some(step) = step {
        match step.parse::<u32>() {
            Ok(n) if n > 0 => {}
            _ => return Err(CronError::Value),
        }
    }

    if base == "*" {
        return Ok(());
    }

    if base.contains('-') {
        let bounds: Vec<&str> = base.split('-').collect();
        if bounds.len() != 2 {
            return Err(CronError::Value);
        }
        let start = value(bounds[0], field)?;
        let end = value(bounds[1], field)?;
        if start > end {
            return Err(CronError::Value);
        }
        return Ok(());
    }

    value(base, field).map(|_| ())
}

fn value(text: &str, field: &Field) -> Result<u32, CronError> {
    match text.parse::<u32>() {
        Ok(n) if (field.min..=field.max).contains(&n) => Ok(n),
        _ => Err(CronError::Value),
    }
}
