//! Provenance stamps in the global `history` attribute

use crate::dataset::{AttrValue, DatasetWriter};
use crate::errors::Result;
use chrono::{DateTime, Utc};

pub const HISTORY_ATTRIBUTE: &str = "history";

/// Prepend `message` with the current UTC time to the `history` attribute,
/// newest entry first.
pub fn append_history<D: DatasetWriter + ?Sized>(dataset: &mut D, message: &str) -> Result<()> {
    append_history_at(dataset, message, Utc::now())
}

/// [`append_history`] with an explicit timestamp
pub fn append_history_at<D: DatasetWriter + ?Sized>(
    dataset: &mut D,
    message: &str,
    timestamp: DateTime<Utc>,
) -> Result<()> {
    let line = format!("{}: {message}", timestamp.format("%Y-%m-%dT%H:%M:%SZ"));
    let history = match dataset
        .global_attribute(HISTORY_ATTRIBUTE)
        .as_ref()
        .and_then(AttrValue::as_str)
    {
        Some(previous) if !previous.is_empty() => format!("{line}\n{previous}"),
        _ => line,
    };
    dataset.set_global_attribute(HISTORY_ATTRIBUTE, AttrValue::Str(history))
}
