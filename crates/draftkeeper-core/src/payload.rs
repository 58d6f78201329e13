//! Outgoing request construction
//!
//! Turns a snapshot into the allowlisted [`SaveBody`]. The schedule date is
//! only sent when it differs from the reference date, and minute-precision
//! dates gain a `:00` seconds component.

use crate::types::{PostFields, SaveBody};
use chrono::NaiveDateTime;

const SECONDS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const MINUTES_FORMAT: &str = "%Y-%m-%dT%H:%M";

/// Build the body for `fields`
#[must_use]
pub fn build_body(fields: &PostFields, reference_date: Option<&str>) -> SaveBody {
    let date = match fields.date.as_deref() {
        Some(date) if Some(date) != reference_date => Some(normalize_date(date)),
        _ => None,
    };

    SaveBody {
        title: fields.title.clone(),
        content: fields.content.clone(),
        status: fields.status,
        slug: fields.slug.clone(),
        excerpt: fields.excerpt.clone(),
        categories: fields.categories.clone(),
        tags: fields.tags.clone(),
        featured_media: fields.featured_media,
        lexical_state: fields.lexical_state.clone(),
        date,
    }
}

/// Add a seconds component to minute-precision dates
///
/// Anything that is neither `YYYY-MM-DDTHH:MM` nor `YYYY-MM-DDTHH:MM:SS`
/// passes through unchanged for the store to judge.
#[must_use]
pub fn normalize_date(date: &str) -> String {
    if NaiveDateTime::parse_from_str(date, SECONDS_FORMAT).is_ok() {
        return date.to_string();
    }
    match NaiveDateTime::parse_from_str(date, MINUTES_FORMAT) {
        Ok(parsed) => parsed.format(SECONDS_FORMAT).to_string(),
        Err(_) => date.to_string(),
    }
}
