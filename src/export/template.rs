//! Query materialization from a parameterized template.

use crate::error::AppError;
use crate::export::partition::TimeRange;

/// Placeholder for the chunk's inclusive lower bound, in epoch milliseconds.
pub const START_PLACEHOLDER: &str = "{start}";

/// Placeholder for the chunk's exclusive upper bound, in epoch milliseconds.
pub const END_PLACEHOLDER: &str = "{end}";

/// Fills a query template with the bounds of one time range.
///
/// Both bounds are rendered as plain base-10 integers, so arbitrarily large
/// epoch-millisecond values survive without rounding or scientific notation.
///
/// # Errors
///
/// Returns `AppError::Template` if the template does not contain both the
/// `{start}` and `{end}` placeholders. This is a configuration mistake and
/// fatal to the job; the runner never retries it.
pub fn materialize_query(template: &str, range: TimeRange) -> Result<String, AppError> {
    for placeholder in [START_PLACEHOLDER, END_PLACEHOLDER] {
        if !template.contains(placeholder) {
            return Err(AppError::Template(format!(
                "template is missing the {} placeholder",
                placeholder
            )));
        }
    }

    Ok(template
        .replace(START_PLACEHOLDER, &range.start_ms.to_string())
        .replace(END_PLACEHOLDER, &range.end_ms.to_string()))
}
