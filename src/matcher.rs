/*!
 * Code-prefix matching across record columns
 *
 * Two matching modes are provided and kept deliberately separate:
 *
 * - [`CodeMatcher`]: any of several columns starts with any of several
 *   prefixes (diagnosis cohort matching).
 * - [`matches_all_prefixes`]: a single column must start with every given
 *   prefix (compound drug-code filters such as class plus formulation).
 */

use crate::data_types::CodedRecord;

/// Matches records whose candidate columns start with any target prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeMatcher {
    prefixes: Vec<String>,
    columns: Vec<String>,
}

impl CodeMatcher {
    /// Create a matcher for the given prefixes over the given columns
    pub fn new<P, C>(prefixes: &[P], columns: &[C]) -> Self
    where
        P: AsRef<str>,
        C: AsRef<str>,
    {
        Self {
            prefixes: prefixes.iter().map(|p| p.as_ref().to_string()).collect(),
            columns: columns.iter().map(|c| c.as_ref().to_string()).collect(),
        }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// True if any present column's text starts with any prefix.
    ///
    /// Columns the record does not carry are skipped.
    pub fn matches<R: CodedRecord + ?Sized>(&self, record: &R) -> bool {
        self.columns.iter().any(|column| {
            record
                .column_text(column)
                .map(|value| self.prefixes.iter().any(|p| value.starts_with(p.as_str())))
                .unwrap_or(false)
        })
    }
}

/// True if `column` is present and starts with every prefix in `prefixes`.
///
/// An empty prefix list imposes no constraint. A missing column never
/// matches a non-empty prefix list.
pub fn matches_all_prefixes<R, P>(record: &R, column: &str, prefixes: &[P]) -> bool
where
    R: CodedRecord + ?Sized,
    P: AsRef<str>,
{
    if prefixes.is_empty() {
        return true;
    }
    match record.column_text(column) {
        Some(value) => prefixes.iter().all(|p| value.starts_with(p.as_ref())),
        None => false,
    }
}
