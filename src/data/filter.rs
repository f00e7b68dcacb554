use std::collections::BTreeSet;

use super::model::RecordSet;

// ---------------------------------------------------------------------------
// Class-code filter and per-category cap
// ---------------------------------------------------------------------------

/// Return indices of records whose class code is in `included`, in load
/// order, truncated to the first `cap` matches.
///
/// An empty `included` set selects nothing.
pub fn filtered_indices(
    records: &RecordSet,
    included: &BTreeSet<String>,
    cap: Option<usize>,
) -> Vec<usize> {
    let matches = records
        .class_codes
        .iter()
        .enumerate()
        .filter(|(_, code)| included.contains(code.as_str()))
        .map(|(i, _)| i);

    match cap {
        Some(max) => matches.take(max).collect(),
        None => matches.collect(),
    }
}

/// Apply [`filtered_indices`] and copy out the surviving rows.
pub fn select_records(
    records: &RecordSet,
    included: &BTreeSet<String>,
    cap: Option<usize>,
) -> RecordSet {
    let keep = filtered_indices(records, included, cap);
    if keep.len() == records.len() {
        return records.clone();
    }
    records.select(&keep)
}
