//! Frequency counting and cross-tabulation.
//!
//! Every function here is a pure fold over the input records: it
//! allocates a fresh table per call and never mutates its input.

use crate::errors::{AggregateError, AggregateResult, ValueShape};
use crate::models::{CrossTable, FieldSource, FieldValue, FrequencyTable};

/// Delimiter used to join composite keys unless configured otherwise.
pub const DEFAULT_DELIMITER: &str = " - ";

/// Count occurrences of each value in a sequence.
pub fn count<I, S>(values: I) -> FrequencyTable
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .fold(FrequencyTable::new(), |mut table, value| {
            table.increment(value.as_ref());
            table
        })
}

/// Read a field that must be present.
fn require<'r, R: FieldSource>(
    record: &'r R,
    field: &str,
    record_index: usize,
) -> AggregateResult<FieldValue<'r>> {
    record
        .field(field)
        .ok_or_else(|| AggregateError::MissingField {
            field: field.to_string(),
            record_index,
        })
}

/// Read a field that must be present and scalar.
fn require_scalar<'r, R: FieldSource>(
    record: &'r R,
    field: &str,
    record_index: usize,
) -> AggregateResult<&'r str> {
    match require(record, field, record_index)? {
        FieldValue::Scalar(value) => Ok(value),
        other => Err(AggregateError::TypeMismatch {
            field: field.to_string(),
            record_index,
            expected: ValueShape::Scalar,
            found: other.shape(),
        }),
    }
}

/// Flat frequency table of one scalar field.
///
/// Fails on the first record missing the field or holding a multi-valued
/// answer for it.
pub fn tabulate_field<R: FieldSource>(records: &[R], field: &str) -> AggregateResult<FrequencyTable> {
    let mut table = FrequencyTable::new();

    for (index, record) in records.iter().enumerate() {
        table.increment(require_scalar(record, field, index)?);
    }

    Ok(table)
}

/// Add every contribution of `measured` to `table`.
fn tally(table: &mut FrequencyTable, measured: FieldValue<'_>) {
    match measured {
        FieldValue::Scalar(value) => table.increment(value),
        FieldValue::Multi(values) => {
            // No dedup: a value repeated within one answer counts each time.
            for value in values {
                table.increment(value);
            }
        }
    }
}

/// Two-level table: scalar group value -> counts of the measured field.
///
/// The measured field may be scalar or multi-valued. A record whose
/// multi-valued answer is empty still creates its group.
pub fn cross_tabulate<R: FieldSource>(
    records: &[R],
    group_field: &str,
    measured_field: &str,
) -> AggregateResult<CrossTable> {
    let mut cross = CrossTable::new();

    for (index, record) in records.iter().enumerate() {
        let group = require_scalar(record, group_field, index)?;
        let measured = require(record, measured_field, index)?;
        tally(cross.group_mut(group), measured);
    }

    Ok(cross)
}

/// Like [`cross_tabulate`], but a multi-valued group field fans out: each
/// element becomes a group receiving all of the record's measured values.
///
/// A scalar group field behaves exactly as in [`cross_tabulate`]. A record
/// with an empty multi-valued group contributes nothing.
pub fn cross_tabulate_each_group<R: FieldSource>(
    records: &[R],
    group_field: &str,
    measured_field: &str,
) -> AggregateResult<CrossTable> {
    let mut cross = CrossTable::new();

    for (index, record) in records.iter().enumerate() {
        let groups = require(record, group_field, index)?;
        let measured = require(record, measured_field, index)?;

        match groups {
            FieldValue::Scalar(group) => tally(cross.group_mut(group), measured),
            FieldValue::Multi(groups) => {
                for group in groups {
                    tally(cross.group_mut(group), measured);
                }
            }
        }
    }

    Ok(cross)
}

/// Flat table keyed by `"{a}{delimiter}{b}"`.
///
/// Values containing the delimiter are rejected so that every key splits
/// back into exactly one pair. An empty delimiter is rejected outright.
pub fn tabulate_composite<R: FieldSource>(
    records: &[R],
    field_a: &str,
    field_b: &str,
    delimiter: &str,
) -> AggregateResult<FrequencyTable> {
    if delimiter.is_empty() {
        return Err(AggregateError::EmptyDelimiter);
    }

    let mut table = FrequencyTable::new();

    for (index, record) in records.iter().enumerate() {
        let a = require_scalar(record, field_a, index)?;
        let b = require_scalar(record, field_b, index)?;

        for (field, value) in [(field_a, a), (field_b, b)] {
            if value.contains(delimiter) {
                return Err(AggregateError::DelimiterCollision {
                    field: field.to_string(),
                    value: value.to_string(),
                    delimiter: delimiter.to_string(),
                });
            }
        }

        table.increment(&format!("{}{}{}", a, delimiter, b));
    }

    Ok(table)
}
