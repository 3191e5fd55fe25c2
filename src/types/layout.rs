//! Flattened column layout of a point row

use serde::{Deserialize, Serialize};

use super::{FieldKind, ScalarType};
use crate::{RelayError, Result};

/// Upper bound on flattened columns per row
pub const MAX_COLUMNS: usize = 65_536;

/// Ordered, flattened column layout derived from a container's field declarations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldLayout {
    /// Columns in row order
    pub columns: Vec<ColumnSpec>,
    /// Total size of a binary row in bytes
    pub row_width: usize,
}

/// A single scalar column of the layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name (`x`, or `normal_0002` for flattened multi-count fields)
    pub name: String,
    /// Scalar type of every value in the column
    pub scalar_type: ScalarType,
    /// Byte offset of the column within a binary row
    pub offset: usize,
}

impl FieldLayout {
    /// Build a layout from parallel `FIELDS`, `COUNT`, `TYPE` and `SIZE` declarations.
    ///
    /// A field with a count above one is flattened into `count` columns named
    /// `<field>_0000 .. <field>_<count-1>`, keeping declaration order.
    pub fn build(
        fields: &[String],
        counts: &[usize],
        kinds: &[FieldKind],
        sizes: &[usize],
    ) -> Result<Self> {
        let n = fields.len();
        if counts.len() != n || kinds.len() != n || sizes.len() != n {
            return Err(RelayError::malformed_header(format!(
                "field declarations disagree in length: fields={}, count={}, type={}, size={}",
                n,
                counts.len(),
                kinds.len(),
                sizes.len()
            )));
        }

        let total = counts
            .iter()
            .try_fold(0usize, |acc, &count| acc.checked_add(count))
            .filter(|&total| total <= MAX_COLUMNS)
            .ok_or_else(|| {
                RelayError::malformed_header(format!(
                    "field counts exceed {} columns per row",
                    MAX_COLUMNS
                ))
            })?;

        let mut columns = Vec::with_capacity(total);
        let mut offset = 0;

        for (((field, &count), &kind), &size) in fields.iter().zip(counts).zip(kinds).zip(sizes) {
            let scalar_type = ScalarType::from_declaration(kind, size)
                .ok_or_else(|| RelayError::unsupported_field_type(field, kind.token(), size))?;

            if count == 0 {
                return Err(RelayError::malformed_header(format!(
                    "field '{}' has count of 0",
                    field
                )));
            }

            if count == 1 {
                columns.push(ColumnSpec { name: field.clone(), scalar_type, offset });
                offset += scalar_type.size();
            } else {
                for i in 0..count {
                    columns.push(ColumnSpec {
                        name: format!("{}_{:04}", field, i),
                        scalar_type,
                        offset,
                    });
                    offset += scalar_type.size();
                }
            }
        }

        Ok(Self { columns, row_width: offset })
    }

    /// Get the number of flattened columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(layout: &FieldLayout) -> Vec<&str> {
        layout.columns.iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn flattens_multi_count_fields_in_order() {
        let layout = FieldLayout::build(
            &["x".into(), "normal".into(), "label".into()],
            &[1, 3, 1],
            &[FieldKind::Float, FieldKind::Float, FieldKind::Unsigned],
            &[4, 4, 2],
        )
        .unwrap();

        assert_eq!(names(&layout), ["x", "normal_0000", "normal_0001", "normal_0002", "label"]);
        assert_eq!(layout.row_width, 4 + 3 * 4 + 2);
        assert_eq!(layout.columns[4].offset, 16);
        assert_eq!(layout.columns[4].scalar_type, ScalarType::UInt16);
    }

    #[test]
    fn rejects_pairs_outside_the_type_table() {
        let err = FieldLayout::build(&["flag".into()], &[1], &[FieldKind::Signed], &[1])
            .unwrap_err();
        match err {
            RelayError::UnsupportedFieldType { field, kind, size } => {
                assert_eq!(field, "flag");
                assert_eq!(kind, "I");
                assert_eq!(size, 1);
            }
            other => panic!("Expected UnsupportedFieldType, got {:?}", other),
        }
    }

    #[test]
    fn rejects_length_mismatch() {
        let err = FieldLayout::build(
            &["x".into(), "y".into()],
            &[1, 1],
            &[FieldKind::Float],
            &[4, 4],
        )
        .unwrap_err();
        assert!(matches!(err, RelayError::MalformedHeader { .. }));
    }

    #[test]
    fn rejects_counts_that_overflow() {
        let err = FieldLayout::build(
            &["normal".into(), "x".into()],
            &[usize::MAX, 1],
            &[FieldKind::Float, FieldKind::Float],
            &[4, 4],
        )
        .unwrap_err();
        assert!(matches!(err, RelayError::MalformedHeader { .. }));
    }

    #[test]
    fn rejects_oversized_rows() {
        let err = FieldLayout::build(
            &["histogram".into()],
            &[100_000_000_000],
            &[FieldKind::Unsigned],
            &[1],
        )
        .unwrap_err();
        assert!(matches!(err, RelayError::MalformedHeader { .. }));

        let at_limit =
            FieldLayout::build(&["h".into()], &[MAX_COLUMNS], &[FieldKind::Unsigned], &[1])
                .unwrap();
        assert_eq!(at_limit.column_count(), MAX_COLUMNS);
    }

    #[test]
    fn rejects_zero_count() {
        let err = FieldLayout::build(&["x".into()], &[0], &[FieldKind::Float], &[4]).unwrap_err();
        assert!(matches!(err, RelayError::MalformedHeader { .. }));
    }
}
