//! Row decoding for each supported body encoding

use tracing::{debug, trace};

use super::header::{ContainerMetadata, Encoding};
use super::table::PointTable;
use crate::types::FieldLayout;
use crate::{RelayError, Result};

/// Decode `body` into a table with one row per point.
///
/// `body` must start at the first byte after the header terminator line.
pub fn decode_body(
    metadata: &ContainerMetadata,
    layout: &FieldLayout,
    body: &[u8],
) -> Result<PointTable> {
    match metadata.encoding {
        Encoding::Ascii => decode_ascii(layout, metadata.points, body),
        Encoding::Binary => decode_binary(layout, metadata.points, body),
        Encoding::BinaryCompressed => {
            Err(RelayError::NotImplemented { feature: "binary_compressed encoding".to_string() })
        }
    }
}

/// Decode whitespace-delimited rows, one per non-blank line.
///
/// `points` comes from the header, so preallocation is bounded by what `body`
/// could actually hold: every row takes at least one value and a line break.
pub fn decode_ascii(layout: &FieldLayout, points: usize, body: &[u8]) -> Result<PointTable> {
    let text = String::from_utf8_lossy(body);
    let mut table = PointTable::with_layout(layout, points.min(body.len() / 2 + 1));

    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());

    for row in 0..points {
        let line = lines.next().ok_or_else(|| {
            RelayError::row_decode(row, format!("expected {} rows, found {}", points, row))
        })?;

        let tokens: Vec<&str> = line.split_ascii_whitespace().collect();
        if tokens.len() != layout.column_count() {
            return Err(RelayError::row_decode(
                row,
                format!("expected {} values, found {}", layout.column_count(), tokens.len()),
            ));
        }

        let values = layout
            .columns
            .iter()
            .zip(&tokens)
            .map(|(column, token)| {
                column.scalar_type.parse_token(token).ok_or_else(|| {
                    RelayError::row_decode(
                        row,
                        format!(
                            "'{}' is not a valid {:?} for column '{}'",
                            token, column.scalar_type, column.name
                        ),
                    )
                })
            })
            .collect::<Result<Vec<_>>>()?;

        table.push_row(values);
    }

    if lines.next().is_some() {
        debug!(points, "Ignoring ASCII lines past the declared point count");
    }

    Ok(table)
}

/// Decode packed little-endian rows.
///
/// Exactly `points * row_width` bytes are consumed; anything after them is padding.
pub fn decode_binary(layout: &FieldLayout, points: usize, body: &[u8]) -> Result<PointTable> {
    let row_width = layout.row_width;
    let expected = points
        .checked_mul(row_width)
        .ok_or_else(|| RelayError::malformed_header(format!("{} points overflow row size", points)))?;

    if body.len() < expected {
        return Err(RelayError::truncated_payload(expected, body.len()));
    }

    trace!(points, row_width, padding = body.len() - expected, "Decoding binary body");

    let mut table = PointTable::with_layout(layout, points);
    if row_width == 0 {
        return Ok(table);
    }

    for (row, bytes) in body[..expected].chunks_exact(row_width).enumerate() {
        let values = layout
            .columns
            .iter()
            .map(|column| {
                column
                    .scalar_type
                    .read_le(bytes, column.offset)
                    .ok_or_else(|| RelayError::row_decode(row, "column extends past row"))
            })
            .collect::<Result<Vec<_>>>()?;
        table.push_row(values);
    }

    Ok(table)
}
