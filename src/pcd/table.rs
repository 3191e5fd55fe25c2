//! Decoded point table and its serialized views.
//!
//! [`PointTable`] is the canonical, full-precision result of decoding a frame body.
//! Everything sent to clients is derived from it: either the whole table in a
//! `columns`/`data` split layout, or a lightweight vertex view with coordinates and
//! intensity rounded to two decimals.

use serde::{Deserialize, Serialize};

use crate::types::{FieldLayout, Scalar, ScalarType};
use crate::{RelayError, Result};

/// Name of the packed color column
pub const PACKED_RGB_COLUMN: &str = "rgb";

/// A named, typed table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableColumn {
    pub name: String,
    pub scalar_type: ScalarType,
}

/// Row-major table of decoded points.
#[derive(Debug, Clone, PartialEq)]
pub struct PointTable {
    columns: Vec<TableColumn>,
    values: Vec<Scalar>,
    rows: usize,
}

/// Serialized form handed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableView {
    /// Every column at full precision
    Full,
    /// `x`, `y`, `z` and `intensity` rounded to two decimals
    #[default]
    Vertices,
}

#[derive(Serialize)]
struct SplitTable<'a> {
    columns: Vec<&'a str>,
    data: Vec<&'a [Scalar]>,
}

/// Column-oriented coordinate projection of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexView {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity: Option<Vec<f64>>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl PointTable {
    /// Create an empty table with the columns of `layout`.
    pub fn with_layout(layout: &FieldLayout, capacity_rows: usize) -> Self {
        let columns: Vec<TableColumn> = layout
            .columns
            .iter()
            .map(|c| TableColumn { name: c.name.clone(), scalar_type: c.scalar_type })
            .collect();
        let values = Vec::with_capacity(capacity_rows.saturating_mul(columns.len()));
        Self { columns, values, rows: 0 }
    }

    /// Append a row; the caller guarantees one value per column.
    pub(crate) fn push_row(&mut self, row: impl IntoIterator<Item = Scalar>) {
        let before = self.values.len();
        self.values.extend(row);
        debug_assert_eq!(self.values.len() - before, self.columns.len());
        self.rows += 1;
    }

    pub fn columns(&self) -> &[TableColumn] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Iterate rows in order.
    pub fn rows(&self) -> impl Iterator<Item = &[Scalar]> {
        self.values.chunks_exact(self.columns.len().max(1))
    }

    /// Get a single row.
    pub fn row(&self, index: usize) -> Option<&[Scalar]> {
        let width = self.columns.len();
        self.values.get(index * width..(index + 1) * width)
    }

    /// Values of one column, top to bottom.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = Scalar> + '_> {
        let index = self.column_index(name)?;
        Some(self.rows().map(move |row| row[index]))
    }

    /// Replace a packed `rgb` float column with `red`, `green` and `blue` byte columns.
    ///
    /// The float's bit pattern is read as a signed 32-bit integer and split into its
    /// three low bytes. Tables without an `rgb` column of type f32 are left untouched.
    /// Returns whether the table changed.
    pub fn unpack_rgb(&mut self) -> bool {
        let Some(rgb) = self.column_index(PACKED_RGB_COLUMN) else {
            return false;
        };
        if self.columns[rgb].scalar_type != ScalarType::Float32 {
            return false;
        }

        let width = self.columns.len();
        let mut values = Vec::with_capacity(self.rows * (width + 2));

        for row in self.values.chunks_exact(width) {
            let packed = match row[rgb] {
                Scalar::Float32(v) => v.to_bits() as i32,
                _ => 0,
            };
            values.extend(row[..rgb].iter().chain(&row[rgb + 1..]).copied());
            values.push(Scalar::UInt8(((packed >> 16) & 0xFF) as u8));
            values.push(Scalar::UInt8(((packed >> 8) & 0xFF) as u8));
            values.push(Scalar::UInt8((packed & 0xFF) as u8));
        }

        self.columns.remove(rgb);
        for name in ["red", "green", "blue"] {
            self.columns.push(TableColumn { name: name.to_string(), scalar_type: ScalarType::UInt8 });
        }
        self.values = values;
        true
    }

    /// Project coordinates and intensity, rounded to two decimals.
    pub fn vertex_view(&self) -> Result<VertexView> {
        let project = |name: &str| -> Option<Vec<f64>> {
            Some(self.column(name)?.map(|v| round2(v.as_f64())).collect())
        };
        let require = |name: &str| {
            project(name).ok_or_else(|| RelayError::MissingColumn { column: name.to_string() })
        };

        Ok(VertexView {
            x: require("x")?,
            y: require("y")?,
            z: require("z")?,
            intensity: project("intensity"),
        })
    }

    /// Serialize every column as `{"columns": [...], "data": [[...], ...]}`.
    pub fn to_split_json(&self) -> Result<Vec<u8>> {
        let split = SplitTable {
            columns: self.columns.iter().map(|c| c.name.as_str()).collect(),
            data: self.rows().collect(),
        };
        Ok(serde_json::to_vec(&split)?)
    }

    /// Serialize the requested view as UTF-8 JSON.
    pub fn render(&self, view: TableView) -> Result<Vec<u8>> {
        match view {
            TableView::Full => self.to_split_json(),
            TableView::Vertices => Ok(serde_json::to_vec(&self.vertex_view()?)?),
        }
    }
}
