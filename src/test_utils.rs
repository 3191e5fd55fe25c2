//! Test utilities for building container frames
//!
//! This module provides a small builder that renders point-cloud containers in the
//! transport framing (header, optional bounding-box block, `Time` sentinel, body)
//! or as plain files ending at `DATA`, so tests and benchmarks do not have to
//! hand-assemble header text.

#![cfg(any(test, feature = "benchmark"))]

use std::fmt::Write as _;

/// Builder for container frames.
#[derive(Debug, Clone)]
pub struct PcdBuilder {
    fields: Vec<(String, char, usize, usize)>,
    points: Option<usize>,
    topic: Option<String>,
    time: i64,
    boxes: Vec<[f64; 6]>,
    plain: bool,
}

impl PcdBuilder {
    /// Start a frame with `(name, type letter, size)` fields, each with count 1.
    pub fn new(fields: &[(&str, char, usize)]) -> Self {
        Self {
            fields: fields.iter().map(|&(n, t, s)| (n.to_string(), t, s, 1)).collect(),
            points: None,
            topic: None,
            time: 0,
            boxes: Vec::new(),
            plain: false,
        }
    }

    /// `x y z intensity`, all `F 4`.
    pub fn xyzi() -> Self {
        Self::new(&[("x", 'F', 4), ("y", 'F', 4), ("z", 'F', 4), ("intensity", 'F', 4)])
    }

    /// Add a field with an explicit count.
    pub fn field_with_count(mut self, name: &str, kind: char, size: usize, count: usize) -> Self {
        self.fields.push((name.to_string(), kind, size, count));
        self
    }

    pub fn points(mut self, points: usize) -> Self {
        self.points = Some(points);
        self
    }

    pub fn topic(mut self, topic: &str) -> Self {
        self.topic = Some(topic.to_string());
        self
    }

    /// Capture time in microseconds.
    pub fn time(mut self, micros: i64) -> Self {
        self.time = micros;
        self
    }

    pub fn bbox(mut self, extents: [f64; 6]) -> Self {
        self.boxes.push(extents);
        self
    }

    /// Plain file framing: the header ends at `DATA`, with no `TOPIC` or `Time` lines.
    pub fn plain(mut self) -> Self {
        self.plain = true;
        self
    }

    fn joined<F>(&self, f: F) -> String
    where
        F: Fn(&(String, char, usize, usize)) -> String,
    {
        self.fields.iter().map(f).collect::<Vec<_>>().join(" ")
    }

    fn header(&self, points: usize, data: &str) -> String {
        let mut header = String::from("# .PCD v0.7 - Point Cloud Data file format\nVERSION .7\n");
        let _ = writeln!(header, "FIELDS {}", self.joined(|f| f.0.clone()));
        let _ = writeln!(header, "SIZE {}", self.joined(|f| f.2.to_string()));
        let _ = writeln!(header, "TYPE {}", self.joined(|f| f.1.to_string()));
        let _ = writeln!(header, "COUNT {}", self.joined(|f| f.3.to_string()));
        let _ = writeln!(header, "WIDTH {}\nHEIGHT 1\nVIEWPOINT 0 0 0 1 0 0 0", points);
        let _ = writeln!(header, "POINTS {}", points);

        if !self.boxes.is_empty() {
            header.push_str("minx maxx miny maxy minz maxz\n");
            for b in &self.boxes {
                let line: Vec<String> = b.iter().map(|v| v.to_string()).collect();
                let _ = writeln!(header, "{}", line.join(" "));
            }
            header.push_str("end\n");
        }

        let _ = writeln!(header, "DATA {}", data);
        if self.plain {
            return header;
        }
        if let Some(topic) = &self.topic {
            let _ = writeln!(header, "TOPIC {}", topic);
        }
        let _ = writeln!(header, "Time {}", self.time);
        header
    }

    /// Render an ASCII frame; `POINTS` defaults to the number of rows.
    pub fn ascii(&self, rows: &[&str]) -> Vec<u8> {
        let mut frame = self.header(self.points.unwrap_or(rows.len()), "ascii");
        for row in rows {
            frame.push_str(row);
            frame.push('\n');
        }
        frame.into_bytes()
    }

    /// Render a binary frame; `POINTS` defaults to 1.
    pub fn binary(&self, body: &[u8]) -> Vec<u8> {
        let mut frame = self.header(self.points.unwrap_or(1), "binary").into_bytes();
        frame.extend_from_slice(body);
        frame
    }

    /// Render a frame with an arbitrary `DATA` value and body.
    pub fn with_data(&self, data: &str, body: &[u8]) -> Vec<u8> {
        let mut frame = self.header(self.points.unwrap_or(1), data).into_bytes();
        frame.extend_from_slice(body);
        frame
    }
}

/// Little-endian bytes for rows of `f32` values.
pub fn f32_rows(rows: &[&[f32]]) -> Vec<u8> {
    rows.iter().flat_map(|row| row.iter()).flat_map(|v| v.to_le_bytes()).collect()
}
