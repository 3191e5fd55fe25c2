//! Container Header Parsing
//!
//! This module parses the text header that precedes every point-cloud frame body.
//! The header is a sequence of `KEY value...` lines describing the row layout, the
//! body encoding, and optionally the frame's topic, capture time and annotated
//! bounding boxes.
//!
//! # Header Layout
//!
//! ```text
//! # .PCD v0.7 - Point Cloud Data file format
//! VERSION .7
//! FIELDS x y z intensity
//! SIZE 4 4 4 4
//! TYPE F F F F
//! COUNT 1 1 1 1
//! WIDTH 2
//! HEIGHT 1
//! POINTS 2
//! minx maxx miny maxy minz maxz
//! 0.5 1.5 -2.0 2.0 0.0 1.8
//! end
//! DATA ascii
//! TOPIC lidar/front
//! Time 1623780000000000
//! <body>
//! ```
//!
//! # Tolerant Parsing
//!
//! A single bad line never fails the frame: lines that do not look like
//! `key value`, unknown keys, values that fail to parse and malformed bounding-box
//! rows are logged with `warn!` and skipped. Only the absence of the row layout
//! declarations (`FIELDS`, `TYPE`, `SIZE`) or the `DATA` line is fatal.
//!
//! # Body Location
//!
//! Frames published on the messaging backbone end their header with a
//! `Time <micros>` sentinel line, which doubles as the `TIME` declaration. Plain
//! container files end their header at the `DATA` line. Recorded transport frames
//! carry both. See [`Terminator`].

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use crate::types::{BoundingBox, FieldKind, FieldLayout};
use crate::{RelayError, Result};

/// Version assumed when the header carries no `VERSION` line
pub const DEFAULT_VERSION: &str = ".7";

/// Viewpoint assumed when the header carries no `VIEWPOINT` line
pub const DEFAULT_VIEWPOINT: [f64; 7] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0];

/// Microseconds per minute, used to bucket capture times
const MICROS_PER_MINUTE: i64 = 60_000_000;

/// Body encoding selected by the `DATA` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoding {
    Ascii,
    Binary,
    BinaryCompressed,
}

impl Encoding {
    /// Parse a lowercased `DATA` value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ascii" => Some(Encoding::Ascii),
            "binary" => Some(Encoding::Binary),
            "binary_compressed" => Some(Encoding::BinaryCompressed),
            _ => None,
        }
    }
}

/// Line that ends the header and introduces the body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terminator {
    /// Header ends at the first line starting with `Time` (messaging transport)
    #[default]
    TimeSentinel,
    /// Header ends at the `DATA` line (plain container files)
    Data,
    /// Header ends at `DATA`; lines up to and including the next `Time` line are
    /// skipped (recorded transport frames)
    DataThenTime,
}

fn is_time_line(line: &str) -> bool {
    line == "Time" || line.starts_with("Time ") || line.starts_with("Time\t")
}

fn is_data_line(line: &str) -> bool {
    line.starts_with("DATA")
}

/// Metadata of one container frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerMetadata {
    pub version: String,
    pub fields: Vec<String>,
    pub count: Vec<usize>,
    pub types: Vec<FieldKind>,
    pub size: Vec<usize>,
    pub width: usize,
    pub height: usize,
    pub points: usize,
    pub viewpoint: [f64; 7],
    pub encoding: Encoding,
    /// Topic declared by the frame itself, if any
    pub topic: Option<String>,
    /// Capture time in microseconds
    pub time_raw: i64,
    pub objects: Vec<BoundingBox>,
}

impl ContainerMetadata {
    /// Build the flattened column layout for this frame.
    pub fn layout(&self) -> Result<FieldLayout> {
        FieldLayout::build(&self.fields, &self.count, &self.types, &self.size)
    }

    /// Capture time bucketed to whole minutes.
    pub fn time_minute(&self) -> i64 {
        self.time_raw.div_euclid(MICROS_PER_MINUTE)
    }
}

/// Recognized header keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Keyword {
    Version,
    Fields,
    Type,
    Size,
    Count,
    Width,
    Height,
    Points,
    Viewpoint,
    Data,
    Topic,
    Time,
    BoxStart,
    End,
}

/// Lowercased keyword lookup table
const KEYWORDS: &[(&str, Keyword)] = &[
    ("version", Keyword::Version),
    ("fields", Keyword::Fields),
    ("type", Keyword::Type),
    ("size", Keyword::Size),
    ("count", Keyword::Count),
    ("width", Keyword::Width),
    ("height", Keyword::Height),
    ("points", Keyword::Points),
    ("viewpoint", Keyword::Viewpoint),
    ("data", Keyword::Data),
    ("topic", Keyword::Topic),
    ("time", Keyword::Time),
    ("minx", Keyword::BoxStart),
    ("end", Keyword::End),
];

impl Keyword {
    fn lookup(key: &str) -> Option<Self> {
        let key = key.to_ascii_lowercase();
        KEYWORDS.iter().find(|(name, _)| *name == key).map(|(_, kw)| *kw)
    }
}

/// Split a line into `key` and `value`, where the key is a word and the value is
/// everything after the separating whitespace.
fn split_key_value(line: &str) -> Option<(&str, &str)> {
    let (key, value) = line.split_once(|c: char| c.is_ascii_whitespace())?;
    let value = value.trim();
    if key.is_empty()
        || value.is_empty()
        || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return None;
    }
    Some((key, value))
}

fn parse_all<T: std::str::FromStr>(value: &str) -> Option<Vec<T>> {
    value.split_ascii_whitespace().map(|token| token.parse().ok()).collect()
}

/// Incremental, tolerant header parser.
///
/// Feed header lines in order with [`HeaderParser::feed_line`], then call
/// [`HeaderParser::finish`] to apply defaults and validate.
#[derive(Debug, Default)]
pub struct HeaderParser {
    capturing_boxes: bool,
    version: Option<String>,
    fields: Option<Vec<String>>,
    types: Option<Vec<String>>,
    size: Option<Vec<usize>>,
    count: Option<Vec<usize>>,
    width: Option<usize>,
    height: Option<usize>,
    points: Option<usize>,
    viewpoint: Option<[f64; 7]>,
    data: Option<String>,
    topic: Option<String>,
    time: Option<String>,
    objects: Vec<BoundingBox>,
}

impl HeaderParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume one header line.
    pub fn feed_line(&mut self, line: &str) {
        let line = line.trim_end();
        if line.starts_with('#') || line.len() < 2 {
            return;
        }

        let first = line.split_ascii_whitespace().next().unwrap_or_default();
        let is_end = first.eq_ignore_ascii_case("end");

        if self.capturing_boxes && !is_end {
            self.capture_box(line);
            return;
        }

        if is_end {
            self.capturing_boxes = false;
            return;
        }

        let Some((key, value)) = split_key_value(line) else {
            warn!(line, "Can't understand header line, skipping");
            return;
        };

        let Some(keyword) = Keyword::lookup(key) else {
            warn!(key, "Unknown header key, skipping");
            return;
        };

        trace!(?keyword, value, "Header line");
        self.apply(keyword, key, value);
    }

    fn capture_box(&mut self, line: &str) {
        let extents: Option<Vec<f64>> = parse_all(line);
        match extents.as_deref() {
            Some(&[minx, maxx, miny, maxy, minz, maxz]) => {
                self.objects.push(BoundingBox::from_extents([minx, maxx, miny, maxy, minz, maxz]));
            }
            _ => warn!(line, "Bounding box line is not six numbers, skipping"),
        }
    }

    fn apply(&mut self, keyword: Keyword, key: &str, value: &str) {
        match keyword {
            Keyword::Version => self.version = Some(value.to_string()),
            Keyword::Fields => {
                self.fields = Some(value.split_ascii_whitespace().map(str::to_string).collect())
            }
            Keyword::Type => {
                self.types = Some(value.split_ascii_whitespace().map(str::to_string).collect())
            }
            Keyword::Size | Keyword::Count => match parse_all::<usize>(value) {
                Some(parsed) if keyword == Keyword::Size => self.size = Some(parsed),
                Some(parsed) => self.count = Some(parsed),
                None => warn!(key, value, "Expected integers, skipping"),
            },
            Keyword::Width | Keyword::Height | Keyword::Points => match value.parse::<usize>() {
                Ok(parsed) => match keyword {
                    Keyword::Width => self.width = Some(parsed),
                    Keyword::Height => self.height = Some(parsed),
                    _ => self.points = Some(parsed),
                },
                Err(_) => warn!(key, value, "Expected an integer, skipping"),
            },
            Keyword::Viewpoint => match parse_all::<f64>(value).as_deref() {
                Some(&[tx, ty, tz, qw, qx, qy, qz]) => {
                    self.viewpoint = Some([tx, ty, tz, qw, qx, qy, qz])
                }
                _ => warn!(value, "Viewpoint is not seven numbers, skipping"),
            },
            Keyword::Data => self.data = Some(value.trim().to_ascii_lowercase()),
            Keyword::Topic => self.topic = Some(value.to_string()),
            Keyword::Time => self.time = Some(value.to_string()),
            Keyword::BoxStart => self.capturing_boxes = true,
            Keyword::End => self.capturing_boxes = false,
        }
    }

    /// Apply defaults and validate the collected declarations.
    pub fn finish(self) -> Result<ContainerMetadata> {
        let fields = self.fields.ok_or_else(|| RelayError::malformed_header("missing FIELDS"))?;
        let type_tokens = self.types.ok_or_else(|| RelayError::malformed_header("missing TYPE"))?;
        let size = self.size.ok_or_else(|| RelayError::malformed_header("missing SIZE"))?;
        let count = self.count.unwrap_or_else(|| vec![1; fields.len()]);

        if type_tokens.len() != fields.len() || size.len() != fields.len() || count.len() != fields.len()
        {
            return Err(RelayError::malformed_header(format!(
                "field declarations disagree in length: fields={}, count={}, type={}, size={}",
                fields.len(),
                count.len(),
                type_tokens.len(),
                size.len()
            )));
        }

        let types = type_tokens
            .iter()
            .zip(&fields)
            .zip(&size)
            .map(|((token, field), &sz)| {
                FieldKind::parse(token)
                    .ok_or_else(|| RelayError::unsupported_field_type(field, token.as_str(), sz))
            })
            .collect::<Result<Vec<_>>>()?;

        let data = self.data.ok_or_else(|| RelayError::malformed_header("missing DATA"))?;
        let encoding = Encoding::parse(&data)
            .ok_or_else(|| RelayError::UnsupportedEncoding { encoding: data.clone() })?;

        let width = self.width.unwrap_or(0);
        let height = self.height.unwrap_or(1);
        let points = match self.points {
            Some(points) => points,
            None => {
                warn!(width, height, "Missing POINTS, using WIDTH * HEIGHT");
                width.saturating_mul(height)
            }
        };

        let time_raw = match self.time.as_deref().map(str::trim) {
            Some(raw) => raw.parse::<i64>().unwrap_or_else(|_| {
                warn!(raw, "Time is not an integer, using 0");
                0
            }),
            None => {
                warn!("Missing Time, using 0");
                0
            }
        };

        let metadata = ContainerMetadata {
            version: self.version.unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            fields,
            count,
            types,
            size,
            width,
            height,
            points,
            viewpoint: self.viewpoint.unwrap_or(DEFAULT_VIEWPOINT),
            encoding,
            topic: self.topic,
            time_raw,
            objects: self.objects,
        };

        debug!(
            fields = metadata.fields.len(),
            points = metadata.points,
            encoding = ?metadata.encoding,
            objects = metadata.objects.len(),
            "Parsed container header"
        );

        Ok(metadata)
    }
}

/// Parse a complete set of header lines.
pub fn parse_header<'a, I>(lines: I) -> Result<ContainerMetadata>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut parser = HeaderParser::new();
    for line in lines {
        parser.feed_line(line);
    }
    parser.finish()
}

/// Parse the header at the start of `payload`.
///
/// Returns the metadata and the byte offset at which the body starts. Header lines
/// are decoded as lossy UTF-8 and body bytes are never interpreted as text here.
pub fn read_header(payload: &[u8], terminator: Terminator) -> Result<(ContainerMetadata, usize)> {
    let mut parser = HeaderParser::new();
    let mut past_data = false;
    let mut pos = 0;

    while pos < payload.len() {
        let rest = &payload[pos..];
        let (line_bytes, next) = match rest.iter().position(|&b| b == b'\n') {
            Some(i) => (&rest[..i], pos + i + 1),
            None => (rest, payload.len()),
        };
        pos = next;

        let line = String::from_utf8_lossy(line_bytes);
        let line = line.trim_end();

        let done = match terminator {
            Terminator::TimeSentinel => {
                parser.feed_line(line);
                is_time_line(line)
            }
            Terminator::Data => {
                parser.feed_line(line);
                is_data_line(line)
            }
            Terminator::DataThenTime if past_data => {
                if !is_time_line(line) {
                    continue;
                }
                parser.feed_line(line);
                true
            }
            Terminator::DataThenTime => {
                parser.feed_line(line);
                past_data = is_data_line(line);
                false
            }
        };

        if done {
            return Ok((parser.finish()?, next));
        }
    }

    Err(RelayError::malformed_header(match terminator {
        Terminator::TimeSentinel => "Time sentinel line not found",
        Terminator::Data => "DATA line not found",
        Terminator::DataThenTime if past_data => "Time line after DATA not found",
        Terminator::DataThenTime => "DATA line not found",
    }))
}
