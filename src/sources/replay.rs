//! Replay source for container files on disk

use std::path::{Path, PathBuf};
use tokio::time::{Duration, Interval, MissedTickBehavior, interval};
use tracing::{debug, info, trace};

use crate::source::FrameSource;
use crate::types::RawFrame;
use crate::{RelayError, Result};

/// File extension picked up by [`ReplaySource::from_dir`]
pub const CONTAINER_EXTENSION: &str = "pcd";

/// Replays container files onto a single topic at a fixed rate.
///
/// Files are read lazily, one per frame, and published as stored. Set the relay's
/// [`Terminator`](crate::pcd::Terminator) to match how they were written: frames
/// captured off the transport keep their `Time` line and decode with the default
/// `TimeSentinel`, while plain point-cloud files end at `DATA` and need
/// `Terminator::Data`.
pub struct ReplaySource {
    /// Files in playback order
    files: Vec<PathBuf>,

    /// Topic every frame is published on
    topic: String,

    /// Frame pacing interval
    interval: Interval,

    /// Frames per second
    rate_hz: f64,

    /// Index of the next file
    position: usize,

    /// Restart from the first file when exhausted
    looping: bool,
}

impl ReplaySource {
    /// Replay `files` in order on `topic` at `rate_hz` frames per second.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(files: Vec<PathBuf>, topic: impl Into<String>, rate_hz: f64) -> Result<Self> {
        if !(rate_hz.is_finite() && rate_hz > 0.0) {
            return Err(RelayError::config(format!("replay rate must be positive, got {rate_hz}")));
        }

        let topic = topic.into();
        info!(files = files.len(), %topic, rate_hz, "Opened replay source");

        Ok(Self {
            files,
            topic,
            interval: pacing(rate_hz),
            rate_hz,
            position: 0,
            looping: false,
        })
    }

    /// Replay every `*.pcd` file in `dir`, sorted by file name.
    pub fn from_dir<P: AsRef<Path>>(
        dir: P,
        topic: impl Into<String>,
        rate_hz: f64,
    ) -> Result<Self> {
        let dir = dir.as_ref();
        let entries =
            std::fs::read_dir(dir).map_err(|e| RelayError::file_error(dir.to_path_buf(), e))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| RelayError::file_error(dir.to_path_buf(), e))?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == CONTAINER_EXTENSION) {
                files.push(path);
            }
        }
        files.sort();

        debug!(dir = %dir.display(), files = files.len(), "Scanned replay directory");
        Self::new(files, topic, rate_hz)
    }

    /// Restart from the first file instead of ending.
    pub fn looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }

    pub fn rate_hz(&self) -> f64 {
        self.rate_hz
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Index of the next file to be replayed
    pub fn position(&self) -> usize {
        self.position
    }
}

fn pacing(rate_hz: f64) -> Interval {
    let mut interval = interval(Duration::from_secs_f64(1.0 / rate_hz));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

#[async_trait::async_trait]
impl FrameSource for ReplaySource {
    async fn next_frame(&mut self) -> Result<Option<RawFrame>> {
        if self.position >= self.files.len() {
            if !self.looping || self.files.is_empty() {
                debug!("Reached end of replay");
                return Ok(None);
            }
            debug!("Replay wrapped to first file");
            self.position = 0;
        }

        self.interval.tick().await;

        let path = self.files[self.position].clone();
        let read = tokio::fs::read(&path).await;
        self.position += 1;

        let payload = read.map_err(|e| RelayError::file_error(path.clone(), e))?;
        trace!(
            "Replay frame {}/{}: {} ({} bytes)",
            self.position,
            self.files.len(),
            path.display(),
            payload.len()
        );

        Ok(Some(RawFrame::new(self.topic.as_str(), payload)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcd::{Terminator, decode_frame};
    use crate::test_utils::PcdBuilder;

    fn write_frames(dir: &Path, count: usize) {
        for i in 0..count {
            let row = format!("{i} 0 0 1");
            let payload = PcdBuilder::xyzi().ascii(&[row.as_str()]);
            std::fs::write(dir.join(format!("frame_{i:03}.pcd")), payload).unwrap();
        }
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn replays_directory_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 3);

        let mut source = ReplaySource::from_dir(dir.path(), "replay/front", 10.0).unwrap();
        assert_eq!(source.len(), 3);

        let mut xs = Vec::new();
        while let Some(frame) = source.next_frame().await.unwrap() {
            assert_eq!(frame.topic, "replay/front");
            let decoded = decode_frame(&frame, Terminator::TimeSentinel).unwrap();
            xs.push(decoded.table.vertex_view().unwrap().x[0]);
        }

        assert_eq!(xs, [0.0, 1.0, 2.0]);
        assert_eq!(source.position(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn looping_wraps_around() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 2);

        let mut source = ReplaySource::from_dir(dir.path(), "t", 100.0).unwrap().looping(true);
        for _ in 0..5 {
            assert!(source.next_frame().await.unwrap().is_some());
        }
        assert_eq!(source.position(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn frames_are_paced_by_rate() {
        let dir = tempfile::tempdir().unwrap();
        write_frames(dir.path(), 3);

        let mut source = ReplaySource::from_dir(dir.path(), "t", 2.0).unwrap();
        let start = tokio::time::Instant::now();
        while source.next_frame().await.unwrap().is_some() {}

        // First tick is immediate, the next two wait 500ms each
        assert_eq!(start.elapsed(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let mut source =
            ReplaySource::new(vec![PathBuf::from("/no/such/frame.pcd")], "t", 10.0).unwrap();
        let err = source.next_frame().await.unwrap_err();
        assert!(matches!(err, RelayError::File { .. }));
        assert_eq!(source.position(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn plain_files_decode_with_data_terminator() {
        let dir = tempfile::tempdir().unwrap();
        let payload = PcdBuilder::xyzi().plain().ascii(&["7 8 9 1"]);
        std::fs::write(dir.path().join("scan.pcd"), payload).unwrap();

        let mut source = ReplaySource::from_dir(dir.path(), "replay/plain", 10.0).unwrap();
        let frame = source.next_frame().await.unwrap().unwrap();

        let decoded = decode_frame(&frame, Terminator::Data).unwrap();
        assert_eq!(decoded.topic, "replay/plain");
        assert_eq!(decoded.table.vertex_view().unwrap().z, [9.0]);
        assert!(source.next_frame().await.unwrap().is_none());
    }

    #[test]
    fn zero_rate_is_rejected() {
        assert!(ReplaySource::new(Vec::new(), "t", 0.0).is_err());
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(matches!(
            ReplaySource::from_dir("/no/such/dir", "t", 1.0),
            Err(RelayError::File { .. })
        ));
    }
}
