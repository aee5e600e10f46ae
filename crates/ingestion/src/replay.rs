//! Replay source
//!
//! Reads a text capture of decoded samples, one per line:
//!
//! ```text
//! # nickname value value ...
//! HG 45.5 1 0
//! WW 51.0
//! ```
//!
//! Blank lines and `#` comments are ignored; malformed lines are logged and
//! skipped.

use std::path::{Path, PathBuf};
use std::time::Duration;

use contracts::{Sample, SampleSource, Scalar};
use metrics::counter;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tracing::{debug, error, warn};

use crate::error::{IngestionError, Result};

/// Decode one capture line
///
/// Returns `Ok(None)` for blank and comment lines.
pub fn parse_line(line_no: usize, line: &str) -> Result<Option<Sample>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut tokens = line.split_whitespace();
    let name = tokens.next().ok_or_else(|| IngestionError::ParseFailed {
        line: line_no,
        message: "missing nickname".to_string(),
    })?;

    let values: Vec<Scalar> = tokens.map(Scalar::parse_token).collect();
    if values.is_empty() {
        return Err(IngestionError::ParseFailed {
            line: line_no,
            message: format!("no values for '{name}'"),
        });
    }

    Ok(Some(Sample::new(name, values)))
}

/// Sample source replaying a capture file
pub struct ReplaySource {
    name: String,
    path: PathBuf,
    lines: Lines<BufReader<File>>,
    line_no: usize,
    emitted: u64,
    interval: Duration,
}

impl ReplaySource {
    /// Open a capture file
    ///
    /// `interval` is slept before every sample after the first, to mimic the
    /// pace of a live acquisition channel.
    pub async fn open(path: &Path, interval: Duration) -> Result<Self> {
        let file = File::open(path)
            .await
            .map_err(|source| IngestionError::OpenFailed {
                path: path.to_path_buf(),
                source,
            })?;

        debug!(path = %path.display(), "Replay capture opened");

        Ok(Self {
            name: format!("replay:{}", path.display()),
            path: path.to_path_buf(),
            lines: BufReader::new(file).lines(),
            line_no: 0,
            emitted: 0,
            interval,
        })
    }
}

impl SampleSource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn next_sample(&mut self) -> Option<Sample> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => {
                    debug!(path = %self.path.display(), lines = self.line_no, "Replay exhausted");
                    return None;
                }
                Err(e) => {
                    error!(path = %self.path.display(), error = %e, "Replay read failed");
                    return None;
                }
            };
            self.line_no += 1;

            match parse_line(self.line_no, &line) {
                Ok(Some(sample)) => {
                    if !self.interval.is_zero() && self.emitted > 0 {
                        tokio::time::sleep(self.interval).await;
                    }
                    self.emitted += 1;
                    return Some(sample);
                }
                Ok(None) => continue,
                Err(e) => {
                    counter!("ht_collector_source_lines_skipped_total").increment(1);
                    warn!(path = %self.path.display(), error = %e, "Skipping malformed line");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_line() {
        let sample = parse_line(1, "HG 45.5 1 on").unwrap().unwrap();
        assert_eq!(sample.name, "HG");
        assert_eq!(
            sample.values,
            vec![Scalar::Real(45.5), Scalar::Int(1), Scalar::Text("on".into())]
        );

        assert!(parse_line(2, "   ").unwrap().is_none());
        assert!(parse_line(3, "# comment").unwrap().is_none());
        assert!(matches!(
            parse_line(4, "HG"),
            Err(IngestionError::ParseFailed { line: 4, .. })
        ));
    }

    #[tokio::test]
    async fn test_replay_skips_bad_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# capture").unwrap();
        writeln!(file, "HG 40.0 1").unwrap();
        writeln!(file, "WW").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "WW 51").unwrap();
        file.flush().unwrap();

        let mut source = ReplaySource::open(file.path(), Duration::ZERO)
            .await
            .unwrap();

        let first = source.next_sample().await.unwrap();
        assert_eq!(first.name, "HG");
        let second = source.next_sample().await.unwrap();
        assert_eq!(second, Sample::scalar("WW", 51));
        assert!(source.next_sample().await.is_none());
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let result = ReplaySource::open(Path::new("/nonexistent/capture.txt"), Duration::ZERO).await;
        assert!(matches!(result, Err(IngestionError::OpenFailed { .. })));
    }
}
