use std::path::{Path, PathBuf};

use prometheus::proto::MetricFamily;

use nodeprism_core::error::{PrismError, Result};
use nodeprism_core::Collector;

/// File descriptor usage from `<procfs>/sys/fs/file-nr`.
pub struct FilefdCollector {
    path: PathBuf,
}

impl FilefdCollector {
    pub fn new(procfs: &Path) -> Self {
        Self {
            path: procfs.join("sys/fs/file-nr"),
        }
    }
}

/// Returns `(allocated, maximum)`.
pub fn parse_file_nr(data: &str) -> Result<(f64, f64)> {
    let fields: Vec<&str> = data.split_whitespace().collect();
    match fields.as_slice() {
        [allocated, _unused, maximum] => Ok((
            super::parse_f64(allocated, "file-nr")?,
            super::parse_f64(maximum, "file-nr")?,
        )),
        _ => Err(PrismError::Collector(format!(
            "unexpected file-nr content: {data:?}"
        ))),
    }
}

impl Collector for FilefdCollector {
    fn update(&self) -> Result<Vec<MetricFamily>> {
        let (allocated, maximum) = parse_file_nr(&super::read_source(&self.path)?)?;
        let mut out = super::gauge(
            "node_filefd_allocated",
            "File descriptor statistics: allocated.",
            allocated,
        )?;
        out.extend(super::gauge(
            "node_filefd_maximum",
            "File descriptor statistics: maximum.",
            maximum,
        )?);
        Ok(out)
    }
}
