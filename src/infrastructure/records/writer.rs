//! Atomic record file writer

use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use bytes::BytesMut;
use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use super::format::{
    check_feature_width, encode_header, encode_record, RecordError, RecordHeader,
};
use crate::domain::retrain::{FormattedDataset, RecordWriter, RetrainError};

/// Writes record files via a temp file in the target directory, then renames
/// it over the target so readers never observe a partial file.
#[derive(Debug, Default, Clone)]
pub struct RecordFileWriter;

impl RecordFileWriter {
    pub fn new() -> Self {
        Self
    }

    pub fn write_file(&self, dataset: &FormattedDataset, path: &Path) -> Result<(), RecordError> {
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let width = dataset.feature_width();
        check_feature_width(width as u64)?;
        fs::create_dir_all(parent)?;

        let temp = NamedTempFile::new_in(parent)?;

        {
            let mut out = BufWriter::new(temp.as_file());
            let mut buf = BytesMut::with_capacity(64 * 1024);

            encode_header(
                &RecordHeader {
                    feature_width: width as u32,
                    count: dataset.len() as u64,
                },
                &mut buf,
            );

            for example in dataset.examples() {
                encode_record(example, width, &mut buf)?;
                if buf.len() >= 64 * 1024 {
                    out.write_all(&buf)?;
                    buf.clear();
                }
            }

            out.write_all(&buf)?;
            out.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| RecordError::Io(e.error))?;

        debug!(path = %path.display(), examples = dataset.len(), "Record file written");
        Ok(())
    }
}

impl RecordWriter for RecordFileWriter {
    #[instrument(skip_all, fields(path = %path.display(), examples = dataset.len()))]
    fn write(&self, dataset: &FormattedDataset, path: &Path) -> Result<(), RetrainError> {
        self.write_file(dataset, path)
            .map_err(|e| RetrainError::serialization(format!("{}: {}", path.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::retrain::Example;

    fn dataset() -> FormattedDataset {
        FormattedDataset::new(
            vec!["a".to_string(), "b".to_string()],
            vec![
                Example::new(vec![1.0, 2.0], 3.0),
                Example::new(vec![4.0, 5.0], 6.0),
            ],
        )
    }

    #[test]
    fn test_write_creates_parent_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("data.rtrc");

        RecordFileWriter::new().write(&dataset(), &path).unwrap();

        assert!(path.exists());
        let entries: Vec<_> = fs::read_dir(path.parent().unwrap()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_failed_write_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.rtrc");

        RecordFileWriter::new().write(&dataset(), &path).unwrap();
        let before = fs::read(&path).unwrap();

        let bad = FormattedDataset::new(
            vec!["a".to_string(), "b".to_string()],
            vec![Example::new(vec![1.0], 3.0)],
        );
        let err = RecordFileWriter::new().write(&bad, &path).unwrap_err();

        assert!(matches!(err, RetrainError::Serialization(_)));
        assert_eq!(fs::read(&path).unwrap(), before);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_overwrites_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.rtrc");
        let writer = RecordFileWriter::new();

        writer.write(&dataset(), &path).unwrap();
        let first_len = fs::metadata(&path).unwrap().len();

        writer
            .write(&FormattedDataset::new(vec!["a".to_string(), "b".to_string()], vec![]), &path)
            .unwrap();
        assert!(fs::metadata(&path).unwrap().len() < first_len);
    }
}
