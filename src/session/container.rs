//! On-disk session container.
//!
//! A session file is a zip archive with a metadata section and a data section:
//!
//! ```text
//! metadata/attributes.json   subject, hand, action, trial id, start/end time
//! data/manifest.json         name, dtype, shape (+ columns) per dataset
//! data/timestamps.bin        N
//! data/emg_raw.bin           N x 8
//! data/emg_filtered.bin      N x 8
//! data/hand_angles.bin       N x J
//! ```
//!
//! Datasets are row-major little-endian f64.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::config::DominantHand;
use crate::emg::EMG_CHANNELS;

pub const FORMAT_VERSION: u32 = 1;
pub const FILE_EXTENSION: &str = "kmz";

const ATTRIBUTES: &str = "metadata/attributes.json";
const MANIFEST: &str = "data/manifest.json";
const DTYPE: &str = "f64le";

pub const TIMESTAMPS: &str = "timestamps";
pub const EMG_RAW: &str = "emg_raw";
pub const EMG_FILTERED: &str = "emg_filtered";
pub const HAND_ANGLES: &str = "hand_angles";

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("session file I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("session archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("session metadata encoding failed: {0}")]
    Metadata(#[from] serde_json::Error),
    #[error("malformed session file: {0}")]
    Malformed(String),
}

/// Attributes of the metadata section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub subject_id: String,
    pub dominant_hand: DominantHand,
    pub action: String,
    pub trial_timestamp: String,
    pub recording_start_time: f64,
    pub recording_end_time: f64,
    pub format_version: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetEntry {
    pub name: String,
    pub dtype: String,
    pub shape: Vec<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
}

impl DatasetEntry {
    fn new(name: &str, shape: Vec<usize>) -> Self {
        Self {
            name: name.to_string(),
            dtype: DTYPE.to_string(),
            shape,
            columns: None,
        }
    }

    fn path(&self) -> String {
        format!("data/{}.bin", self.name)
    }

    fn len(&self) -> usize {
        self.shape.iter().product()
    }
}

/// Fully materialised session: parallel columns, one row per recorded frame.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionFile {
    pub metadata: SessionMetadata,
    pub timestamps: Vec<f64>,
    pub emg_raw: Vec<[f64; EMG_CHANNELS]>,
    pub emg_filtered: Vec<[f64; EMG_CHANNELS]>,
    /// Column names of `hand_angles`, in matrix order.
    pub angle_columns: Vec<String>,
    /// N rows of `angle_columns.len()` values.
    pub hand_angles: Vec<Vec<f64>>,
}

fn deflated() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

fn encode(values: impl IntoIterator<Item = f64>) -> Vec<u8> {
    values.into_iter().flat_map(f64::to_le_bytes).collect()
}

fn decode(bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .map(|chunk| {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            f64::from_le_bytes(word)
        })
        .collect()
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>, ContainerError> {
    let mut entry = archive.by_name(name)?;
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn rows<const W: usize>(values: &[f64]) -> Vec<[f64; W]> {
    values
        .chunks_exact(W)
        .map(|chunk| {
            let mut row = [0.0; W];
            row.copy_from_slice(chunk);
            row
        })
        .collect()
}

impl SessionFile {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    fn check_shape(&self) -> Result<(), ContainerError> {
        let n = self.len();
        let width = self.angle_columns.len();
        if self.emg_raw.len() != n || self.emg_filtered.len() != n || self.hand_angles.len() != n {
            return Err(ContainerError::Malformed(format!(
                "column lengths differ: {} timestamps, {} raw, {} filtered, {} angle rows",
                n,
                self.emg_raw.len(),
                self.emg_filtered.len(),
                self.hand_angles.len()
            )));
        }
        if let Some(row) = self.hand_angles.iter().position(|r| r.len() != width) {
            return Err(ContainerError::Malformed(format!(
                "hand_angles row {} has {} values, expected {}",
                row,
                self.hand_angles[row].len(),
                width
            )));
        }
        Ok(())
    }

    fn manifest(&self) -> Vec<DatasetEntry> {
        let n = self.len();
        let mut angles = DatasetEntry::new(HAND_ANGLES, vec![n, self.angle_columns.len()]);
        angles.columns = Some(self.angle_columns.clone());
        vec![
            DatasetEntry::new(TIMESTAMPS, vec![n]),
            DatasetEntry::new(EMG_RAW, vec![n, EMG_CHANNELS]),
            DatasetEntry::new(EMG_FILTERED, vec![n, EMG_CHANNELS]),
            angles,
        ]
    }

    /// Writes to a temp file next to `path`, then moves it into place, so
    /// readers never see a partial archive. An existing file at `path` is
    /// left alone and the write fails with `AlreadyExists`.
    pub fn write(&self, path: &Path) -> Result<(), ContainerError> {
        self.check_shape()?;
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut zip = ZipWriter::new(tmp.as_file_mut());
            zip.start_file(ATTRIBUTES, deflated())?;
            zip.write_all(&serde_json::to_vec_pretty(&self.metadata)?)?;
            zip.start_file(MANIFEST, deflated())?;
            zip.write_all(&serde_json::to_vec_pretty(&self.manifest())?)?;

            let datasets = [
                (TIMESTAMPS, encode(self.timestamps.iter().copied())),
                (EMG_RAW, encode(self.emg_raw.iter().flatten().copied())),
                (EMG_FILTERED, encode(self.emg_filtered.iter().flatten().copied())),
                (HAND_ANGLES, encode(self.hand_angles.iter().flatten().copied())),
            ];
            for (name, bytes) in datasets {
                zip.start_file(format!("data/{}.bin", name), deflated())?;
                zip.write_all(&bytes)?;
            }
            zip.finish()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist_noclobber(path).map_err(|e| e.error)?;
        Ok(())
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, ContainerError> {
        let mut archive = ZipArchive::new(File::open(path.as_ref())?)?;
        let metadata: SessionMetadata = serde_json::from_slice(&read_entry(&mut archive, ATTRIBUTES)?)?;
        let manifest: Vec<DatasetEntry> = serde_json::from_slice(&read_entry(&mut archive, MANIFEST)?)?;

        let mut load = |name: &str| -> Result<(DatasetEntry, Vec<f64>), ContainerError> {
            let entry = manifest
                .iter()
                .find(|e| e.name == name)
                .cloned()
                .ok_or_else(|| ContainerError::Malformed(format!("dataset {} missing from manifest", name)))?;
            if entry.dtype != DTYPE {
                return Err(ContainerError::Malformed(format!(
                    "dataset {} has dtype {}, expected {}",
                    name, entry.dtype, DTYPE
                )));
            }
            let values = decode(&read_entry(&mut archive, &entry.path())?);
            if values.len() != entry.len() {
                return Err(ContainerError::Malformed(format!(
                    "dataset {} holds {} values, shape {:?} needs {}",
                    name,
                    values.len(),
                    entry.shape,
                    entry.len()
                )));
            }
            Ok((entry, values))
        };

        let (_, timestamps) = load(TIMESTAMPS)?;
        let (_, raw) = load(EMG_RAW)?;
        let (_, filtered) = load(EMG_FILTERED)?;
        let (angles_entry, angles) = load(HAND_ANGLES)?;

        let angle_columns = angles_entry.columns.unwrap_or_default();
        let width = angle_columns.len();
        let hand_angles = if width == 0 {
            vec![Vec::new(); timestamps.len()]
        } else {
            angles.chunks_exact(width).map(<[f64]>::to_vec).collect()
        };

        let file = SessionFile {
            metadata,
            timestamps,
            emg_raw: rows(&raw),
            emg_filtered: rows(&filtered),
            angle_columns,
            hand_angles,
        };
        file.check_shape()?;
        Ok(file)
    }

    /// Column of `hand_angles` named `column`.
    pub fn angle_series(&self, column: &str) -> Option<Vec<f64>> {
        let index = self.angle_columns.iter().position(|c| c == column)?;
        Some(self.hand_angles.iter().map(|row| row[index]).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SessionFile {
        SessionFile {
            metadata: SessionMetadata {
                subject_id: "3".into(),
                dominant_hand: DominantHand::Left,
                action: "pinch".into(),
                trial_timestamp: "1700000000".into(),
                recording_start_time: 1.0,
                recording_end_time: 2.0,
                format_version: FORMAT_VERSION,
            },
            timestamps: vec![1.0, 1.5],
            emg_raw: vec![[1.0; 8], [-2.0; 8]],
            emg_filtered: vec![[0.5; 8], [0.25; 8]],
            angle_columns: vec!["index_pip_flexion".into(), "thumb_mcp_flexion".into()],
            hand_angles: vec![vec![10.0, 0.0], vec![12.5, 3.0]],
        }
    }

    #[test]
    fn reads_back_what_it_wrote() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("3_pinch_1.kmz");
        let file = sample();
        file.write(&path).unwrap();

        let loaded = SessionFile::open(&path).unwrap();
        assert_eq!(loaded, file);
        assert_eq!(loaded.angle_series("index_pip_flexion"), Some(vec![10.0, 12.5]));
        assert_eq!(loaded.angle_series("wrist"), None);
    }

    #[test]
    fn ragged_angle_rows_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.kmz");
        let mut file = sample();
        file.hand_angles[1].pop();
        assert!(matches!(file.write(&path), Err(ContainerError::Malformed(_))));
        assert!(!path.exists());
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            SessionFile::open(dir.path().join("nope.kmz")),
            Err(ContainerError::Io(_))
        ));
    }

    #[test]
    fn never_replaces_an_existing_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("3_pinch_1.kmz");
        let first = sample();
        first.write(&path).unwrap();

        let mut second = sample();
        second.timestamps[0] = 99.0;
        match second.write(&path) {
            Err(ContainerError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::AlreadyExists),
            other => panic!("expected AlreadyExists, got {:?}", other),
        }
        assert_eq!(SessionFile::open(&path).unwrap(), first);
    }
}
