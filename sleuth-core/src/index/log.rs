//! Append-only CBOR record log.
//!
//! Each record is framed as a little-endian `u32` payload length followed by
//! the CBOR payload. A frame is written with a single `write_all` and synced
//! with `fsync` before the caller applies the record in memory, so after a
//! crash the file holds every acknowledged record plus at most one torn
//! trailing frame. The torn frame is cut off on the next open.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::error::{Result, SleuthError};

/// Frame header size in bytes.
const FRAME_HEADER_SIZE: usize = 4;

/// Largest payload a single frame may carry (16 MiB).
pub const MAX_RECORD_SIZE: usize = 16 * 1024 * 1024;

/// Result of decoding a log image.
#[derive(Debug)]
pub struct DecodedLog<T> {
    pub records: Vec<T>,
    /// Byte length of the valid prefix
    pub valid_len: usize,
    /// Whether a partial frame followed the valid prefix
    pub torn_tail: bool,
}

/// Decode every complete frame in `bytes`.
///
/// A trailing partial frame is reported through `torn_tail` rather than as an
/// error. A complete frame whose payload is not valid CBOR for `T`, or whose
/// length exceeds [`MAX_RECORD_SIZE`], is corruption and fails the decode.
pub fn decode_records<T: DeserializeOwned>(bytes: &[u8]) -> Result<DecodedLog<T>> {
    let mut records = Vec::new();
    let mut offset = 0usize;

    loop {
        let remaining = &bytes[offset..];
        if remaining.is_empty() {
            return Ok(DecodedLog {
                records,
                valid_len: offset,
                torn_tail: false,
            });
        }
        if remaining.len() < FRAME_HEADER_SIZE {
            break;
        }

        let mut header = [0u8; FRAME_HEADER_SIZE];
        header.copy_from_slice(&remaining[..FRAME_HEADER_SIZE]);
        let len = u32::from_le_bytes(header) as usize;

        if len > MAX_RECORD_SIZE {
            return Err(SleuthError::SerializationError(format!(
                "record at offset {offset} claims {len} bytes (max {MAX_RECORD_SIZE})"
            )));
        }
        if remaining.len() - FRAME_HEADER_SIZE < len {
            break;
        }

        let payload = &remaining[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + len];
        let record: T = ciborium::from_reader(payload).map_err(|e| {
            SleuthError::SerializationError(format!("corrupt record at offset {offset}: {e}"))
        })?;
        records.push(record);
        offset += FRAME_HEADER_SIZE + len;
    }

    Ok(DecodedLog {
        records,
        valid_len: offset,
        torn_tail: true,
    })
}

/// Encode one record as a length-prefixed frame.
pub fn encode_frame<T: Serialize>(record: &T) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    ciborium::into_writer(record, &mut payload)
        .map_err(|e| SleuthError::SerializationError(format!("CBOR encode failed: {e}")))?;

    if payload.len() > MAX_RECORD_SIZE {
        return Err(SleuthError::SerializationError(format!(
            "record of {} bytes exceeds {MAX_RECORD_SIZE}",
            payload.len()
        )));
    }

    let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Durable append-only log of `T` records.
///
/// An ephemeral log accepts appends without touching disk.
#[derive(Debug)]
pub struct RecordLog<T> {
    file: Option<File>,
    path: Option<PathBuf>,
    len: u64,
    _record: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> RecordLog<T> {
    /// Open (or create) the log at `path` and replay its records.
    pub fn open(path: &Path) -> Result<(Self, Vec<T>)> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                SleuthError::PersistenceFailure(format!(
                    "cannot create data directory {}: {e}",
                    parent.display()
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)
            .map_err(|e| {
                SleuthError::PersistenceFailure(format!("cannot open {}: {e}", path.display()))
            })?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes).map_err(|e| {
            SleuthError::PersistenceFailure(format!("cannot read {}: {e}", path.display()))
        })?;

        let decoded = decode_records::<T>(&bytes)?;
        if decoded.torn_tail {
            warn!(
                path = %path.display(),
                dropped_bytes = bytes.len() - decoded.valid_len,
                "Truncating torn trailing record"
            );
            file.set_len(decoded.valid_len as u64).map_err(|e| {
                SleuthError::PersistenceFailure(format!("cannot truncate {}: {e}", path.display()))
            })?;
            file.sync_data().map_err(|e| {
                SleuthError::PersistenceFailure(format!("cannot sync {}: {e}", path.display()))
            })?;
        }

        info!(
            path = %path.display(),
            records = decoded.records.len(),
            "Record log opened"
        );

        Ok((
            Self {
                file: Some(file),
                path: Some(path.to_path_buf()),
                len: decoded.valid_len as u64,
                _record: PhantomData,
            },
            decoded.records,
        ))
    }

    /// A log that keeps nothing.
    pub fn ephemeral() -> Self {
        Self {
            file: None,
            path: None,
            len: 0,
            _record: PhantomData,
        }
    }

    /// Append a record and flush it to stable storage.
    ///
    /// On failure the file is cut back to its previous length so a partial
    /// frame never precedes later appends.
    pub fn append(&mut self, record: &T) -> Result<()> {
        let frame = encode_frame(record)?;

        let Some(file) = self.file.as_mut() else {
            self.len += frame.len() as u64;
            return Ok(());
        };

        let outcome = file.write_all(&frame).and_then(|()| file.sync_data());
        match outcome {
            Ok(()) => {
                self.len += frame.len() as u64;
                debug!(bytes = frame.len(), total = self.len, "Record appended");
                Ok(())
            }
            Err(e) => {
                if let Err(truncate_err) = file.set_len(self.len) {
                    error!(error = %truncate_err, "Failed to roll back partial record");
                }
                Err(SleuthError::PersistenceFailure(format!(
                    "append to {} failed: {e}",
                    self.display_path()
                )))
            }
        }
    }

    /// Cut the log back to `len` bytes, dropping every frame after it.
    ///
    /// `len` must be a frame boundary previously reported by
    /// [`RecordLog::len_bytes`].
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        if len > self.len {
            return Err(SleuthError::PersistenceFailure(format!(
                "cannot truncate {} to {len} bytes, only {} committed",
                self.display_path(),
                self.len
            )));
        }

        let path = self.display_path();
        if let Some(file) = self.file.as_mut() {
            file.set_len(len)
                .and_then(|()| file.sync_data())
                .map_err(|e| {
                    SleuthError::PersistenceFailure(format!("truncate of {path} failed: {e}"))
                })?;
        }
        debug!(from = self.len, to = len, "Record log truncated");
        self.len = len;
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Bytes of committed frames.
    pub fn len_bytes(&self) -> u64 {
        self.len
    }

    fn display_path(&self) -> String {
        self.path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<memory>".to_string())
    }

    /// Swap the writer for a read-only handle so the next append fails.
    #[cfg(test)]
    pub(crate) fn fail_appends(&mut self) {
        if let Some(path) = &self.path {
            self.file = File::open(path).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Rec {
        id: String,
        values: Vec<f32>,
    }

    fn rec(id: &str) -> Rec {
        Rec {
            id: id.into(),
            values: vec![0.1, -0.7, 1.0 / 3.0],
        }
    }

    #[test]
    fn test_reopen_replays_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.log");

        {
            let (mut log, existing) = RecordLog::<Rec>::open(&path).unwrap();
            assert!(existing.is_empty());
            log.append(&rec("a")).unwrap();
            log.append(&rec("b")).unwrap();
        }

        let (log, records) = RecordLog::<Rec>::open(&path).unwrap();
        assert_eq!(records, vec![rec("a"), rec("b")]);
        assert_eq!(log.len_bytes(), fs::metadata(&path).unwrap().len());
    }

    #[test]
    fn test_f32_roundtrip_is_exact() {
        let bytes = encode_frame(&rec("x")).unwrap();
        let decoded = decode_records::<Rec>(&bytes).unwrap();
        assert_eq!(decoded.records[0].values[2].to_bits(), (1.0f32 / 3.0).to_bits());
    }

    #[test]
    fn test_torn_tail_is_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.log");

        {
            let (mut log, _) = RecordLog::<Rec>::open(&path).unwrap();
            log.append(&rec("a")).unwrap();
        }
        let good_len = fs::metadata(&path).unwrap().len();

        let partial = encode_frame(&rec("b")).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&partial[..partial.len() - 3]).unwrap();
        drop(file);

        let (mut log, records) = RecordLog::<Rec>::open(&path).unwrap();
        assert_eq!(records, vec![rec("a")]);
        assert_eq!(fs::metadata(&path).unwrap().len(), good_len);

        log.append(&rec("c")).unwrap();
        let (_, records) = RecordLog::<Rec>::open(&path).unwrap();
        assert_eq!(records, vec![rec("a"), rec("c")]);
    }

    #[test]
    fn test_corrupt_frame_rejected() {
        let mut bytes = 3u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0xFF, 0xFF, 0xFF]);
        assert!(matches!(
            decode_records::<Rec>(&bytes),
            Err(SleuthError::SerializationError(_))
        ));
    }

    #[test]
    fn test_oversized_length_rejected() {
        let bytes = u32::MAX.to_le_bytes().to_vec();
        assert!(decode_records::<Rec>(&bytes).is_err());
    }

    #[test]
    fn test_failed_append_leaves_file_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.log");
        let (mut log, _) = RecordLog::<Rec>::open(&path).unwrap();
        log.append(&rec("a")).unwrap();
        let before = fs::metadata(&path).unwrap().len();

        log.fail_appends();
        assert!(matches!(
            log.append(&rec("b")),
            Err(SleuthError::PersistenceFailure(_))
        ));
        assert_eq!(log.len_bytes(), before);
        assert_eq!(fs::metadata(&path).unwrap().len(), before);
    }

    #[test]
    fn test_truncate_drops_last_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("records.log");
        let (mut log, _) = RecordLog::<Rec>::open(&path).unwrap();
        log.append(&rec("a")).unwrap();
        let boundary = log.len_bytes();
        log.append(&rec("b")).unwrap();

        log.truncate(boundary).unwrap();
        assert_eq!(log.len_bytes(), boundary);
        assert!(log.truncate(boundary + 1).is_err());

        log.append(&rec("c")).unwrap();
        drop(log);
        let (_, records) = RecordLog::<Rec>::open(&path).unwrap();
        assert_eq!(records, vec![rec("a"), rec("c")]);
    }

    #[test]
    fn test_ephemeral_log() {
        let mut log = RecordLog::<Rec>::ephemeral();
        log.append(&rec("a")).unwrap();
        assert!(log.path().is_none());
        assert!(log.len_bytes() > 0);
    }
}
