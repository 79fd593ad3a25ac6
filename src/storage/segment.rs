use std::{
    fs::{self, File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::{Path, PathBuf},
};

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    core::encoding::{decode_header, decode_payload, verify_payload, FRAME_HEADER_SIZE},
    error::{Error, Result},
};

const SEGMENT_PREFIX: &str = "segment-";
const SEGMENT_SUFFIX: &str = ".log";

/// Append-only commit log split into one file per time partition.
///
/// Frames are only ever appended; a segment is never rewritten. A frame cut
/// short by a crash is dropped (and truncated away) the next time the log is
/// replayed.
pub struct SegmentLog {
    base_path: PathBuf,
    sync_writes: bool,
    active: Option<(String, File)>,
}

impl SegmentLog {
    pub fn open(base_path: &Path, sync_writes: bool) -> Result<Self> {
        fs::create_dir_all(base_path)?;
        Ok(Self { base_path: base_path.to_path_buf(), sync_writes, active: None })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn segment_path(&self, segment: &str) -> PathBuf {
        self.base_path.join(format!("{}{}{}", SEGMENT_PREFIX, segment, SEGMENT_SUFFIX))
    }

    /// Append one encoded frame and return its byte offset in the segment.
    pub fn append(&mut self, segment: &str, frame: &[u8]) -> Result<u64> {
        let reuse = matches!(&self.active, Some((name, _)) if name == segment);
        if !reuse {
            let file =
                OpenOptions::new().create(true).append(true).open(self.segment_path(segment))?;
            self.active = Some((segment.to_string(), file));
        }
        let Some((_, file)) = self.active.as_mut() else {
            return Err(Error::Config(format!("segment {} is not open", segment)));
        };

        let offset = file.metadata()?.len();
        if let Err(error) = file.write_all(frame) {
            // Roll back the partial frame.
            let _ = file.set_len(offset);
            return Err(error.into());
        }
        if self.sync_writes {
            file.sync_data()?;
        }
        Ok(offset)
    }

    pub fn read_frame<T: DeserializeOwned>(&self, segment: &str, offset: u64) -> Result<T> {
        let path = self.segment_path(segment);
        let mut file = File::open(&path)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; FRAME_HEADER_SIZE];
        file.read_exact(&mut header)?;
        let (length, checksum) = decode_header(&header);

        let mut payload = vec![0u8; length as usize];
        file.read_exact(&mut payload)?;

        let payload =
            verify_payload(&payload, checksum).ok_or(Error::CorruptSegment { path, offset })?;
        decode_payload(payload)
    }

    /// Segment names in partition order.
    pub fn segments(&self) -> Result<Vec<String>> {
        let mut segments = Vec::new();
        for entry in fs::read_dir(&self.base_path)? {
            let entry = entry?;
            let path = entry.path();

            if let Some(filename) = path.file_name().and_then(|n| n.to_str()) {
                if let Some(name) =
                    filename.strip_prefix(SEGMENT_PREFIX).and_then(|s| s.strip_suffix(SEGMENT_SUFFIX))
                {
                    segments.push(name.to_string());
                }
            }
        }
        segments.sort();
        Ok(segments)
    }

    /// Visit every committed frame in partition order.
    ///
    /// A damaged frame with no intact frame after it is a torn tail: with
    /// `repair` set it is truncated away, otherwise it is skipped. A damaged
    /// frame followed by an intact one is [`Error::CorruptSegment`] and the
    /// segment is left untouched.
    pub fn replay<T, F>(&self, repair: bool, mut visit: F) -> Result<usize>
    where
        T: DeserializeOwned,
        F: FnMut(&str, u64, T) -> Result<()>,
    {
        let mut frames = 0;

        for segment in self.segments()? {
            let path = self.segment_path(&segment);
            let data = fs::read(&path)?;
            let mut offset = 0usize;

            while offset < data.len() {
                let Some((end, payload)) = verified_frame(&data, offset) else {
                    discard_tail(&path, &data, offset, repair)?;
                    break;
                };

                visit(&segment, offset as u64, decode_payload(payload)?)?;
                frames += 1;
                offset = end;
            }
        }

        debug!(frames, path = %self.base_path.display(), "replayed segment log");
        Ok(frames)
    }

    pub fn total_size(&self) -> Result<u64> {
        let mut total = 0;
        for segment in self.segments()? {
            total += fs::metadata(self.segment_path(&segment))?.len();
        }
        Ok(total)
    }

    /// Delete every segment file. Other files in the directory are kept.
    pub fn clear(&mut self) -> Result<()> {
        self.active = None;
        fs::create_dir_all(&self.base_path)?;
        for segment in self.segments()? {
            fs::remove_file(self.segment_path(&segment))?;
        }
        Ok(())
    }
}

/// End offset and checksummed payload of the frame starting at `offset`,
/// if the whole frame is present and intact.
fn verified_frame(data: &[u8], offset: usize) -> Option<(usize, &[u8])> {
    let header_end = offset.checked_add(FRAME_HEADER_SIZE)?;
    let header: [u8; FRAME_HEADER_SIZE] = data.get(offset..header_end)?.try_into().ok()?;
    let (length, checksum) = decode_header(&header);
    let end = header_end.checked_add(length as usize)?;
    let payload = verify_payload(data.get(header_end..end)?, checksum)?;
    Some((end, payload))
}

fn discard_tail(path: &Path, data: &[u8], offset: usize, repair: bool) -> Result<()> {
    let committed_after =
        (offset + 1..data.len()).any(|start| verified_frame(data, start).is_some());
    if committed_after {
        return Err(Error::CorruptSegment { path: path.to_path_buf(), offset: offset as u64 });
    }

    warn!(
        path = %path.display(),
        offset,
        dropped_bytes = data.len() - offset,
        "discarding incomplete commit frame"
    );
    if repair {
        OpenOptions::new().write(true).open(path)?.set_len(offset as u64)?;
    }
    Ok(())
}
