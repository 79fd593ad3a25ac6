//! Baseline stores that write every snapshot as its own JSON file.
//!
//! They keep no dictionary, so their size is the yardstick the tiered store
//! is measured against.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::info;

use crate::config::FileCompression;
use crate::core::geojson::FeatureCollection;
use crate::core::Snapshot;
use crate::error::{Error, Result};

pub struct FileStore {
    name: String,
    root: PathBuf,
    compression: FileCompression,
}

impl FileStore {
    pub fn open(root: &Path, compression: FileCompression) -> Result<Self> {
        fs::create_dir_all(root)?;
        let name = match compression {
            FileCompression::None => "FileStore(json)",
            FileCompression::Gzip => "FileStore(gzip)",
        };
        Ok(Self { name: name.to_string(), root: root.to_path_buf(), compression })
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn extension(&self) -> &'static str {
        match self.compression {
            FileCompression::None => "json",
            FileCompression::Gzip => "json.gz",
        }
    }

    fn document_path(&self, timestamp: &str) -> Result<PathBuf> {
        if timestamp.is_empty()
            || timestamp == "."
            || timestamp == ".."
            || timestamp.contains(['/', '\\'])
        {
            return Err(Error::InvalidDocument(format!(
                "timestamp {:?} cannot be used as a file name",
                timestamp
            )));
        }
        Ok(self.root.join(format!("{}.{}", timestamp, self.extension())))
    }

    /// Files written by this store: `*.json` or `*.json.gz`, by compression.
    fn documents(&self) -> Result<Vec<PathBuf>> {
        let suffix = format!(".{}", self.extension());
        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let owned = entry.file_name().to_str().is_some_and(|name| name.ends_with(&suffix));
            if owned && entry.file_type()?.is_file() {
                paths.push(entry.path());
            }
        }
        Ok(paths)
    }

    /// Delete every document file. Other files in the directory are kept.
    pub fn reset(&mut self) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        for path in self.documents()? {
            fs::remove_file(path)?;
        }
        info!(path = %self.root.display(), "reset file store");
        Ok(())
    }

    pub fn store_document(&mut self, snapshot: Snapshot) -> Result<()> {
        let path = self.document_path(&snapshot.timestamp)?;
        let file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                return Err(Error::DuplicateTimestamp(snapshot.timestamp));
            }
            Err(err) => return Err(err.into()),
        };

        let collection = FeatureCollection::from_snapshot(&snapshot);
        let writer = BufWriter::new(file);
        match self.compression {
            FileCompression::None => {
                let mut writer = writer;
                serde_json::to_writer(&mut writer, &collection)?;
                writer.flush()?;
            }
            FileCompression::Gzip => {
                let mut encoder = GzEncoder::new(writer, Compression::default());
                serde_json::to_writer(&mut encoder, &collection)?;
                encoder.finish()?.flush()?;
            }
        }
        Ok(())
    }

    pub fn get_document(&self, timestamp: &str) -> Result<Snapshot> {
        let path = self.document_path(timestamp)?;
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(Error::NotFound(timestamp.to_string()));
            }
            Err(err) => return Err(err.into()),
        };

        let reader = BufReader::new(file);
        let collection = match self.compression {
            FileCompression::None => FeatureCollection::from_reader(reader)?,
            FileCompression::Gzip => FeatureCollection::from_reader(GzDecoder::new(reader))?,
        };
        collection.into_snapshot(timestamp)
    }

    pub fn get_total_size(&self) -> Result<u64> {
        let mut total = 0;
        for path in self.documents()? {
            total += fs::metadata(path)?.len();
        }
        Ok(total)
    }
}
