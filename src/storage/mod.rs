pub mod assembler;
pub mod dictionary;
pub mod file_store;
pub mod segment;
pub mod util;
pub mod velocity;

use crate::config::{BackendConfig, StoreConfig};
use crate::core::Snapshot;
use crate::error::Result;

use self::file_store::FileStore;
use self::velocity::VelocityStore;

/// Everything the benchmark and the CLI need from a backend.
pub trait DocumentStore {
    fn name(&self) -> String;

    // Destructive: removes every stored snapshot.
    fn reset(&mut self) -> Result<()>;

    fn store_document(&mut self, snapshot: Snapshot) -> Result<()>;

    fn get_document(&self, timestamp: &str) -> Result<Snapshot>;

    // Bytes on disk, after any pending writes have been flushed.
    fn get_total_size(&mut self) -> Result<u64>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl DocumentStore for VelocityStore {
    fn name(&self) -> String {
        VelocityStore::name(self).to_string()
    }

    fn reset(&mut self) -> Result<()> {
        VelocityStore::reset(self)
    }

    fn store_document(&mut self, snapshot: Snapshot) -> Result<()> {
        VelocityStore::store_document(self, snapshot)
    }

    fn get_document(&self, timestamp: &str) -> Result<Snapshot> {
        VelocityStore::get_document(self, timestamp)
    }

    fn get_total_size(&mut self) -> Result<u64> {
        VelocityStore::get_total_size(self)
    }

    fn flush(&mut self) -> Result<()> {
        VelocityStore::flush(self)
    }
}

impl DocumentStore for FileStore {
    fn name(&self) -> String {
        FileStore::name(self).to_string()
    }

    fn reset(&mut self) -> Result<()> {
        FileStore::reset(self)
    }

    fn store_document(&mut self, snapshot: Snapshot) -> Result<()> {
        FileStore::store_document(self, snapshot)
    }

    fn get_document(&self, timestamp: &str) -> Result<Snapshot> {
        FileStore::get_document(self, timestamp)
    }

    fn get_total_size(&mut self) -> Result<u64> {
        FileStore::get_total_size(self)
    }
}

/// A store picked at runtime from a [`StoreConfig`].
pub enum AnyStore {
    Velocity(VelocityStore),
    File(FileStore),
}

impl AnyStore {
    pub fn open(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        let mut store = match &config.backend {
            BackendConfig::Velocity(velocity) => {
                AnyStore::Velocity(VelocityStore::open(&config.data_dir, velocity.clone())?)
            }
            BackendConfig::File(file) => {
                AnyStore::File(FileStore::open(&config.data_dir, file.compression)?)
            }
        };
        if let Some(name) = &config.name {
            store = match store {
                AnyStore::Velocity(inner) => AnyStore::Velocity(inner.with_name(name)),
                AnyStore::File(inner) => AnyStore::File(inner.with_name(name)),
            };
        }
        Ok(store)
    }

    fn inner(&self) -> &dyn DocumentStore {
        match self {
            AnyStore::Velocity(store) => store,
            AnyStore::File(store) => store,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn DocumentStore {
        match self {
            AnyStore::Velocity(store) => store,
            AnyStore::File(store) => store,
        }
    }
}

impl DocumentStore for AnyStore {
    fn name(&self) -> String {
        self.inner().name()
    }

    fn reset(&mut self) -> Result<()> {
        self.inner_mut().reset()
    }

    fn store_document(&mut self, snapshot: Snapshot) -> Result<()> {
        self.inner_mut().store_document(snapshot)
    }

    fn get_document(&self, timestamp: &str) -> Result<Snapshot> {
        self.inner().get_document(timestamp)
    }

    fn get_total_size(&mut self) -> Result<u64> {
        self.inner_mut().get_total_size()
    }

    fn flush(&mut self) -> Result<()> {
        self.inner_mut().flush()
    }
}
