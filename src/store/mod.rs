//! Package source/sink with per-package locking.
//!
//! [`Workspace`] runs each load-mutate-save sequence under an exclusive lock
//! keyed by the store's canonical identity for the package. Every fetch and
//! store is bounded by a timeout, and nothing is written unless the mutation
//! succeeded.
mod local;
mod lock;

pub use local::{LocalStore, write_atomic};
pub use lock::LockRegistry;

use crate::common::error::{Error, Result};
use crate::config::StorageConfig;
use crate::ooxml::crypto::{ProtectionState, protection_state};
use crate::ooxml::docx::Package;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;
use tracing::info;

/// A package found by [`PackageStore::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredDocument {
    pub id: String,
    pub size: u64,
}

/// Where package bytes come from and go to.
pub trait PackageStore: Send + Sync {
    /// Canonical name of the package `id` refers to. Every spelling of the
    /// same package must map to the same identity; it is the lock key.
    fn identity(&self, id: &str) -> Result<String> {
        Ok(id.to_string())
    }

    /// Fails with `NotFound` when the package does not exist.
    fn fetch(&self, id: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;

    fn store(&self, id: &str, bytes: Vec<u8>) -> impl Future<Output = Result<()>> + Send;

    /// `.docx` packages directly under `dir`, sorted by identifier.
    fn list(&self, dir: &str) -> impl Future<Output = Result<Vec<StoredDocument>>> + Send;
}

/// Append `.docx` unless the identifier already ends with it.
pub fn ensure_docx_extension(id: &str) -> String {
    if id.to_ascii_lowercase().ends_with(".docx") {
        id.to_string()
    } else {
        format!("{id}.docx")
    }
}

/// A value produced by an edit and the identifier it was saved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Saved<T> {
    pub value: T,
    pub target: String,
}

/// Serializes access to packages held by a [`PackageStore`].
#[derive(Debug)]
pub struct Workspace<S> {
    store: S,
    locks: LockRegistry,
    timeout: Duration,
    ensure_extension: bool,
}

impl<S: PackageStore> Workspace<S> {
    pub fn new(store: S, config: &StorageConfig) -> Self {
        Self {
            store,
            locks: LockRegistry::new(),
            timeout: Duration::from_secs(config.timeout_secs),
            ensure_extension: config.ensure_docx_extension,
        }
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    #[inline]
    pub fn locks(&self) -> &LockRegistry {
        &self.locks
    }

    /// The identifier used for locking and storage.
    pub fn normalize(&self, id: &str) -> String {
        if self.ensure_extension {
            ensure_docx_extension(id)
        } else {
            id.to_string()
        }
    }

    async fn fetch(&self, id: &str) -> Result<Vec<u8>> {
        tokio::time::timeout(self.timeout, self.store.fetch(id))
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
    }

    async fn put(&self, id: &str, bytes: Vec<u8>) -> Result<()> {
        tokio::time::timeout(self.timeout, self.store.store(id, bytes))
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
    }

    /// Raw bytes of a package, read under its lock.
    pub async fn read_bytes<T>(&self, id: &str, f: impl FnOnce(&[u8]) -> Result<T>) -> Result<T> {
        let id = self.normalize(id);
        let key = self.store.identity(&id)?;
        let _guard = self.locks.acquire(&key).await;
        let bytes = self.fetch(&id).await?;
        f(&bytes)
    }

    /// Packages in a store directory, bounded by the timeout.
    pub async fn list(&self, dir: &str) -> Result<Vec<StoredDocument>> {
        tokio::time::timeout(self.timeout, self.store.list(dir))
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
    }

    /// Load a package and inspect it without saving.
    pub async fn read<T>(&self, id: &str, f: impl FnOnce(&Package) -> Result<T>) -> Result<T> {
        self.read_bytes(id, |bytes| f(&load(bytes)?)).await
    }

    /// Load, mutate and save a package. Nothing is written when `f` fails.
    ///
    /// The result goes to `output` when given, otherwise back to `id`.
    pub async fn edit<T>(
        &self,
        id: &str,
        output: Option<&str>,
        f: impl FnOnce(&mut Package) -> Result<T>,
    ) -> Result<Saved<T>> {
        let mut value = None;
        let target = self
            .transform(id, output, |bytes| {
                let mut package = load(&bytes)?;
                value = Some(f(&mut package)?);
                package.to_bytes()
            })
            .await?;
        let value = value.ok_or_else(|| Error::InvalidArgument("edit produced no result".to_string()))?;
        Ok(Saved { value, target })
    }

    /// Rewrite the raw bytes of a package. Returns the identifier written.
    pub async fn transform(
        &self,
        id: &str,
        output: Option<&str>,
        f: impl FnOnce(Vec<u8>) -> Result<Vec<u8>>,
    ) -> Result<String> {
        let id = self.normalize(id);
        let target = output.map_or_else(|| id.clone(), |o| self.normalize(o));
        let keys = [self.store.identity(&id)?, self.store.identity(&target)?];
        let _guards = self.locks.acquire_many(&[&keys[0], &keys[1]]).await;

        let bytes = self.fetch(&id).await?;
        let out = f(bytes)?;
        let size = out.len();
        self.put(&target, out).await?;
        info!(source = %id, target = %target, bytes = size, "saved package");
        Ok(target)
    }
}

fn load(bytes: &[u8]) -> Result<Package> {
    if protection_state(bytes) == ProtectionState::PasswordProtected {
        return Err(Error::AlreadyProtected);
    }
    Package::from_bytes(bytes)
}
