//! Packages on the local filesystem.
use super::{PackageStore, StoredDocument};
use crate::common::error::{Error, Result};
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Reads and writes packages as files, optionally under a base directory.
#[derive(Debug, Clone, Default)]
pub struct LocalStore {
    root: Option<PathBuf>,
}

impl LocalStore {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    /// Map an identifier to a path. Identifiers with a URI scheme are rejected.
    pub fn resolve(&self, id: &str) -> Result<PathBuf> {
        if let Some((scheme, _)) = id.split_once("://") {
            warn!(id, scheme, "rejected remote identifier");
            return Err(Error::TransferError(format!(
                "'{scheme}://' identifiers need a remote store; only local paths are available"
            )));
        }
        let path = Path::new(id);
        Ok(match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        })
    }
}

/// Drop `.` components and fold `..` into its parent without touching the disk.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {},
            Component::ParentDir => {
                out.pop();
            },
            other => out.push(other),
        }
    }
    out
}

/// Resolve symlinks through the deepest ancestor that exists, keeping the
/// components below it as written.
fn canonicalize_existing(path: &Path) -> PathBuf {
    let mut tail = Vec::new();
    let mut current = path;
    loop {
        if let Ok(canonical) = std::fs::canonicalize(current) {
            return tail.iter().rev().fold(canonical, |acc, name| acc.join(name));
        }
        match (current.parent(), current.file_name()) {
            (Some(parent), Some(name)) => {
                tail.push(name);
                current = parent;
            },
            _ => return path.to_path_buf(),
        }
    }
}

fn io_error(path: &Path, action: &str, e: std::io::Error) -> Error {
    match e.kind() {
        std::io::ErrorKind::NotFound => Error::NotFound(format!("{} does not exist", path.display())),
        _ => Error::TransferError(format!("failed to {action} {}: {e}", path.display())),
    }
}

impl PackageStore for LocalStore {
    /// The absolute path with `.`, `..` and symlinks resolved.
    fn identity(&self, id: &str) -> Result<String> {
        let path = self.resolve(id)?;
        let absolute = std::path::absolute(&path)
            .map_err(|e| Error::TransferError(format!("cannot resolve {}: {e}", path.display())))?;
        let lexical = normalize_lexically(&absolute);
        Ok(canonicalize_existing(&lexical).to_string_lossy().into_owned())
    }

    fn fetch(&self, id: &str) -> impl Future<Output = Result<Vec<u8>>> + Send {
        let path = self.resolve(id);
        async move {
            let path = path?;
            let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    Error::NotFound(format!("document {} does not exist", path.display()))
                },
                _ => Error::TransferError(format!("failed to read {}: {e}", path.display())),
            })?;
            debug!(path = %path.display(), bytes = bytes.len(), "fetched package");
            Ok(bytes)
        }
    }

    fn store(&self, id: &str, bytes: Vec<u8>) -> impl Future<Output = Result<()>> + Send {
        let path = self.resolve(id);
        async move {
            let path = path?;
            write_atomic(&path, &bytes)
                .await
                .map_err(|e| Error::TransferError(format!("failed to write {}: {e}", path.display())))?;
            debug!(path = %path.display(), bytes = bytes.len(), "stored package");
            Ok(())
        }
    }

    fn list(&self, dir: &str) -> impl Future<Output = Result<Vec<StoredDocument>>> + Send {
        let prefix = dir.trim_end_matches('/').to_string();
        let path = self.resolve(if prefix.is_empty() { "." } else { prefix.as_str() });
        async move {
            let path = path?;
            let mut entries = tokio::fs::read_dir(&path)
                .await
                .map_err(|e| io_error(&path, "list", e))?;
            let mut documents = Vec::new();
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| io_error(&path, "list", e))?
            {
                let file_name = entry.file_name();
                let Some(name) = file_name.to_str() else {
                    continue;
                };
                // Word keeps `~$name.docx` owner files next to open documents.
                if !name.to_ascii_lowercase().ends_with(".docx") || name.starts_with("~$") {
                    continue;
                }
                let Ok(meta) = entry.metadata().await else {
                    continue;
                };
                if !meta.is_file() {
                    continue;
                }
                let id = match prefix.as_str() {
                    "" | "." => name.to_string(),
                    sub => format!("{sub}/{name}"),
                };
                documents.push(StoredDocument { id, size: meta.len() });
            }
            documents.sort_by(|a, b| a.id.cmp(&b.id));
            debug!(path = %path.display(), count = documents.len(), "listed packages");
            Ok(documents)
        }
    }
}

/// Removes a temporary file unless it was renamed into place.
struct TempFile {
    path: PathBuf,
    armed: bool,
}

impl TempFile {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "removed temporary file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove temporary file"),
        }
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let ts = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let suffix = format!("tmp.{}.{}", std::process::id(), ts);
    let mut tmp = path.to_path_buf();
    let ext = match path.extension().and_then(|e| e.to_str()) {
        Some(orig) => format!("{orig}.{suffix}"),
        None => suffix,
    };
    tmp.set_extension(ext);
    tmp
}

/// Write through a temporary sibling that is synced and renamed into place.
///
/// The rename happens after the last await point, so a future dropped early
/// (a timeout, say) never replaces `path`, and its temporary file is removed.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }

    let temp_path = temp_sibling(path);
    let std_file = std::fs::OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&temp_path)?;
    let mut temp = TempFile {
        path: temp_path,
        armed: true,
    };

    let mut file = tokio::fs::File::from_std(std_file);
    file.write_all(bytes).await?;
    file.sync_all().await?;
    drop(file);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = tokio::fs::metadata(path).await {
            let mode = meta.permissions().mode();
            let _ = tokio::fs::set_permissions(&temp.path, std::fs::Permissions::from_mode(mode)).await;
        }
    }

    #[cfg(windows)]
    {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }

    std::fs::rename(&temp.path, path)?;
    temp.disarm();
    Ok(())
}
