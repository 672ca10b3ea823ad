//! Password protection of whole packages.
//!
//! A protected package is the Agile-encrypted ZIP wrapped in a small envelope
//! (see [`container`]). The cipher sits behind [`PackageCipher`] so the
//! envelope does not depend on the key-derivation scheme.
//!
//! Encryption is compiled only with the `encryption` feature; without it
//! [`protect`] and [`unprotect`] report [`Error::FeatureDisabled`].
#[cfg(feature = "encryption")]
pub mod agile;
pub mod container;

#[cfg(feature = "encryption")]
pub use agile::AgileCipher;

use crate::common::error::{Error, Result};
use rand::TryRngCore;
use rand::rngs::OsRng;
use serde::Serialize;
use std::io::Cursor;
use tracing::info;

/// Whether bytes hold a plain or a password-protected package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProtectionState {
    Unprotected,
    PasswordProtected,
}

/// The two records an encryption produces.
#[derive(Debug, Clone)]
pub struct EncryptedParts {
    /// EncryptionInfo record
    pub info: Vec<u8>,
    /// EncryptedPackage stream
    pub package: Vec<u8>,
}

/// A password-based package cipher.
pub trait PackageCipher {
    fn encrypt(&self, package: &[u8], password: &str) -> Result<EncryptedParts>;

    /// Fails with [`Error::BadPassword`] before touching the payload when the
    /// password does not match.
    fn decrypt(&self, info: &[u8], package: &[u8], password: &str) -> Result<Vec<u8>>;
}

pub(crate) fn password_to_utf16le(password: &str) -> Vec<u8> {
    let mut buf = Vec::with_capacity(password.len() * 2);
    for ch in password.encode_utf16() {
        buf.extend_from_slice(&ch.to_le_bytes());
    }
    buf
}

pub(crate) fn fill_random(buf: &mut [u8], what: &str) -> Result<()> {
    OsRng
        .try_fill_bytes(buf)
        .map_err(|e| Error::TransferError(format!("failed to generate {what}: {e}")))
}

pub fn protection_state(bytes: &[u8]) -> ProtectionState {
    if container::is_container(bytes) {
        ProtectionState::PasswordProtected
    } else {
        ProtectionState::Unprotected
    }
}

/// Encrypt a package with `cipher` and wrap it in the container.
pub fn protect_with(cipher: &dyn PackageCipher, package: &[u8], password: &str) -> Result<Vec<u8>> {
    if container::is_container(package) {
        return Err(Error::AlreadyProtected);
    }
    if password.is_empty() {
        return Err(Error::InvalidArgument("password is empty".to_string()));
    }
    zip::ZipArchive::new(Cursor::new(package))
        .map_err(|e| Error::CorruptPackage(format!("input is not a ZIP package: {e}")))?;

    let parts = cipher.encrypt(package, password)?;
    let out = container::wrap(&parts.info, &parts.package)?;
    info!(plain = package.len(), protected = out.len(), "protected package");
    Ok(out)
}

/// Unwrap a container and decrypt it with `cipher`.
pub fn unprotect_with(cipher: &dyn PackageCipher, bytes: &[u8], password: &str) -> Result<Vec<u8>> {
    let (info, package) = container::unwrap(bytes)?;
    let plain = cipher.decrypt(info, package, password)?;
    info!(protected = bytes.len(), plain = plain.len(), "unprotected package");
    Ok(plain)
}

/// Protect with Agile encryption using `spin_count` key-derivation rounds.
#[cfg(feature = "encryption")]
pub fn protect(package: &[u8], password: &str, spin_count: u32) -> Result<Vec<u8>> {
    protect_with(&AgileCipher { spin_count }, package, password)
}

#[cfg(not(feature = "encryption"))]
pub fn protect(_package: &[u8], _password: &str, _spin_count: u32) -> Result<Vec<u8>> {
    Err(Error::FeatureDisabled("encryption".to_string()))
}

/// Remove Agile encryption. The spin count is read from the container.
#[cfg(feature = "encryption")]
pub fn unprotect(bytes: &[u8], password: &str) -> Result<Vec<u8>> {
    unprotect_with(&AgileCipher::default(), bytes, password)
}

#[cfg(not(feature = "encryption"))]
pub fn unprotect(_bytes: &[u8], _password: &str) -> Result<Vec<u8>> {
    Err(Error::FeatureDisabled("encryption".to_string()))
}
