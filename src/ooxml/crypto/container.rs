//! The encrypted container envelope.
//!
//! Layout: 8-byte magic, u32 LE length of the EncryptionInfo record, the
//! record itself, then the EncryptedPackage stream up to the end.
use crate::common::error::{Error, Result};

pub const MAGIC: &[u8; 8] = b"LONGANEC";

/// Whether the bytes start with the container magic.
#[inline]
pub fn is_container(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

pub fn wrap(info: &[u8], package: &[u8]) -> Result<Vec<u8>> {
    let info_len = u32::try_from(info.len())
        .map_err(|_| Error::InvalidArgument("EncryptionInfo record is too large".to_string()))?;
    let mut out = Vec::with_capacity(MAGIC.len() + 4 + info.len() + package.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&info_len.to_le_bytes());
    out.extend_from_slice(info);
    out.extend_from_slice(package);
    Ok(out)
}

/// Split a container into its EncryptionInfo record and EncryptedPackage stream.
pub fn unwrap(bytes: &[u8]) -> Result<(&[u8], &[u8])> {
    let rest = bytes
        .strip_prefix(MAGIC.as_slice())
        .ok_or_else(|| Error::NotProtected("no encrypted container header".to_string()))?;
    let (len, rest) = rest
        .split_first_chunk::<4>()
        .ok_or_else(|| Error::CorruptPackage("truncated container header".to_string()))?;
    let len = u32::from_le_bytes(*len) as usize;
    if rest.len() < len {
        return Err(Error::CorruptPackage(format!(
            "container declares a {len}-byte EncryptionInfo record but holds {}",
            rest.len()
        )));
    }
    Ok(rest.split_at(len))
}
