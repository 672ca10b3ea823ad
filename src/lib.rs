//! Longan - raw-XML editing core for Word (.docx) documents
//!
//! Longan edits the WordprocessingML parts of a package directly, keeping
//! everything it does not touch byte-for-byte intact.
//!
//! # Features
//!
//! - **Footnotes and endnotes**: insert at a text or paragraph location,
//!   remove, validate and repair orphaned anchors or bodies
//! - **Cross-run replace**: find and replace text that spans several runs
//!   while keeping run formatting
//! - **Table merges**: rectangular, horizontal and vertical cell merges
//! - **Protection**: password-to-open encryption (MS-OFFCRYPTO Agile inside a
//!   small container) and editing restrictions in the settings part
//! - **Tools**: a JSON tool boundary over a locked, timeout-bounded store
//!
//! # Example
//!
//! ```no_run
//! use longan::ooxml::docx::{NoteKind, NoteManager, Package};
//! use longan::ooxml::docx::notes::{AnchorLocation, InsertOptions};
//!
//! # fn main() -> longan::Result<()> {
//! let bytes = std::fs::read("report.docx")?;
//! let mut package = Package::from_bytes(&bytes)?;
//! let id = NoteManager::new(&mut package, NoteKind::Footnote).insert(
//!     &AnchorLocation::AfterText("quarterly results".into()),
//!     "Unaudited figures.",
//!     InsertOptions { validate_location: true, auto_repair: false },
//! )?;
//! println!("added footnote {id}");
//! std::fs::write("report.docx", package.to_bytes()?)?;
//! # Ok(())
//! # }
//! ```
//!
//! # Feature flags
//!
//! - `encryption` (default): AES/SHA-1 package encryption. Without it
//!   [`ooxml::crypto::protect`] and [`ooxml::crypto::unprotect`] return
//!   [`Error::FeatureDisabled`].

pub mod common;
pub mod config;
pub mod ooxml;
pub mod store;
pub mod telemetry;
pub mod tools;

pub use common::{Error, ErrorKind, Result};
