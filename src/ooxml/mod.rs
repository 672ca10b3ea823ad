//! Office Open XML packages, edited at the level of their XML parts.
//!
//! The module is organized into layers:
//!
//! 1. **OPC Layer** (`opc`): ZIP members, parts, relationships and content types
//! 2. **Word Layer** (`docx`): the main document and its notes, settings and styles parts
//! 3. **Protection** (`crypto`): password encryption of a whole package
//!
//! # Example: Replacing text across runs
//!
//! ```rust,no_run
//! use longan::ooxml::docx::{Package, SearchOptions, search};
//!
//! let mut pkg = Package::from_bytes(&std::fs::read("report.docx")?)?;
//! let body = pkg.body_mut()?;
//! let count = search::replace_text(body, "draft", "final", None, SearchOptions::default())?;
//! println!("replaced {count} occurrences");
//! std::fs::write("report.docx", pkg.to_bytes()?)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
pub mod crypto;
pub mod docx;
pub mod opc;
