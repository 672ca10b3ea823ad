//! Error conversion implementations.
//!
//! This module contains From trait implementations to convert from internal
//! and third-party error types to the unified Error type.

use super::types::Error;
use crate::common::xml::XmlError;
use crate::ooxml::opc::error::OpcError;

impl From<OpcError> for Error {
    fn from(err: OpcError) -> Self {
        match err {
            OpcError::PartNotFound(name) => Error::NotFound(format!("part {name}")),
            OpcError::Io(e) => Error::from(e),
            OpcError::InvalidPartName(s) | OpcError::Malformed(s) => Error::CorruptPackage(s),
            OpcError::Zip(e) => Error::CorruptPackage(e.to_string()),
            OpcError::Xml(e) => Error::from(e),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Error::NotFound(err.to_string()),
            _ => Error::TransferError(err.to_string()),
        }
    }
}

impl From<XmlError> for Error {
    fn from(err: XmlError) -> Self {
        Error::CorruptPackage(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::CorruptPackage(format!("XML error: {err}"))
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::CorruptPackage(format!("ZIP error: {err}"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidArgument(err.to_string())
    }
}
