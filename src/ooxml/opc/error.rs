/// Error types for OPC package operations
use crate::common::xml::XmlError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpcError {
    #[error("Part not found: {0}")]
    PartNotFound(String),

    #[error("Malformed package: {0}")]
    Malformed(String),

    #[error("Invalid part name: {0}")]
    InvalidPartName(String),

    #[error("XML error: {0}")]
    Xml(#[from] XmlError),

    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OpcError>;
