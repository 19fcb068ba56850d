use std::fmt;

#[derive(Debug)]
pub enum ExportError {
    EmptyDocument,
    InvalidConfiguration(String),
    Asset(String),
    Capture(String),
    Assembly(String),
    Archive(String),
    Io(std::io::Error),
}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::EmptyDocument => write!(f, "no sections to export"),
            ExportError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            ExportError::Asset(message) => write!(f, "asset error: {}", message),
            ExportError::Capture(message) => write!(f, "section capture failed: {}", message),
            ExportError::Assembly(message) => write!(f, "page assembly failed: {}", message),
            ExportError::Archive(message) => write!(f, "archive store failed: {}", message),
            ExportError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ExportError {
    fn from(value: std::io::Error) -> Self {
        ExportError::Io(value)
    }
}
