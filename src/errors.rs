use std::{fmt, io, num::{ParseFloatError, ParseIntError}, str::Utf8Error};
use quick_xml::events::attributes::AttrError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Opening, reading or writing a file failed.
    Io,
    /// The compressed input is corrupt, truncated or in an unknown format.
    Decompress,
    /// A tag, member or element line could not be parsed.
    MalformedRecord,
    /// The background decompression worker did not shut down cleanly.
    Resource,
    /// Bad configuration file or command line.
    Config,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Io => "io",
            ErrorKind::Decompress => "decompress",
            ErrorKind::MalformedRecord => "malformed_record",
            ErrorKind::Resource => "resource",
            ErrorKind::Config => "config",
        }
    }
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
        }
    }

    pub fn decompress(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Decompress, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::MalformedRecord, message)
    }

    pub fn resource(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Resource, message)
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Config, message)
    }

    pub fn is_fatal(&self) -> bool {
        !matches!(self.kind, ErrorKind::MalformedRecord | ErrorKind::Resource)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error: {}", self.kind.as_str(), self.message)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            message: value.to_string()
        }
    }
}

impl From<ParseFloatError> for Error {
    fn from(value: ParseFloatError) -> Self {
        Error {
            kind: ErrorKind::MalformedRecord,
            message: value.to_string()
        }
    }
}

impl From<ParseIntError> for Error {
    fn from(value: ParseIntError) -> Self {
        Error {
            kind: ErrorKind::MalformedRecord,
            message: value.to_string()
        }
    }
}

impl From<AttrError> for Error {
    fn from(value: AttrError) -> Self {
        Error {
            kind: ErrorKind::MalformedRecord,
            message: value.to_string()
        }
    }
}

impl From<Utf8Error> for Error {
    fn from(value: Utf8Error) -> Self {
        Error {
            kind: ErrorKind::MalformedRecord,
            message: value.to_string()
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Config,
            message: value.to_string()
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
