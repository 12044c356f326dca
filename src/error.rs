use std::io;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum Error {
    IoError(io::Error),
    // A positioned cell read failed; names the container file.
    ReadError(String, io::Error),
    InvalidHeader(String),
    InvalidData(String),
    AlreadyExists(PathBuf),
    UnknownIndex(String),
    InvalidArgument(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::IoError(err)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::IoError(err) => write!(f, "I/O error: {}", err),
            Error::ReadError(file, err) => write!(f, "Failed to read {}: {}", file, err),
            Error::InvalidHeader(msg) => write!(f, "Invalid header: {}", msg),
            Error::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
            Error::AlreadyExists(path) => write!(f, "Path already exists: {}", path.display()),
            Error::UnknownIndex(name) => write!(f, "Unknown index: {}", name),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(err) | Error::ReadError(_, err) => Some(err),
            _ => None,
        }
    }
}
