use std::fmt;

/// Manual `Display`/`From` error enum, a small composable style used
/// instead of reaching for `thiserror` in a crate this size.
#[derive(Debug)]
pub enum Error {
    Io(std::io::Error),
    NoSuchInterface(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "interface i/o error: {err}"),
            Self::NoSuchInterface(name) => write!(f, "no such interface: {name}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}
