use std::{error::Error, fmt::Display};

use crate::transport::TransportError;

/// Failures that end the remote's terminal session.
#[derive(Debug)]
pub enum RemoteGuiError {
    /// Talking to the terminal failed
    IOError(std::io::Error),
    /// The radio could not be opened
    Transport(TransportError),
}

impl Display for RemoteGuiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#?}", self)
    }
}

impl Error for RemoteGuiError {}

impl From<std::io::Error> for RemoteGuiError {
    fn from(value: std::io::Error) -> Self {
        Self::IOError(value)
    }
}

impl From<TransportError> for RemoteGuiError {
    fn from(value: TransportError) -> Self {
        Self::Transport(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radio_failures_convert() {
        let error: RemoteGuiError = TransportError::NoAdapter.into();
        assert!(matches!(
            error,
            RemoteGuiError::Transport(TransportError::NoAdapter)
        ));
        assert!(error.to_string().contains("NoAdapter"));
    }
}
