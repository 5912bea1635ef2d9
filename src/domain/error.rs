use thiserror::Error;

/// AnalyzerSim unified error type
#[derive(Error, Debug)]
pub enum SimError {
    /// Transport could not be established (bind, connect or device open failure)
    #[error("Connect error: {message}")]
    Connect { message: String },

    /// I/O failure while the receive cycle was running
    #[error("Receive error: {message}")]
    Receive { message: String },

    /// A single outbound write failed
    #[error("Send error: {message}")]
    Send { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Invalid session state: {message}")]
    InvalidState { message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Output error: {0}")]
    Output(String),

    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimError {
    pub fn connect(message: impl Into<String>) -> Self {
        Self::Connect { message: message.into() }
    }

    pub fn receive(message: impl Into<String>) -> Self {
        Self::Receive { message: message.into() }
    }

    pub fn send(message: impl Into<String>) -> Self {
        Self::Send { message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Detail text carried by `"Error: ..."` and `"Send error: ..."` status events.
    pub fn status_text(&self) -> String {
        match self {
            Self::Connect { message }
            | Self::Receive { message }
            | Self::Send { message }
            | Self::Config { message }
            | Self::InvalidState { message } => message.clone(),
            Self::InvalidInput(message) | Self::Output(message) => message.clone(),
            Self::Serial(e) => e.to_string(),
            Self::Io(e) => e.to_string(),
        }
    }

    /// True for failures that end a session rather than a single operation.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Receive { .. })
    }
}

pub type SimResult<T> = Result<T, SimError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_text_strips_category() {
        let error = SimError::connect("Connection refused (os error 111)");
        assert_eq!(error.status_text(), "Connection refused (os error 111)");
        assert!(error.to_string().starts_with("Connect error"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(SimError::connect("x").is_fatal());
        assert!(SimError::receive("x").is_fatal());
        assert!(!SimError::send("x").is_fatal());
        assert!(!SimError::config("x").is_fatal());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "broken pipe");
        let error: SimError = io_error.into();
        assert!(matches!(error, SimError::Io(_)));
        assert_eq!(error.status_text(), "broken pipe");
    }
}
