/// Errors reported by the decoder internals, the capture reader and the config loader.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The PID is not one handled by the BMS decoder.
    #[error("Unknown PID {0:#06x}")]
    UnknownPid(u16),
    /// The frame payload is shorter than the PID requires.
    #[error("Frame too short - required={required} received={received}")]
    FrameTooShort { required: usize, received: usize },
    /// A capture file line could not be parsed.
    #[error("Parse error on line {line}: {reason}")]
    Parse { line: usize, reason: String },
    /// An I/O error while reading a capture or config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// The configuration file is not valid YAML for the expected layout.
    #[cfg(feature = "serde")]
    #[error("Config error: {0}")]
    Config(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
