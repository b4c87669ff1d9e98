use std::io;
use std::str::Utf8Error;
use thiserror::Error;
use serde_json;
use tokio_tungstenite::tungstenite;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to determine path to config file")]
    NoConfigPath,

    #[error("Failed to acquire file lock on config file: {source}")]
    CanNotLock { source: io::Error },

    #[error("Failed to encode/decode config as utf-8: {source}")]
    Utf8Error { #[from] source: Utf8Error },

    #[error("Failed to read/write config file: {source}")]
    IOError { #[from] source: io::Error },

    #[error("Failed to parse/build config file: {source}")]
    JsonError { #[from] source: serde_json::Error },
}

impl ConfigError {
    pub fn is_file_not_found_error(&self) -> bool {
        match self {
            ConfigError::IOError { source } => source.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }
}

/// A candidate endpoint does not match `(ws|wss)://host[:port][/path]`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EndpointError {
    #[error("Endpoint is empty")]
    Empty,

    #[error("Endpoint must start with ws:// or wss://")]
    Scheme,

    #[error("Endpoint host {host:?} is not valid")]
    Host { host: String },

    #[error("Endpoint port {port:?} is not valid")]
    Port { port: String },

    #[error("Endpoint path contains invalid character {character:?}")]
    Path { character: char },
}

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Failed to parse message as JSON: {source}")]
    Json { #[from] source: serde_json::Error },

    #[error("Message does not contain a numeric distance")]
    MissingDistance,
}

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Error communicating with device (websocket): {source}")]
    WebSocket { #[from] source: Box<tungstenite::Error> },

    #[error("Error communicating with device (io): {source}")]
    Io { #[from] source: io::Error },
}

impl From<tungstenite::Error> for LinkError {
    fn from(source: tungstenite::Error) -> Self {
        LinkError::WebSocket { source: Box::new(source) }
    }
}

#[derive(Error, Debug)]
pub enum AppRunError {
    #[error("Failed to start application (config): {source}")]
    ConfigError { #[from] source: ConfigError },

    #[error("Failed to start application (endpoint): {source}")]
    EndpointError { #[from] source: EndpointError },

    #[error("Failed to initialize logger: {source}")]
    Logger { #[from] source: log::SetLoggerError },

    #[error("Failed to open LOG_FILE: {source}")]
    LogFile { source: io::Error },

    #[error("Failed to run application (io): {source}")]
    IOError { #[from] source: io::Error },
}
