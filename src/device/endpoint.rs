use std::fmt;
use std::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::EndpointError;

/**
 * Characters (besides ASCII letters and digits) that may appear in the path of an endpoint.
 */
const PATH_PUNCTUATION: &str = "_-.~:/?#[]@!$&'()*+,;=";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scheme {
    Ws,
    Wss,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Ws => "ws",
            Scheme::Wss => "wss",
        }
    }
}

/// The address of the sensor stream.
///
/// An `Endpoint` can only be obtained by parsing, so holding one means the address matches
/// `(ws|wss)://host[:port][/path]`. Whether anything is listening there is a different matter
/// and is only discovered when connecting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    url: String,
    scheme: Scheme,
    host: String,
    port: Option<u16>,
    path: Option<String>,
}

fn is_valid_label(label: &str) -> bool {
    !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || PATH_PUNCTUATION.contains(c)
}

fn parse_port(port: &str) -> Result<u16, EndpointError> {
    if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
        return Err(EndpointError::Port { port: port.to_string() });
    }

    port.parse::<u16>().map_err(|_| EndpointError::Port { port: port.to_string() })
}

impl Endpoint {
    pub fn parse(text: &str) -> Result<Endpoint, EndpointError> {
        if text.is_empty() {
            return Err(EndpointError::Empty);
        }

        let (scheme, rest) = if let Some(rest) = text.strip_prefix("wss://") {
            (Scheme::Wss, rest)
        } else if let Some(rest) = text.strip_prefix("ws://") {
            (Scheme::Ws, rest)
        } else {
            return Err(EndpointError::Scheme);
        };

        let (authority, path) = match rest.find('/') {
            Some(index) => (&rest[..index], Some(&rest[index..])),
            None => (rest, None),
        };

        let (host, port) = match authority.split_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        };

        if !host.split('.').all(is_valid_label) {
            return Err(EndpointError::Host { host: host.to_string() });
        }

        let port = port.map(parse_port).transpose()?;

        if let Some(path) = path {
            if let Some(character) = path.chars().find(|c| !is_path_char(*c)) {
                return Err(EndpointError::Path { character });
            }
        }

        Ok(Endpoint {
            url: text.to_string(),
            scheme,
            host: host.to_string(),
            port,
            path: path.map(str::to_string),
        })
    }

    pub fn as_str(&self) -> &str {
        &self.url
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn is_secure(&self) -> bool {
        self.scheme == Scheme::Wss
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Endpoint::parse(s)
    }
}

impl TryFrom<String> for Endpoint {
    type Error = EndpointError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Endpoint::parse(&value)
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        endpoint.url
    }
}
