//! External segment naming
//!
//! The name of an External segment is a bit-exact contract consumed by
//! the reporting sink: `External/<host>[:<port>]/<path>`. The host is
//! always present, the port appears only when it is not the scheme
//! default, and the path defaults to `/`.

use anyhow::{bail, Context, Result};

/// Prefix shared by every external call segment name
pub const EXTERNAL_PREFIX: &str = "External";

/// Transport scheme of an outbound call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    /// The port implied when a destination does not name one
    pub fn default_port(self) -> u16 {
        match self {
            Scheme::Http => 80,
            Scheme::Https => 443,
        }
    }

    /// Lowercase scheme string
    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

/// Identity of an outbound call target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub scheme: Scheme,
    pub host: String,
    pub port: u16,
    /// Request path, always beginning with `/`
    pub path: String,
}

impl Destination {
    /// Build a destination with an explicit port
    pub fn new(scheme: Scheme, host: impl Into<String>, port: u16, path: &str) -> Self {
        Destination {
            scheme,
            host: host.into(),
            port,
            path: normalize_path(path),
        }
    }

    /// Build a destination on the scheme's default port
    pub fn with_default_port(scheme: Scheme, host: impl Into<String>, path: &str) -> Self {
        let port = scheme.default_port();
        Destination::new(scheme, host, port, path)
    }

    /// Parse `scheme://host[:port][/path]`.
    ///
    /// The port defaults from the scheme and the path defaults to `/`.
    /// Anything after the authority is taken verbatim as the path.
    pub fn parse(url: &str) -> Result<Self> {
        let (scheme_str, rest) = url
            .split_once("://")
            .with_context(|| format!("missing scheme in `{}`", url))?;

        let scheme = match scheme_str {
            "http" => Scheme::Http,
            "https" => Scheme::Https,
            other => bail!("unsupported scheme `{}`", other),
        };

        let (authority, path) = match rest.find('/') {
            Some(index) => (&rest[..index], &rest[index..]),
            None => (rest, "/"),
        };

        let (host, port) = match authority.split_once(':') {
            Some((host, port_str)) => {
                let port: u16 = port_str
                    .parse()
                    .with_context(|| format!("invalid port `{}`", port_str))?;
                (host, port)
            }
            None => (authority, scheme.default_port()),
        };

        if host.is_empty() {
            bail!("missing host in `{}`", url);
        }

        Ok(Destination::new(scheme, host, port, path))
    }

    /// Whether the port is the scheme default and is elided from names
    pub fn is_default_port(&self) -> bool {
        self.port == self.scheme.default_port()
    }

    /// Render the segment name: `External/<host>[:<port>]/<path>`
    pub fn external_name(&self) -> String {
        if self.is_default_port() {
            format!("{}/{}{}", EXTERNAL_PREFIX, self.host, self.path)
        } else {
            format!("{}/{}:{}{}", EXTERNAL_PREFIX, self.host, self.port, self.path)
        }
    }
}

fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}
