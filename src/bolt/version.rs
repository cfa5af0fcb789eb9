//! Server software versions.
//!
//! Not the protocol version: this is the server build advertised in the
//! INIT SUCCESS metadata as `server: "Neo4j/3.2.0"`. The connection parses
//! it to decide whether byte arrays may be sent.

use std::fmt;

/// A parsed server version, ordered numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ServerVersion {
    /// Major version
    pub major: u32,
    /// Minor version
    pub minor: u32,
    /// Patch version
    pub patch: u32,
}

impl ServerVersion {
    /// First server version that understands PackStream byte arrays.
    pub const FIRST_WITH_BYTE_ARRAYS: ServerVersion = ServerVersion::new(3, 2, 0);

    /// Create a version from its components.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse a server agent string of the form `"name/M.m.p"`.
    ///
    /// The name prefix is optional, the patch component defaults to zero,
    /// and pre-release suffixes (`"3.2.0-alpha01"`) are ignored. Returns
    /// `None` when no `major.minor` pair can be read.
    pub fn from_agent(agent: &str) -> Option<Self> {
        let version = agent.rsplit('/').next()?;
        let mut parts = version.split('.');

        let major = leading_number(parts.next()?)?;
        let minor = leading_number(parts.next()?)?;
        let patch = parts.next().and_then(leading_number).unwrap_or(0);

        Some(Self::new(major, minor, patch))
    }

    /// Whether this server accepts byte-array values.
    pub fn supports_byte_arrays(&self) -> bool {
        *self >= Self::FIRST_WITH_BYTE_ARRAYS
    }
}

impl fmt::Display for ServerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

fn leading_number(part: &str) -> Option<u32> {
    let digits: &str = part
        .split_once(|c: char| !c.is_ascii_digit())
        .map(|(head, _)| head)
        .unwrap_or(part);
    digits.parse().ok()
}
