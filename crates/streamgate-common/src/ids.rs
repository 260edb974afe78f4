//! Stream addresses and their path-safe identifiers.
//!
//! A [`StreamAddress`] is the raw URL a pipeline acquires media from. A
//! [`StreamId`] is the URL-safe base64 image of that address, and doubles as
//! the name of the virtual directory the stream is served from.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// A raw stream address, such as `rtp://@239.0.0.1:1234` or an `https` page URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamAddress(String);

impl StreamAddress {
    pub fn new<S: Into<String>>(address: S) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The scheme, lowercased, if the address has the `scheme://` form.
    pub fn scheme(&self) -> Option<String> {
        let (scheme, _) = self.0.split_once("://")?;
        if scheme.is_empty() {
            return None;
        }
        Some(scheme.to_ascii_lowercase())
    }

    /// Text between `://` and the first `/`, `?` or `#` that follows it.
    pub fn authority(&self) -> Option<&str> {
        let (_, rest) = self.0.split_once("://")?;
        let end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        Some(&rest[..end])
    }
}

impl fmt::Display for StreamAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Path-safe identifier for a stream address.
///
/// Produced by [`StreamId::encode`]; anything else (such as a directory name
/// taken from a request path) is wrapped with [`StreamId::new`] and only
/// trusted once [`StreamId::decode`] succeeds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    /// Wrap an untrusted identifier string.
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Encode an address into its identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use streamgate_common::{StreamAddress, StreamId};
    ///
    /// let id = StreamId::encode(&StreamAddress::new("https://example.com/live"));
    /// assert_eq!(id.as_str(), "aHR0cHM6Ly9leGFtcGxlLmNvbS9saXZl");
    /// ```
    #[must_use]
    pub fn encode(address: &StreamAddress) -> Self {
        Self(URL_SAFE.encode(address.as_str().as_bytes()))
    }

    /// Decode the identifier back into its address.
    ///
    /// Fails with [`Error::Decode`] on anything that [`StreamId::encode`]
    /// could not have produced: bad alphabet, missing or misplaced padding,
    /// non-canonical trailing bits, non-UTF-8 payloads and the empty string.
    pub fn decode(&self) -> Result<StreamAddress> {
        if self.0.is_empty() {
            return Err(Error::decode("empty identifier"));
        }

        let bytes = URL_SAFE
            .decode(self.0.as_bytes())
            .map_err(|e| Error::decode(format!("{}: {}", self.0, e)))?;

        let address = String::from_utf8(bytes)
            .map_err(|_| Error::decode(format!("{}: not UTF-8", self.0)))?;

        Ok(StreamAddress(address))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
