//! Streamgate-Common: Shared types and guards.
//!
//! This crate provides the pieces of streamgate that have no async or HTTP
//! dependencies:
//!
//! - **Stream IDs**: Reversible, path-safe encoding of raw stream addresses
//! - **Path Guard**: Lexical resolution of request paths under the served root
//! - **Error Handling**: The error taxonomy shared by the tuner and the server
//!
//! # Examples
//!
//! ```
//! use streamgate_common::{StreamAddress, StreamId};
//!
//! let address = StreamAddress::new("rtp://@239.0.0.1:1234");
//! let id = StreamId::encode(&address);
//! assert_eq!(id.decode().unwrap(), address);
//! ```

pub mod error;
pub mod ids;
pub mod paths;

pub use error::{Error, Result};
pub use ids::*;
pub use paths::{PathResolver, Resolved};
