//! RESP Value Model
//!
//! Decoded RESP values as the splitter sees them. The wire codec lives in
//! the protocol front-end; this module only builds and inspects value
//! trees.
//!
//! ## Example
//!
//! ```
//! use flashsplit::protocol::RespValue;
//! use bytes::Bytes;
//!
//! let command = RespValue::command(["MGET", "a", "b"]);
//! assert_eq!(command.as_array().map(|a| a.len()), Some(3));
//!
//! let reply = RespValue::bulk_string(Bytes::from("Ariz"));
//! assert_eq!(reply.as_str(), Some("Ariz"));
//! ```

pub mod types;

pub use types::{RespValue, OK};
