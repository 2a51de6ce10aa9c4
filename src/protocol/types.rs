//! RESP (Redis Serialization Protocol) Value Tree
//!
//! This module defines the decoded form of RESP values as they travel
//! through the splitter. Frames are parsed and serialized by the
//! front-end codec; the splitter only builds and inspects trees.
//!
//! ## Variants
//!
//! - Simple String: `+OK`
//! - Error: `-upstream failure`
//! - Integer: `:1000`
//! - Bulk String: `$5 hello`
//! - Array: `*2 [$3 GET, $4 name]`
//! - Null: `$-1`

use bytes::Bytes;
use std::fmt;

/// The canonical acknowledgement text.
pub const OK: &str = "OK";

/// Represents a value in the RESP protocol.
///
/// Used both for incoming client commands (always an array of bulk
/// strings once validated) and for replies coming back from shards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// Non-binary safe status reply, e.g. `OK`.
    SimpleString(String),

    /// Error reply. The message is sent verbatim to the client.
    Error(String),

    /// 64-bit signed integers.
    Integer(i64),

    /// Binary-safe string.
    BulkString(Bytes),

    /// Null value (null bulk string or null array)
    Null,

    /// Arrays can contain any RESP type, including nested arrays.
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Creates a new simple string value.
    ///
    /// # Example
    /// ```
    /// use flashsplit::protocol::types::RespValue;
    /// let ok = RespValue::simple_string("OK");
    /// ```
    pub fn simple_string(s: impl Into<String>) -> Self {
        RespValue::SimpleString(s.into())
    }

    /// Creates a new error value.
    ///
    /// # Example
    /// ```
    /// use flashsplit::protocol::types::RespValue;
    /// let err = RespValue::error("upstream failure");
    /// assert!(err.is_error());
    /// ```
    pub fn error(s: impl Into<String>) -> Self {
        RespValue::Error(s.into())
    }

    /// Creates a new integer value.
    pub fn integer(n: i64) -> Self {
        RespValue::Integer(n)
    }

    /// Creates a new bulk string value.
    ///
    /// # Example
    /// ```
    /// use flashsplit::protocol::types::RespValue;
    /// use bytes::Bytes;
    /// let bulk = RespValue::bulk_string(Bytes::from("hello"));
    /// assert_eq!(bulk.as_bulk(), Some(&b"hello"[..]));
    /// ```
    pub fn bulk_string(data: impl Into<Bytes>) -> Self {
        RespValue::BulkString(data.into())
    }

    /// Creates a null value.
    pub fn null() -> Self {
        RespValue::Null
    }

    /// Creates an array value.
    pub fn array(values: Vec<RespValue>) -> Self {
        RespValue::Array(values)
    }

    /// Builds a command array out of bulk strings.
    ///
    /// # Example
    /// ```
    /// use flashsplit::protocol::types::RespValue;
    /// let cmd = RespValue::command(["get", "name"]);
    /// assert_eq!(cmd.as_array().map(|a| a.len()), Some(2));
    /// ```
    pub fn command<I, T>(parts: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Bytes>,
    {
        RespValue::Array(
            parts
                .into_iter()
                .map(|p| RespValue::BulkString(p.into()))
                .collect(),
        )
    }

    /// Common reply for successful writes
    pub fn ok() -> Self {
        RespValue::SimpleString(OK.to_string())
    }

    /// Returns true if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, RespValue::Null)
    }

    /// Returns true if this value is an error.
    pub fn is_error(&self) -> bool {
        matches!(self, RespValue::Error(_))
    }

    /// Returns true if this value is the `OK` status reply.
    pub fn is_ok(&self) -> bool {
        matches!(self, RespValue::SimpleString(s) if s == OK)
    }

    /// Attempts to extract the inner string from SimpleString or BulkString.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RespValue::SimpleString(s) => Some(s),
            RespValue::BulkString(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    /// Attempts to extract the inner bytes from BulkString.
    pub fn as_bulk(&self) -> Option<&[u8]> {
        match self {
            RespValue::BulkString(b) => Some(b),
            _ => None,
        }
    }

    /// Attempts to extract the inner integer.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            RespValue::Integer(n) => Some(*n),
            _ => None,
        }
    }

    /// Attempts to extract the inner array.
    pub fn as_array(&self) -> Option<&[RespValue]> {
        match self {
            RespValue::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// Consumes self and returns the inner array if this is an Array variant.
    pub fn into_array(self) -> Option<Vec<RespValue>> {
        match self {
            RespValue::Array(arr) => Some(arr),
            _ => None,
        }
    }
}

/// Single-line rendering used in log lines, e.g. `["get", "a"]`.
impl fmt::Display for RespValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RespValue::SimpleString(s) => write!(f, "\"{}\"", s),
            RespValue::Error(s) => write!(f, "\"{}\"", s),
            RespValue::Integer(n) => write!(f, "{}", n),
            RespValue::BulkString(data) => match std::str::from_utf8(data) {
                Ok(s) => write!(f, "\"{}\"", s),
                Err(_) => write!(f, "<{} bytes>", data.len()),
            },
            RespValue::Null => write!(f, "null"),
            RespValue::Array(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let value = RespValue::command(["GET", "name"]);
        assert_eq!(
            value,
            RespValue::array(vec![
                RespValue::bulk_string(Bytes::from("GET")),
                RespValue::bulk_string(Bytes::from("name")),
            ])
        );
    }

    #[test]
    fn test_ok_detection() {
        assert!(RespValue::ok().is_ok());
        assert!(!RespValue::simple_string("PONG").is_ok());
        assert!(!RespValue::bulk_string(Bytes::from("OK")).is_ok());
    }

    #[test]
    fn test_accessors() {
        assert_eq!(RespValue::integer(7).as_integer(), Some(7));
        assert_eq!(RespValue::null().as_integer(), None);
        assert_eq!(RespValue::bulk_string("k").as_bulk(), Some(&b"k"[..]));
        assert_eq!(RespValue::simple_string("k").as_bulk(), None);
        assert_eq!(RespValue::bulk_string("k").as_str(), Some("k"));
    }

    #[test]
    fn test_display_is_single_line() {
        let value = RespValue::array(vec![
            RespValue::bulk_string(Bytes::from("mget")),
            RespValue::integer(3),
            RespValue::null(),
            RespValue::array(vec![RespValue::error("upstream failure")]),
        ]);
        assert_eq!(
            value.to_string(),
            r#"["mget", 3, null, ["upstream failure"]]"#
        );
    }

    #[test]
    fn test_display_binary_bulk() {
        let value = RespValue::bulk_string(Bytes::from_static(&[0xff, 0xfe]));
        assert_eq!(value.to_string(), "<2 bytes>");
    }
}
