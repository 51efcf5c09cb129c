//! Command Records
//!
//! One line per mutation, space separated:
//!
//! ```text
//! SET <key> <value> <type_tag> <expire_at_ms_or_0>
//! DELETE <key>
//! CLEANUP
//! ```
//!
//! Keys and values are percent-encoded so every field is free of spaces and
//! newlines; an empty value is an empty field.

use std::fmt;

use thiserror::Error;

use crate::cache::{TaggedValue, TypeTag};

const OP_SET: &str = "SET";
const OP_DELETE: &str = "DELETE";
const OP_CLEANUP: &str = "CLEANUP";

// == Command ==
/// A single parsed log record.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Set {
        key: String,
        value: TaggedValue,
        expire_at: Option<u64>,
    },
    Delete {
        key: String,
    },
    Cleanup,
}

/// Reasons a log line is skipped during load.
#[derive(Debug, Error, PartialEq)]
pub enum ParseError {
    #[error("empty record")]
    Empty,

    #[error("unknown operation {0:?}")]
    UnknownOp(String),

    #[error("{op} expects {expected} fields, found {found}")]
    FieldCount {
        op: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("field {0:?} is not valid percent-encoded UTF-8")]
    Encoding(String),

    #[error("unknown type tag {0:?}")]
    TypeTag(String),

    #[error("value {value:?} is not a valid {tag}")]
    Value { value: String, tag: TypeTag },

    #[error("invalid expiry {0:?}")]
    Expiry(String),
}

impl Command {
    pub fn set(key: impl Into<String>, value: TaggedValue, expire_at: Option<u64>) -> Self {
        Command::Set {
            key: key.into(),
            value,
            expire_at,
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Command::Delete { key: key.into() }
    }

    pub fn op(&self) -> &'static str {
        match self {
            Command::Set { .. } => OP_SET,
            Command::Delete { .. } => OP_DELETE,
            Command::Cleanup => OP_CLEANUP,
        }
    }

    // == Parse ==
    /// Parses one record line (without its trailing newline).
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        if line.trim().is_empty() {
            return Err(ParseError::Empty);
        }

        let fields: Vec<&str> = line.split(' ').collect();
        let expect = |op: &'static str, expected: usize| {
            if fields.len() == expected {
                Ok(())
            } else {
                Err(ParseError::FieldCount {
                    op,
                    expected,
                    found: fields.len(),
                })
            }
        };

        match fields[0] {
            OP_SET => {
                expect(OP_SET, 5)?;
                let key = decode_text(fields[1])?;
                let tag = fields[3]
                    .parse::<u8>()
                    .ok()
                    .and_then(TypeTag::from_code)
                    .ok_or_else(|| ParseError::TypeTag(fields[3].to_string()))?;
                let value = decode_value(fields[2], tag)?;
                let expire_at = match fields[4].parse::<u64>() {
                    Ok(0) => None,
                    Ok(ts) => Some(ts),
                    Err(_) => return Err(ParseError::Expiry(fields[4].to_string())),
                };
                Ok(Command::Set {
                    key,
                    value,
                    expire_at,
                })
            }
            OP_DELETE => {
                expect(OP_DELETE, 2)?;
                Ok(Command::Delete {
                    key: decode_text(fields[1])?,
                })
            }
            OP_CLEANUP => {
                expect(OP_CLEANUP, 1)?;
                Ok(Command::Cleanup)
            }
            other => Err(ParseError::UnknownOp(other.to_string())),
        }
    }
}

// == Encode ==
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Set {
                key,
                value,
                expire_at,
            } => write!(
                f,
                "{} {} {} {} {}",
                OP_SET,
                urlencoding::encode(key),
                encode_value(value),
                value.type_tag().code(),
                expire_at.unwrap_or(0)
            ),
            Command::Delete { key } => write!(f, "{} {}", OP_DELETE, urlencoding::encode(key)),
            Command::Cleanup => f.write_str(OP_CLEANUP),
        }
    }
}

fn encode_value(value: &TaggedValue) -> String {
    match value {
        TaggedValue::Int(n) => n.to_string(),
        TaggedValue::Uint(n) => n.to_string(),
        TaggedValue::Float(v) => urlencoding::encode(&v.to_string()).into_owned(),
        TaggedValue::Str(s) => urlencoding::encode(s).into_owned(),
        TaggedValue::Obj(bytes) => urlencoding::encode_binary(bytes).into_owned(),
    }
}

fn decode_text(field: &str) -> Result<String, ParseError> {
    urlencoding::decode(field)
        .map(|s| s.into_owned())
        .map_err(|_| ParseError::Encoding(field.to_string()))
}

fn decode_value(field: &str, tag: TypeTag) -> Result<TaggedValue, ParseError> {
    let invalid = || ParseError::Value {
        value: field.to_string(),
        tag,
    };
    match tag {
        TypeTag::Int => field.parse().map(TaggedValue::Int).map_err(|_| invalid()),
        TypeTag::Uint => field.parse().map(TaggedValue::Uint).map_err(|_| invalid()),
        TypeTag::Float => decode_text(field)?
            .parse()
            .map(TaggedValue::Float)
            .map_err(|_| invalid()),
        TypeTag::String => decode_text(field).map(TaggedValue::Str),
        TypeTag::Obj => Ok(TaggedValue::Obj(
            urlencoding::decode_binary(field.as_bytes()).into_owned(),
        )),
    }
}
