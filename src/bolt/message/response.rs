//! Bolt v1 response messages (server to client).

use std::collections::HashMap;

use super::signature;
use crate::bolt::error::BoltError;
use crate::bolt::packstream::{Structure, Value};

/// All Bolt v1 response messages.
#[derive(Debug, Clone)]
pub enum BoltResponse {
    /// SUCCESS - the request completed
    Success(SuccessMessage),
    /// RECORD - one result record; zero or more precede a terminal
    Record(RecordMessage),
    /// FAILURE - the request failed
    Failure(FailureMessage),
    /// IGNORED - the request was dropped because of an earlier failure
    Ignored(IgnoredMessage),
}

impl BoltResponse {
    /// The message signature byte.
    pub fn signature(&self) -> u8 {
        match self {
            BoltResponse::Success(_) => signature::SUCCESS,
            BoltResponse::Record(_) => signature::RECORD,
            BoltResponse::Failure(_) => signature::FAILURE,
            BoltResponse::Ignored(_) => signature::IGNORED,
        }
    }

    /// The message name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            BoltResponse::Success(_) => "SUCCESS",
            BoltResponse::Record(_) => "RECORD",
            BoltResponse::Failure(_) => "FAILURE",
            BoltResponse::Ignored(_) => "IGNORED",
        }
    }

    /// Whether this message settles the current request.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, BoltResponse::Record(_))
    }

    /// Parse a decoded message envelope.
    ///
    /// Any signature outside the four response kinds is a protocol
    /// violation and poisons the connection.
    pub fn from_structure(s: Structure) -> Result<Self, BoltError> {
        match s.signature {
            signature::SUCCESS => Ok(BoltResponse::Success(SuccessMessage {
                metadata: single_map_field(s.fields, "SUCCESS")?,
            })),
            signature::RECORD => Ok(BoltResponse::Record(RecordMessage {
                fields: single_list_field(s.fields, "RECORD")?,
            })),
            signature::FAILURE => {
                let metadata = single_map_field(s.fields, "FAILURE")?;
                Ok(BoltResponse::Failure(FailureMessage::from_metadata(
                    metadata,
                )))
            }
            signature::IGNORED => Ok(BoltResponse::Ignored(IgnoredMessage {
                metadata: optional_map_field(s.fields, "IGNORED")?,
            })),
            other => Err(BoltError::protocol(format!(
                "unknown response signature 0x{:02X}",
                other
            ))),
        }
    }
}

/// SUCCESS: the request completed; carries response metadata.
#[derive(Debug, Clone)]
pub struct SuccessMessage {
    /// Response metadata
    pub metadata: HashMap<String, Value>,
}

impl SuccessMessage {
    /// A SUCCESS with the given metadata.
    pub fn new(metadata: HashMap<String, Value>) -> Self {
        Self { metadata }
    }

    /// Look up a metadata entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// The server agent string from an INIT response.
    pub fn server(&self) -> Option<&str> {
        self.metadata.get("server").and_then(|v| v.as_str())
    }

    /// The column names from a RUN response.
    pub fn fields(&self) -> Option<Vec<&str>> {
        self.metadata
            .get("fields")
            .and_then(|v| v.as_list())
            .map(|list| list.iter().filter_map(|v| v.as_str()).collect())
    }
}

/// RECORD: the values of one result row.
#[derive(Debug, Clone)]
pub struct RecordMessage {
    /// Row values, one per column
    pub fields: Vec<Value>,
}

/// FAILURE: the request failed; carries a code and a message.
#[derive(Debug, Clone)]
pub struct FailureMessage {
    /// Structured failure code, e.g. `"Neo.ClientError.Statement.SyntaxError"`
    pub code: String,
    /// Human-readable description
    pub message: String,
}

impl FailureMessage {
    /// Build from FAILURE metadata, tolerating absent keys.
    pub fn from_metadata(metadata: HashMap<String, Value>) -> Self {
        let code = metadata
            .get("code")
            .and_then(|v| v.as_str())
            .unwrap_or("Neo.DatabaseError.General.UnknownError")
            .to_string();
        let message = metadata
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("the server reported a failure without a message")
            .to_string();
        Self { code, message }
    }
}

/// IGNORED: the request was dropped while the server awaits ACK_FAILURE.
#[derive(Debug, Clone)]
pub struct IgnoredMessage {
    /// Payload metadata; usually empty
    pub metadata: HashMap<String, Value>,
}

fn single_map_field(
    fields: Vec<Value>,
    what: &str,
) -> Result<HashMap<String, Value>, BoltError> {
    match <[Value; 1]>::try_from(fields) {
        Ok([Value::Map(map)]) => Ok(map),
        Ok([other]) => Err(BoltError::protocol(format!(
            "{} payload must be a map, got {}",
            what,
            other.type_name()
        ))),
        Err(fields) => Err(BoltError::protocol(format!(
            "{} carries one field, got {}",
            what,
            fields.len()
        ))),
    }
}

fn optional_map_field(
    fields: Vec<Value>,
    what: &str,
) -> Result<HashMap<String, Value>, BoltError> {
    if fields.is_empty() {
        return Ok(HashMap::new());
    }
    single_map_field(fields, what)
}

fn single_list_field(fields: Vec<Value>, what: &str) -> Result<Vec<Value>, BoltError> {
    match <[Value; 1]>::try_from(fields) {
        Ok([Value::List(list)]) => Ok(list),
        Ok([other]) => Err(BoltError::protocol(format!(
            "{} payload must be a list, got {}",
            what,
            other.type_name()
        ))),
        Err(fields) => Err(BoltError::protocol(format!(
            "{} carries one field, got {}",
            what,
            fields.len()
        ))),
    }
}
