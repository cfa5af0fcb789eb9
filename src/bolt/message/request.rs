//! Bolt v1 request messages (client to server).

use std::collections::HashMap;
use std::fmt;

use super::signature;
use crate::bolt::packstream::{Structure, Value};

/// Credentials passed opaquely to the server inside INIT.
#[derive(Clone)]
pub struct AuthToken {
    /// Authentication scheme (`"basic"`, `"none"`, ...)
    pub scheme: String,
    /// Principal (username)
    pub principal: Option<String>,
    /// Credentials (password). Redacted from `Debug` output.
    pub credentials: Option<String>,
    /// Authentication realm
    pub realm: Option<String>,
    /// Extra scheme-specific entries
    pub parameters: HashMap<String, Value>,
}

impl AuthToken {
    /// Basic username/password authentication.
    pub fn basic(principal: impl Into<String>, credentials: impl Into<String>) -> Self {
        Self {
            scheme: "basic".to_string(),
            principal: Some(principal.into()),
            credentials: Some(credentials.into()),
            realm: None,
            parameters: HashMap::new(),
        }
    }

    /// No authentication.
    pub fn none() -> Self {
        Self {
            scheme: "none".to_string(),
            principal: None,
            credentials: None,
            realm: None,
            parameters: HashMap::new(),
        }
    }

    /// A token with an arbitrary scheme and parameters.
    pub fn custom(
        scheme: impl Into<String>,
        principal: Option<String>,
        credentials: Option<String>,
        realm: Option<String>,
        parameters: HashMap<String, Value>,
    ) -> Self {
        Self {
            scheme: scheme.into(),
            principal,
            credentials,
            realm,
            parameters,
        }
    }

    /// Set the realm.
    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// Serialize into the INIT credential map.
    pub fn into_map(self) -> HashMap<String, Value> {
        let mut map = self.parameters;
        map.insert("scheme".to_string(), Value::String(self.scheme));
        if let Some(principal) = self.principal {
            map.insert("principal".to_string(), Value::String(principal));
        }
        if let Some(credentials) = self.credentials {
            map.insert("credentials".to_string(), Value::String(credentials));
        }
        if let Some(realm) = self.realm {
            map.insert("realm".to_string(), Value::String(realm));
        }
        map
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthToken")
            .field("scheme", &self.scheme)
            .field("principal", &self.principal)
            .field("credentials", &self.credentials.as_ref().map(|_| "***"))
            .field("realm", &self.realm)
            .finish_non_exhaustive()
    }
}

/// INIT: authenticate and name the client.
#[derive(Debug, Clone)]
pub struct InitMessage {
    /// Client name and version, e.g. `"GraphBolt/0.1.0"`
    pub user_agent: String,
    /// Opaque credential bundle
    pub auth_token: AuthToken,
}

impl InitMessage {
    /// Create an INIT message.
    pub fn new(user_agent: impl Into<String>, auth_token: AuthToken) -> Self {
        Self {
            user_agent: user_agent.into(),
            auth_token,
        }
    }
}

/// RUN: execute a statement with parameters.
#[derive(Debug, Clone)]
pub struct RunMessage {
    /// The statement text
    pub statement: String,
    /// Statement parameters
    pub parameters: HashMap<String, Value>,
}

impl RunMessage {
    /// Create a RUN message.
    pub fn new(statement: impl Into<String>, parameters: HashMap<String, Value>) -> Self {
        Self {
            statement: statement.into(),
            parameters,
        }
    }
}

/// All Bolt v1 request messages.
#[derive(Debug, Clone)]
pub enum BoltRequest {
    /// INIT - authenticate and name the client
    Init(InitMessage),
    /// RUN - execute a statement
    Run(RunMessage),
    /// PULL_ALL - stream all pending records
    PullAll,
    /// DISCARD_ALL - drop all pending records
    DiscardAll,
    /// ACK_FAILURE - acknowledge a server failure
    AckFailure,
    /// RESET - discard all in-flight work and clear failures
    Reset,
}

impl BoltRequest {
    /// The message signature byte.
    pub fn signature(&self) -> u8 {
        match self {
            BoltRequest::Init(_) => signature::INIT,
            BoltRequest::Run(_) => signature::RUN,
            BoltRequest::PullAll => signature::PULL_ALL,
            BoltRequest::DiscardAll => signature::DISCARD_ALL,
            BoltRequest::AckFailure => signature::ACK_FAILURE,
            BoltRequest::Reset => signature::RESET,
        }
    }

    /// The message name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            BoltRequest::Init(_) => "INIT",
            BoltRequest::Run(_) => "RUN",
            BoltRequest::PullAll => "PULL_ALL",
            BoltRequest::DiscardAll => "DISCARD_ALL",
            BoltRequest::AckFailure => "ACK_FAILURE",
            BoltRequest::Reset => "RESET",
        }
    }

    /// Convert into the PackStream structure that goes on the wire.
    pub fn into_structure(self) -> Structure {
        let signature = self.signature();
        let fields = match self {
            BoltRequest::Init(init) => vec![
                Value::String(init.user_agent),
                Value::Map(init.auth_token.into_map()),
            ],
            BoltRequest::Run(run) => vec![
                Value::String(run.statement),
                Value::Map(run.parameters),
            ],
            BoltRequest::PullAll
            | BoltRequest::DiscardAll
            | BoltRequest::AckFailure
            | BoltRequest::Reset => vec![],
        };
        Structure::new(signature, fields)
    }
}
