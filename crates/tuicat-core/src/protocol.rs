//! JSON frames exchanged between the terminal client and the bridge.
//!
//! Every frame is an object with a `type` discriminator. Frames whose `type`
//! is missing or unknown are not errors: both endpoints skip them so that
//! either side can grow new frame kinds without breaking the other.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_SSH_PORT: u16 = 22;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SshCredentials {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

impl SshCredentials {
    pub fn with_password(host: &str, username: &str, password: &str) -> Self {
        Self {
            host: host.to_string(),
            port: DEFAULT_SSH_PORT,
            username: username.to_string(),
            password: Some(password.to_string()),
            private_key: None,
        }
    }

    pub fn target(&self) -> String {
        format!("{}@{}", self.username, self.host)
    }
}

/// Frames sent by the client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Connect {
        host: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        port: Option<u16>,
        username: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
        #[serde(
            default,
            rename = "privateKey",
            skip_serializing_if = "Option::is_none"
        )]
        private_key: Option<String>,
    },
    Input {
        data: String,
    },
    Resize {
        #[serde(default)]
        cols: Option<u32>,
        #[serde(default)]
        rows: Option<u32>,
    },
    Disconnect,
}

impl ClientMessage {
    const KINDS: [&'static str; 4] = ["connect", "input", "resize", "disconnect"];

    pub fn connect(credentials: &SshCredentials) -> Self {
        let port = if credentials.port == 0 {
            DEFAULT_SSH_PORT
        } else {
            credentials.port
        };
        ClientMessage::Connect {
            host: credentials.host.clone(),
            port: Some(port),
            username: credentials.username.clone(),
            password: credentials.password.clone(),
            private_key: credentials.private_key.clone(),
        }
    }

    /// `Ok(None)` for well-formed JSON carrying an unknown or missing `type`.
    pub fn parse(text: &str) -> Result<Option<Self>, ProtocolError> {
        parse_known(text, &Self::KINDS)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Frames sent by the bridge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Connected {
        #[serde(
            default,
            rename = "sessionId",
            skip_serializing_if = "Option::is_none"
        )]
        session_id: Option<String>,
    },
    Output {
        data: String,
    },
    Error {
        data: String,
    },
    Disconnected,
}

impl ServerMessage {
    const KINDS: [&'static str; 4] = ["connected", "output", "error", "disconnected"];

    pub fn parse(text: &str) -> Result<Option<Self>, ProtocolError> {
        parse_known(text, &Self::KINDS)
    }

    pub fn to_json(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn error(data: impl Into<String>) -> Self {
        ServerMessage::Error { data: data.into() }
    }
}

fn parse_known<T: serde::de::DeserializeOwned>(
    text: &str,
    kinds: &[&str],
) -> Result<Option<T>, ProtocolError> {
    let value: Value = serde_json::from_str(text)?;
    let known = value
        .get("type")
        .and_then(Value::as_str)
        .map(|kind| kinds.contains(&kind))
        .unwrap_or(false);
    if !known {
        return Ok(None);
    }
    Ok(Some(serde_json::from_value(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_frame_uses_camel_case_key() {
        let creds = SshCredentials {
            host: "example.com".into(),
            port: 2222,
            username: "u".into(),
            password: None,
            private_key: Some("KEY".into()),
        };
        let json = ClientMessage::connect(&creds).to_json().unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "connect");
        assert_eq!(value["port"], 2222);
        assert_eq!(value["privateKey"], "KEY");
        assert!(value.get("password").is_none());
    }

    #[test]
    fn connect_without_port_defaults_on_credentials() {
        let creds: SshCredentials =
            serde_json::from_str(r#"{"host":"h","username":"u","password":"p"}"#).unwrap();
        assert_eq!(creds.port, 22);
    }

    #[test]
    fn unknown_and_untyped_frames_are_skipped() {
        assert_eq!(ClientMessage::parse(r#"{"type":"ping"}"#).unwrap(), None);
        assert_eq!(ClientMessage::parse(r#"{"data":"x"}"#).unwrap(), None);
        assert_eq!(ClientMessage::parse("42").unwrap(), None);
        assert_eq!(ServerMessage::parse(r#"{"type":"reconnected"}"#).unwrap(), None);
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(ClientMessage::parse("{not json").is_err());
        assert!(ClientMessage::parse(r#"{"type":"input"}"#).is_err());
        assert!(ClientMessage::parse(r#"{"type":"resize","cols":"wide"}"#).is_err());
    }

    #[test]
    fn resize_fields_are_optional() {
        let msg = ClientMessage::parse(r#"{"type":"resize","cols":120}"#)
            .unwrap()
            .unwrap();
        assert_eq!(
            msg,
            ClientMessage::Resize {
                cols: Some(120),
                rows: None
            }
        );
    }

    #[test]
    fn server_frames_serialize_flat() {
        let json = ServerMessage::Connected { session_id: None }.to_json().unwrap();
        assert_eq!(json, r#"{"type":"connected"}"#);
        let json = ServerMessage::Connected {
            session_id: Some("abc".into()),
        }
        .to_json()
        .unwrap();
        assert_eq!(json, r#"{"type":"connected","sessionId":"abc"}"#);
        let json = ServerMessage::Disconnected.to_json().unwrap();
        assert_eq!(json, r#"{"type":"disconnected"}"#);
    }
}
