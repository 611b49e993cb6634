//! Client session state and the reducer over bridge frames.

use crate::protocol::ServerMessage;
use crate::render::{self, Ingest};

pub const CLOSED_NOTICE: &str = "\nConnection closed.\n";
pub const PARSE_FAILURE: &str = "Failed to parse server message";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionState {
    pub is_connected: bool,
    pub is_connecting: bool,
    pub error: Option<String>,
    /// Raw transcript. Styling is resolved by [`render::render_markup`].
    pub output: String,
    pub session_id: Option<String>,
    /// `user@host` of the last remote prompt seen.
    pub remote_prompt: Option<String>,
}

/// What a state transition changed, for front-ends that redraw incrementally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SessionUpdate {
    Connected { session_id: Option<String> },
    Output(Ingest),
    Error(String),
    Disconnected,
    /// The socket went away without a `disconnected` frame.
    TransportClosed,
}

impl SessionState {
    pub fn is_busy(&self) -> bool {
        self.is_connected || self.is_connecting
    }

    pub fn begin_connect(&mut self, silent: bool) {
        self.is_connecting = true;
        self.error = None;
        if !silent {
            self.output.clear();
            self.remote_prompt = None;
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) -> SessionUpdate {
        let message = message.into();
        self.error = Some(message.clone());
        self.is_connecting = false;
        SessionUpdate::Error(message)
    }

    pub fn parse_failure(&mut self) -> SessionUpdate {
        self.error = Some(PARSE_FAILURE.to_string());
        SessionUpdate::Error(PARSE_FAILURE.to_string())
    }

    pub fn apply(&mut self, message: ServerMessage) -> SessionUpdate {
        match message {
            ServerMessage::Connected { session_id } => {
                self.is_connected = true;
                self.is_connecting = false;
                if session_id.is_some() {
                    self.session_id = session_id.clone();
                }
                SessionUpdate::Connected { session_id }
            }
            ServerMessage::Output { data } => {
                let ingest = render::ingest(&mut self.output, &data);
                if let Some(prompt) = render::prompt_identity(&data) {
                    self.remote_prompt = Some(prompt);
                }
                SessionUpdate::Output(ingest)
            }
            ServerMessage::Error { data } => self.fail(data),
            ServerMessage::Disconnected => {
                self.is_connected = false;
                self.is_connecting = false;
                self.output.push_str(CLOSED_NOTICE);
                SessionUpdate::Disconnected
            }
        }
    }

    pub fn transport_closed(&mut self) -> SessionUpdate {
        if !self.is_connected {
            self.is_connecting = false;
        }
        self.is_connected = false;
        SessionUpdate::TransportClosed
    }

    pub fn reset(&mut self) {
        *self = SessionState::default();
    }

    pub fn clear_output(&mut self) {
        self.output.clear();
    }
}
