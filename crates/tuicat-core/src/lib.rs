pub mod client;
pub mod credentials;
pub mod error;
pub mod protocol;
pub mod render;
pub mod session;
pub mod shell;
pub mod storage;

pub use client::{BridgeLocator, HttpLocator, SessionClient, StaticLocator};
pub use credentials::CredentialCache;
pub use error::{CoreError, SessionError};
pub use protocol::{ClientMessage, ProtocolError, ServerMessage, SshCredentials};
pub use render::{ingest, plain_text, render_markup, styled_lines, Ingest, StyledRun, TextStyle};
pub use session::{SessionState, SessionUpdate};
pub use shell::{Completion, LocalShell, ShellEffect, ShellResponse};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
