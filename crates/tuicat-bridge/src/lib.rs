//! WebSocket to SSH bridge: one socket, one remote shell.

pub mod connection;
pub mod connector;
pub mod registry;
pub mod server;
pub mod utf8;

pub use connection::{serve_socket, BridgeState, Connection, FrameSink};
pub use connector::{
    ConnectRequest, OpenedShell, RemoteSession, RemoteShell, ShellConnector, ShellEvent,
    SshConnector,
};
pub use registry::{ConnectionRecord, ConnectionRegistry};
pub use server::{router, serve, serve_on, AppState};
