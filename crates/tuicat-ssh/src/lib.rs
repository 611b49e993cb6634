pub mod client;
pub mod config;

pub use client::{ShellEvent, SshClient, SshSession, SshShell};
pub use config::{AuthMethod, HostKeyPolicy, SshConnectConfig};
