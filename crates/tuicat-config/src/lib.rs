pub mod paths;
pub mod settings;

pub use paths::AppPaths;
pub use settings::{
    AppConfig, AppConfigLayer, BridgeConfig, BridgeConfigLayer, ClientConfig, ClientConfigLayer,
    ConfigError, ConfigManager, HostKeyPolicyKind, LoggingConfig, LoggingConfigLayer,
    WEBSOCKET_URL_ENV,
};
