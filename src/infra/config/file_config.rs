use std::path::PathBuf;

use serde::Deserialize;

use super::app_config::{AppConfig, LogConfig, ReconnectConfig, ServerConfig, TransportConfig};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub server: Option<FileServerConfig>,
    pub reconnect: Option<FileReconnectConfig>,
    pub transport: Option<FileTransportConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut AppConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(server) = self.server {
            server.merge_into(&mut config.server);
        }

        if let Some(reconnect) = self.reconnect {
            reconnect.merge_into(&mut config.reconnect);
        }

        if let Some(transport) = self.transport {
            transport.merge_into(&mut config.transport);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }

        if let Some(file) = self.file {
            config.file = Some(file);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileServerConfig {
    pub url: Option<String>,
}

impl FileServerConfig {
    fn merge_into(self, config: &mut ServerConfig) {
        if let Some(url) = self.url {
            config.url = url;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileReconnectConfig {
    pub max_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
}

impl FileReconnectConfig {
    fn merge_into(self, config: &mut ReconnectConfig) {
        if let Some(max_attempts) = self.max_attempts {
            config.max_attempts = max_attempts;
        }

        if let Some(retry_delay_ms) = self.retry_delay_ms {
            config.retry_delay_ms = retry_delay_ms;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileTransportConfig {
    pub handshake_timeout_ms: Option<u64>,
}

impl FileTransportConfig {
    fn merge_into(self, config: &mut TransportConfig) {
        if let Some(timeout_ms) = self.handshake_timeout_ms {
            config.handshake_timeout_ms = timeout_ms;
        }
    }
}
