//! Layered settings: defaults, an optional TOML file, then `RDTWATCH_*`
//! environment variables.
//!
//! # Example file
//!
//! ```toml
//! api_url = "http://localhost:8000"
//! ws_url = "ws://localhost:8000/ws"
//!
//! [transfer]
//! protocol_mode = "go_back_n"
//! window_size = 16
//! packet_loss_rate = 0.05
//! ```
//!
//! Nested keys use `__` in the environment, e.g.
//! `RDTWATCH_TRANSFER__WINDOW_SIZE=32`.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use rdtwatch_types::{
    ClientConfig, DemoRequest, ProtocolMode, ReportRequest, ServerConfig, TransferRequest,
};

use crate::source::ControlError;

/// Accepted window sizes.
pub const WINDOW_SIZE_RANGE: std::ops::RangeInclusive<u32> = 1..=100;

/// Accepted retransmission timeouts, in seconds.
pub const TIMEOUT_RANGE: std::ops::RangeInclusive<f64> = 0.1..=10.0;

/// Accepted simulated loss rates.
pub const LOSS_RATE_RANGE: std::ops::RangeInclusive<f64> = 0.0..=0.5;

/// Everything the dashboard needs to reach and drive the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the HTTP API.
    pub api_url: String,
    /// URL of the push channel.
    pub ws_url: String,
    pub request_timeout_ms: u64,
    pub transfer: TransferSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:8000".to_string(),
            ws_url: "ws://localhost:8000/ws".to_string(),
            request_timeout_ms: 5000,
            transfer: TransferSettings::default(),
        }
    }
}

/// The operator's transfer parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferSettings {
    pub protocol_mode: ProtocolMode,
    pub window_size: u32,
    /// Base retransmission timeout, in seconds.
    pub timeout: f64,
    pub packet_loss_rate: f64,
    pub congestion_enabled: bool,
    /// Address the receiver binds to when started.
    pub bind_host: String,
    /// Receiver address the sender is pointed at.
    pub server_host: String,
    pub server_port: u16,
}

impl Default for TransferSettings {
    fn default() -> Self {
        Self {
            protocol_mode: ProtocolMode::SelectiveRepeat,
            window_size: 10,
            timeout: 1.0,
            packet_loss_rate: 0.1,
            congestion_enabled: true,
            bind_host: "0.0.0.0".to_string(),
            server_host: "localhost".to_string(),
            server_port: 5000,
        }
    }
}

impl Settings {
    /// Load settings, layering `path` (if given) and the environment over the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let config = builder
            .add_source(
                Environment::with_prefix("RDTWATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("failed to read settings")?;

        let settings: Settings = config
            .try_deserialize()
            .context("failed to parse settings")?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Check every value is inside its accepted range.
    pub fn validate(&self) -> Result<(), ControlError> {
        if self.request_timeout_ms == 0 {
            return Err(ControlError::Invalid(
                "request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        self.transfer.validate()
    }
}

impl TransferSettings {
    /// Check every value is inside its accepted range.
    pub fn validate(&self) -> Result<(), ControlError> {
        if !WINDOW_SIZE_RANGE.contains(&self.window_size) {
            return Err(ControlError::Invalid(format!(
                "window_size must be between {} and {}, got {}",
                WINDOW_SIZE_RANGE.start(),
                WINDOW_SIZE_RANGE.end(),
                self.window_size
            )));
        }
        if !TIMEOUT_RANGE.contains(&self.timeout) {
            return Err(ControlError::Invalid(format!(
                "timeout must be between {} and {} seconds, got {}",
                TIMEOUT_RANGE.start(),
                TIMEOUT_RANGE.end(),
                self.timeout
            )));
        }
        if !LOSS_RATE_RANGE.contains(&self.packet_loss_rate) {
            return Err(ControlError::Invalid(format!(
                "packet_loss_rate must be between {} and {}, got {}",
                LOSS_RATE_RANGE.start(),
                LOSS_RATE_RANGE.end(),
                self.packet_loss_rate
            )));
        }
        if self.server_port == 0 {
            return Err(ControlError::Invalid("server_port must not be 0".to_string()));
        }
        Ok(())
    }

    /// Body for starting the receiver.
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            host: self.bind_host.clone(),
            port: self.server_port,
            packet_loss_rate: self.packet_loss_rate,
            protocol_mode: self.protocol_mode,
            window_size: self.window_size,
        }
    }

    /// Body for configuring the sender.
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            server_host: self.server_host.clone(),
            server_port: self.server_port,
            protocol_mode: self.protocol_mode,
            window_size: self.window_size,
            timeout: self.timeout,
            packet_loss_rate: self.packet_loss_rate,
            congestion_enabled: self.congestion_enabled,
        }
    }

    /// Body for a raw-data transfer. `data_base64` of `None` asks for generated test data.
    pub fn transfer_request(&self, filename: &str, data_base64: Option<String>) -> TransferRequest {
        TransferRequest {
            filename: filename.to_string(),
            data_base64,
            protocol_mode: self.protocol_mode,
            window_size: self.window_size,
            packet_loss_rate: self.packet_loss_rate,
            congestion_enabled: self.congestion_enabled,
        }
    }

    /// Query for a transfer report. A `file_size` of zero lets the control
    /// plane fill in the bytes the sender reports.
    pub fn report_request(&self, filename: &str, file_size: u64) -> ReportRequest {
        ReportRequest {
            filename: filename.to_string(),
            file_size,
            protocol_mode: self.protocol_mode,
            window_size: self.window_size,
            packet_loss_rate: self.packet_loss_rate,
            congestion_enabled: self.congestion_enabled,
        }
    }

    /// Query for a demo run of `data_size` random bytes.
    pub fn demo_request(&self, data_size: u64) -> DemoRequest {
        DemoRequest {
            protocol: self.protocol_mode,
            window_size: self.window_size,
            packet_loss: self.packet_loss_rate,
            data_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn toml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.api_url, "http://localhost:8000");
        assert_eq!(settings.ws_url, "ws://localhost:8000/ws");
        assert_eq!(settings.request_timeout(), Duration::from_secs(5));
        assert_eq!(settings.transfer.protocol_mode, ProtocolMode::SelectiveRepeat);
        assert_eq!(settings.transfer.window_size, 10);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_load_file_overrides_defaults() {
        let file = toml_file(
            r#"
            api_url = "http://rdt.local:9000"

            [transfer]
            protocol_mode = "go_back_n"
            window_size = 16
            "#,
        );

        let settings = Settings::load(Some(file.path())).unwrap();
        assert_eq!(settings.api_url, "http://rdt.local:9000");
        assert_eq!(settings.ws_url, "ws://localhost:8000/ws");
        assert_eq!(settings.transfer.protocol_mode, ProtocolMode::GoBackN);
        assert_eq!(settings.transfer.window_size, 16);
        assert_eq!(settings.transfer.timeout, 1.0);
    }

    #[test]
    fn test_load_rejects_out_of_range_file() {
        let file = toml_file("[transfer]\nwindow_size = 500\n");
        let err = Settings::load(Some(file.path())).unwrap_err();
        assert!(err.to_string().contains("window_size"));
    }

    #[test]
    fn test_load_rejects_unknown_protocol() {
        let file = toml_file("[transfer]\nprotocol_mode = \"sliding\"\n");
        assert!(Settings::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_validate_bounds() {
        let mut transfer = TransferSettings::default();
        transfer.window_size = 0;
        assert!(transfer.validate().is_err());

        transfer.window_size = 100;
        transfer.timeout = 0.05;
        assert!(transfer.validate().is_err());

        transfer.timeout = 10.0;
        transfer.packet_loss_rate = 0.6;
        assert!(transfer.validate().is_err());

        transfer.packet_loss_rate = 0.5;
        assert!(transfer.validate().is_ok());
    }

    #[test]
    fn test_request_bodies_carry_settings() {
        let transfer = TransferSettings {
            protocol_mode: ProtocolMode::StopWait,
            window_size: 1,
            ..Default::default()
        };

        let server = transfer.server_config();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 5000);
        assert_eq!(server.protocol_mode, ProtocolMode::StopWait);

        let client = transfer.client_config();
        assert_eq!(client.server_host, "localhost");
        assert_eq!(client.window_size, 1);

        let request = transfer.transfer_request("data.bin", None);
        assert_eq!(request.filename, "data.bin");
        assert!(request.data_base64.is_none());
        assert!(request.congestion_enabled);

        let report = transfer.report_request("notes.txt", 0);
        assert_eq!(report.protocol_mode, ProtocolMode::StopWait);
        assert_eq!(report.packet_loss_rate, 0.1);

        let demo = transfer.demo_request(4096);
        assert_eq!(demo.protocol, ProtocolMode::StopWait);
        assert_eq!(demo.window_size, 1);
        assert_eq!(demo.data_size, 4096);
    }
}
