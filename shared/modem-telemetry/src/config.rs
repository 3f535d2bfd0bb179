//! Telemetry Configuration

use serde::{Deserialize, Serialize};

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub service_name: String,
    pub log_level: String,
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "gsm-modem".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self {
            service_name: std::env::var("SERVICE_NAME")
                .unwrap_or_else(|_| "gsm-modem".to_string()),
            log_level: std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info".to_string()),
            json_logs: std::env::var("JSON_LOGS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    /// Raise the log level to `debug` for the modem crates (used by `--debug` flags)
    pub fn with_debug(mut self, debug: bool) -> Self {
        if debug {
            self.log_level = "gsm_modem=debug,gsm_tools=debug,info".to_string();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_debug_overrides_level() {
        let config = TelemetryConfig::default().with_debug(true);
        assert!(config.log_level.contains("gsm_modem=debug"));

        let config = TelemetryConfig::default().with_debug(false);
        assert_eq!(config.log_level, "info");
    }
}
