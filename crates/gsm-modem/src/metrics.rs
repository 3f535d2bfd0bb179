//! Modem activity metrics

use modem_telemetry::{Counter, Gauge, Histogram, MetricsSnapshot};

/// Counters for one modem session
pub struct ModemMetrics {
    pub commands_written: Counter,
    pub command_errors: Counter,
    pub timeouts: Counter,
    pub sms_sent: Counter,
    pub sms_received: Counter,
    pub status_reports: Counter,
    pub calls_dialled: Counter,
    pub calls_received: Counter,
    pub ussd_sessions: Counter,
    pub active_calls: Gauge,
    /// Command round-trip time in milliseconds
    pub command_latency_ms: Histogram,
}

impl Default for ModemMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ModemMetrics {
    pub fn new() -> Self {
        Self {
            commands_written: Counter::new("commands_written"),
            command_errors: Counter::new("command_errors"),
            timeouts: Counter::new("timeouts"),
            sms_sent: Counter::new("sms_sent"),
            sms_received: Counter::new("sms_received"),
            status_reports: Counter::new("status_reports"),
            calls_dialled: Counter::new("calls_dialled"),
            calls_received: Counter::new("calls_received"),
            ussd_sessions: Counter::new("ussd_sessions"),
            active_calls: Gauge::new("active_calls"),
            command_latency_ms: Histogram::with_capacity("command_latency_ms", 1024),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot::default()
            .counter(&self.commands_written)
            .counter(&self.command_errors)
            .counter(&self.timeouts)
            .counter(&self.sms_sent)
            .counter(&self.sms_received)
            .counter(&self.status_reports)
            .counter(&self.calls_dialled)
            .counter(&self.calls_received)
            .counter(&self.ussd_sessions)
            .gauge(&self.active_calls)
            .histogram(&self.command_latency_ms)
    }
}
