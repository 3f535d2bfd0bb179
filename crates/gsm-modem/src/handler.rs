//! Event handler traits

use async_trait::async_trait;
use std::future::Future;

use crate::call::Call;
use crate::sms::{ReceivedSms, StatusReport};

/// Receives unsolicited modem events.
///
/// Every method defaults to doing nothing; implement the ones you need.
/// Handlers run on their own task, so they may use the modem (answer a call,
/// reply to a message) without blocking notification processing.
#[async_trait]
pub trait ModemHandler: Send + Sync + 'static {
    /// Incoming call; invoked on every ring
    async fn on_incoming_call(&self, _call: Call) {}

    /// New SMS, already read from and deleted off the modem's storage
    async fn on_sms_received(&self, _sms: ReceivedSms) {}

    /// Delivery report that no `send_sms` call was waiting for
    async fn on_sms_status_report(&self, _report: StatusReport) {}
}

/// Handler that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHandler;

impl ModemHandler for NoopHandler {}

/// Notified when a dialled call is answered or ends
#[async_trait]
pub trait CallStatusCallback: Send + Sync + 'static {
    async fn on_call_status(&self, call: Call);
}

#[async_trait]
impl<F, Fut> CallStatusCallback for F
where
    F: Fn(Call) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    async fn on_call_status(&self, call: Call) {
        (self)(call).await
    }
}
