//! Voice calls
//!
//! Outgoing calls are tracked either through the modem's own call progress
//! notifications or, on modems without them, by polling `AT+CLCC`. A
//! [`Call`] can be watched two ways: pass a [`CallStatusCallback`] to
//! [`GsmModem::dial_with_callback`], or poll [`Call::answered`] and
//! [`Call::active`].

use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, info, instrument, warn};

use crate::errors::{GsmError, Result};
use crate::handler::CallStatusCallback;
use crate::modem::{CallUpdate, GsmModem, Inner, WriteOptions};
use crate::types::{call_type, CallDirection, CallStatusStyle};
use crate::util::all_lines_matching;

/// `+CME ERROR` codes that mean the call went away under a DTMF command
const CME_NO_NETWORK_SERVICE: u16 = 30;
const CME_OPERATION_NOT_ALLOWED: u16 = 3;

#[derive(Debug, Default)]
struct CallState {
    answered: bool,
    active: bool,
    ringing: bool,
    ring_count: u32,
}

struct CallShared {
    id: u32,
    call_type: u8,
    number: Option<String>,
    direction: CallDirection,
    /// Type of number from the caller ID, incoming calls only
    ton: Option<u8>,
    state: Mutex<CallState>,
    callback: Option<Arc<dyn CallStatusCallback>>,
}

/// A voice call; clones share state
#[derive(Clone)]
pub struct Call {
    shared: Arc<CallShared>,
    modem: Weak<Inner>,
}

impl fmt::Debug for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("Call")
            .field("id", &self.shared.id)
            .field("number", &self.shared.number)
            .field("direction", &self.shared.direction)
            .field("answered", &state.answered)
            .field("active", &state.active)
            .field("ring_count", &state.ring_count)
            .finish()
    }
}

impl Call {
    fn new(
        modem: Weak<Inner>,
        id: u32,
        call_type: u8,
        number: Option<String>,
        direction: CallDirection,
        ton: Option<u8>,
        callback: Option<Arc<dyn CallStatusCallback>>,
    ) -> Self {
        let incoming = direction == CallDirection::Incoming;
        Self {
            shared: Arc::new(CallShared {
                id,
                call_type,
                number,
                direction,
                ton,
                state: Mutex::new(CallState {
                    answered: false,
                    active: true,
                    ringing: incoming,
                    ring_count: u32::from(incoming),
                }),
                callback,
            }),
            modem,
        }
    }

    pub fn id(&self) -> u32 {
        self.shared.id
    }

    /// Call type as reported by the modem; 0 is voice
    pub fn call_type(&self) -> u8 {
        self.shared.call_type
    }

    /// Remote number; `None` for incoming calls without caller ID
    pub fn number(&self) -> Option<&str> {
        self.shared.number.as_deref()
    }

    pub fn direction(&self) -> CallDirection {
        self.shared.direction
    }

    pub fn is_incoming(&self) -> bool {
        self.shared.direction == CallDirection::Incoming
    }

    /// Type of number of the caller ID (145 = international)
    pub fn ton(&self) -> Option<u8> {
        self.shared.ton
    }

    /// Whether the call has been answered (and not yet ended)
    pub fn answered(&self) -> bool {
        self.shared.state.lock().answered
    }

    /// Whether the call is still in progress
    pub fn active(&self) -> bool {
        self.shared.state.lock().active
    }

    /// Incoming call still ringing
    pub fn ringing(&self) -> bool {
        self.shared.state.lock().ringing
    }

    /// Number of rings seen for an incoming call
    pub fn ring_count(&self) -> u32 {
        self.shared.state.lock().ring_count
    }

    fn modem(&self) -> Result<GsmModem> {
        GsmModem::upgrade(&self.modem)
    }

    /// Send DTMF tones; the call must be answered
    #[instrument(skip(self))]
    pub async fn send_dtmf_tone(&self, tones: &str) -> Result<()> {
        {
            let state = self.shared.state.lock();
            if !(state.answered && state.active) {
                return Err(GsmError::InvalidState(
                    "Call is not active (it has not yet been answered, or it has ended)".to_string(),
                ));
            }
        }
        if tones.is_empty() {
            return Err(GsmError::InvalidArgument("No DTMF tones given".to_string()));
        }

        let modem = self.modem()?;
        let base = {
            let state = modem.inner.state.lock();
            if !state.dtmf_supported {
                return Err(GsmError::InvalidState("Modem does not support DTMF".to_string()));
            }
            state.dtmf_base.replace("{cid}", &self.shared.id.to_string())
        };

        let command = format!(
            "AT{}",
            tones
                .chars()
                .map(|tone| format!("{}{}", base, tone))
                .collect::<Vec<_>>()
                .join(";")
        );
        let timeout = Duration::from_secs(5 + tones.chars().count() as u64);

        match modem.write_with(&command, WriteOptions::default().timeout(timeout)).await {
            Ok(_) => Ok(()),
            Err(GsmError::Command(e)) if e.is_cme() && e.code() == Some(CME_NO_NETWORK_SERVICE) => {
                Err(GsmError::Interrupted {
                    message: "No network service".to_string(),
                    cause: Some(Box::new(e)),
                })
            }
            Err(GsmError::Command(e)) if e.is_cme() && e.code() == Some(CME_OPERATION_NOT_ALLOWED) => {
                Err(GsmError::Interrupted {
                    message: "Operation not allowed".to_string(),
                    cause: Some(Box::new(e)),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// End the call; does nothing if it already ended. The status callback is not invoked.
    #[instrument(skip(self))]
    pub async fn hangup(&self) -> Result<()> {
        if !self.active() {
            return Ok(());
        }
        let modem = self.modem()?;
        modem.write("ATH").await?;
        self.mark_ended();
        modem.forget_call(self.shared.id);
        info!("Call hung up");
        Ok(())
    }

    /// Answer an incoming call; answering twice is a no-op
    #[instrument(skip(self))]
    pub async fn answer(&self) -> Result<()> {
        if !self.is_incoming() {
            return Err(GsmError::InvalidState("Only incoming calls can be answered".to_string()));
        }
        if self.answered() {
            return Ok(());
        }
        let modem = self.modem()?;
        modem.write("ATA").await?;
        let mut state = self.shared.state.lock();
        state.answered = true;
        state.ringing = false;
        Ok(())
    }

    /// Record that the remote party answered; `true` on the first transition
    fn mark_answered(&self) -> bool {
        let mut state = self.shared.state.lock();
        let changed = !state.answered && state.active;
        state.answered = true;
        state.ringing = false;
        changed
    }

    /// `true` if the call was still active
    fn mark_ended(&self) -> bool {
        let mut state = self.shared.state.lock();
        let changed = state.active;
        state.answered = false;
        state.active = false;
        state.ringing = false;
        changed
    }

    async fn notify_status(&self) {
        if let Some(callback) = &self.shared.callback {
            callback.on_call_status(self.clone()).await;
        }
    }
}

impl GsmModem {
    /// Place a voice call and wait (up to the dial timeout) for the modem to report it initiated
    pub async fn dial(&self, number: &str, timeout: Option<Duration>) -> Result<Call> {
        self.dial_inner(number, timeout, None).await
    }

    /// Like [`dial`](Self::dial); `callback` is invoked when the call is answered and when it ends
    pub async fn dial_with_callback<C>(&self, number: &str, timeout: Option<Duration>, callback: C) -> Result<Call>
    where
        C: CallStatusCallback,
    {
        self.dial_inner(number, timeout, Some(Arc::new(callback))).await
    }

    #[instrument(skip(self, callback))]
    async fn dial_inner(
        &self,
        number: &str,
        timeout: Option<Duration>,
        callback: Option<Arc<dyn CallStatusCallback>>,
    ) -> Result<Call> {
        let timeout = timeout.unwrap_or_else(|| self.inner.config.dial_timeout());
        let style = self.call_status_style();
        let command = format!("ATD{};", number);
        info!(number = %number, style = ?style, "Dialling");

        if !style.has_call_init_update() {
            // No "call initiated" notification: the call exists as soon as ATD is out
            self.write_with(&command, WriteOptions::default().no_wait()).await?;
            let id = self.next_call_id();
            return Ok(self.register_outgoing_call(id, call_type::VOICE, number, callback));
        }

        let (initiated_tx, initiated) = oneshot::channel();
        *self.inner.dial_waiter.lock() = Some(initiated_tx);

        let options = if style.waits_for_atd_response() {
            WriteOptions::default().timeout(timeout)
        } else {
            WriteOptions::default().no_wait()
        };
        let response = match self.write_with(&command, options).await {
            Ok(lines) => lines,
            Err(e) => {
                self.inner.dial_waiter.lock().take();
                return Err(e);
            }
        };

        // Some modems report the call as part of the ATD response
        for line in &response {
            if let Some(CallUpdate::Initiated { id, call_type }) = self.call_update(line) {
                self.handle_call_initiated(id, call_type);
            }
        }

        if style == CallStatusStyle::Polling {
            let poller = self.clone();
            tokio::spawn(async move { poller.poll_call_status(timeout).await });
        }

        match tokio::time::timeout(timeout, initiated).await {
            Ok(Ok((id, call_type))) => Ok(self.register_outgoing_call(id, call_type, number, callback)),
            Ok(Err(_)) => Err(GsmError::InvalidState("Dial was superseded".to_string())),
            Err(_) => {
                self.inner.dial_waiter.lock().take();
                self.inner.metrics.timeouts.inc();
                warn!(number = %number, "Timed out waiting for call to be initiated");
                Err(GsmError::Timeout(None))
            }
        }
    }

    fn register_outgoing_call(
        &self,
        id: u32,
        call_type: u8,
        number: &str,
        callback: Option<Arc<dyn CallStatusCallback>>,
    ) -> Call {
        let call = Call::new(
            self.downgrade(),
            id,
            call_type,
            Some(number.to_string()),
            CallDirection::Outgoing,
            None,
            callback,
        );
        self.inner.active_calls.insert(id, call.clone());
        self.inner.metrics.calls_dialled.inc();
        self.inner.metrics.active_calls.set(self.inner.active_calls.len() as u64);
        debug!(call_id = id, "Call initiated");
        call
    }

    /// Lowest call id not held by a tracked call
    fn next_call_id(&self) -> u32 {
        (1..u32::MAX)
            .find(|id| !self.inner.active_calls.contains_key(id))
            .unwrap_or(u32::MAX)
    }

    pub(crate) fn forget_call(&self, id: u32) {
        self.inner.active_calls.remove(&id);
        self.inner.metrics.active_calls.set(self.inner.active_calls.len() as u64);
    }

    /// Track an outgoing call through `AT+CLCC` on modems without call notifications
    async fn poll_call_status(&self, init_timeout: Duration) {
        #[derive(Debug, Clone, Copy, PartialEq)]
        enum Expect {
            Initiated,
            Answered(u32),
            Ended(u32),
        }

        let interval = self.inner.config.call_poll_interval();
        let started = Instant::now();
        let mut expect = Expect::Initiated;

        loop {
            tokio::time::sleep(interval).await;
            if expect == Expect::Initiated && started.elapsed() > init_timeout {
                debug!("Call never initiated; stopped polling");
                return;
            }
            let lines = match self.write("AT+CLCC").await {
                Ok(lines) => lines,
                Err(GsmError::Command(e)) => {
                    debug!("Call status poll failed: {}", e);
                    continue;
                }
                Err(e) => {
                    debug!("Call status polling stopped: {}", e);
                    return;
                }
            };

            // (id, direction, stat, mode) per listed call
            let listed: Vec<(u32, u32, u32, u32)> = all_lines_matching(&self.inner.patterns.clcc, &lines)
                .iter()
                .map(|caps| {
                    let parse = |i: usize| caps[i].parse::<u32>().unwrap_or(0);
                    (parse(1), parse(2), parse(3), parse(4))
                })
                .collect();
            let outgoing = match expect {
                Expect::Initiated => listed.iter().find(|&&(_, dir, stat, _)| dir == 0 && (stat == 2 || stat == 3)),
                Expect::Answered(tracked) | Expect::Ended(tracked) => {
                    listed.iter().find(|&&(id, dir, _, _)| id == tracked && dir == 0)
                }
            }
            .map(|&(id, _, stat, kind)| (id, stat, kind));

            match (expect, outgoing) {
                (Expect::Initiated, Some((id, stat, kind))) if stat == 2 || stat == 3 => {
                    self.handle_call_initiated(id, u8::try_from(kind).unwrap_or(call_type::VOICE));
                    expect = Expect::Answered(id);
                }
                (Expect::Answered(id), Some((_, 0, _))) => {
                    // Wait until dial() has registered the call
                    if self.inner.active_calls.contains_key(&id) {
                        self.handle_call_answered(Some(id)).await;
                        expect = Expect::Ended(id);
                    }
                }
                (Expect::Answered(id), None) => {
                    self.handle_call_rejected(Some(id)).await;
                    return;
                }
                (Expect::Ended(id), None) => {
                    self.handle_call_ended(Some(id)).await;
                    return;
                }
                _ => {}
            }

            if let Expect::Answered(id) | Expect::Ended(id) = expect {
                if !self.inner.active_calls.contains_key(&id) && started.elapsed() > init_timeout {
                    debug!(call_id = id, "Call no longer tracked; stopped polling");
                    return;
                }
            }
        }
    }

    pub(crate) async fn handle_call_update(&self, update: CallUpdate) {
        match update {
            CallUpdate::Initiated { id, call_type } => self.handle_call_initiated(id, call_type),
            CallUpdate::Answered { id } => self.handle_call_answered(id).await,
            CallUpdate::Ended { id } => self.handle_call_ended(id).await,
            CallUpdate::Rejected => self.handle_call_rejected(None).await,
        }
    }

    fn handle_call_initiated(&self, id: u32, call_type: u8) {
        if let Some(waiter) = self.inner.dial_waiter.lock().take() {
            let _ = waiter.send((id, call_type));
        }
    }

    /// The call with `id`, or the first outgoing call matching `filter`
    fn find_call(&self, id: Option<u32>, filter: impl Fn(&Call) -> bool) -> Option<Call> {
        match id {
            Some(id) => self.inner.active_calls.get(&id).map(|c| c.value().clone()),
            None => {
                let mut candidates: Vec<Call> = self
                    .inner
                    .active_calls
                    .iter()
                    .map(|c| c.value().clone())
                    .filter(|c| !c.is_incoming() && filter(c))
                    .collect();
                candidates.sort_by_key(Call::id);
                candidates.into_iter().next()
            }
        }
    }

    async fn handle_call_answered(&self, id: Option<u32>) {
        let Some(call) = self.find_call(id, |c| !c.answered()) else {
            debug!(call_id = ?id, "Answer notification for unknown call");
            return;
        };
        if call.mark_answered() {
            info!(call_id = call.id(), "Call answered");
            call.notify_status().await;
        }
    }

    async fn handle_call_ended(&self, id: Option<u32>) {
        let Some(call) = self.find_call(id, |_| true) else {
            debug!(call_id = ?id, "Hangup notification for unknown call");
            return;
        };
        self.end_call(call).await;
    }

    /// Remote party rejected a call that was never answered
    async fn handle_call_rejected(&self, id: Option<u32>) {
        let Some(call) = self.find_call(id, |c| !c.answered()) else {
            return;
        };
        self.end_call(call).await;
    }

    async fn end_call(&self, call: Call) {
        self.forget_call(call.id());
        if call.mark_ended() {
            info!(call_id = call.id(), "Call ended");
            call.notify_status().await;
        }
    }

    /// Ring notification: `RING` or `+CRING: <type>`, optionally followed by `+CLIP`
    pub(crate) async fn handle_incoming_call(&self, lines: &[String]) {
        let Some(ring) = lines.first() else {
            return;
        };

        let call_type = match ring.strip_prefix("+CRING:") {
            Some(kind) => call_type::from_cring(kind).unwrap_or(call_type::VOICE),
            None => {
                if self.extended_incoming_call_indication() {
                    // Plain RING although +CRC was enabled: the setting was reset behind our back
                    debug!("Plain RING received; re-enabling extended ring indications");
                    let restored = self.try_write("AT+CRC=1").await.unwrap_or(false);
                    if !restored {
                        self.inner.state.lock().extended_incoming_call_indication = false;
                    }
                }
                call_type::VOICE
            }
        };

        let (number, ton) = match lines.get(1).and_then(|line| self.inner.patterns.clip.captures(line)) {
            Some(caps) => (Some(caps[1].to_string()), caps[2].parse::<u8>().ok()),
            None => (None, None),
        };

        let existing = self
            .inner
            .active_calls
            .iter()
            .map(|c| c.value().clone())
            .find(|c| c.is_incoming() && c.ringing() && !c.answered() && c.number() == number.as_deref());

        let call = match existing {
            Some(call) => {
                call.shared.state.lock().ring_count += 1;
                call
            }
            None => {
                let id = self.next_call_id();
                let call = Call::new(
                    self.downgrade(),
                    id,
                    call_type,
                    number,
                    CallDirection::Incoming,
                    ton,
                    None,
                );
                self.inner.active_calls.insert(id, call.clone());
                self.inner.metrics.calls_received.inc();
                self.inner.metrics.active_calls.set(self.inner.active_calls.len() as u64);
                info!(call_id = id, number = ?call.number(), "Incoming call");
                call
            }
        };

        self.inner.handler.on_incoming_call(call).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(direction: CallDirection) -> Call {
        Call::new(Weak::new(), 1, 0, Some("+27820001234".to_string()), direction, None, None)
    }

    #[test]
    fn test_new_call_state() {
        let outgoing = call(CallDirection::Outgoing);
        assert!(outgoing.active());
        assert!(!outgoing.answered());
        assert!(!outgoing.ringing());
        assert_eq!(outgoing.ring_count(), 0);

        let incoming = call(CallDirection::Incoming);
        assert!(incoming.ringing());
        assert_eq!(incoming.ring_count(), 1);
    }

    #[test]
    fn test_transitions_fire_once() {
        let call = call(CallDirection::Outgoing);
        assert!(call.mark_answered());
        assert!(!call.mark_answered());
        assert!(call.mark_ended());
        assert!(!call.mark_ended());
        assert!(!call.answered());
        assert!(!call.active());
    }

    #[tokio::test]
    async fn test_dtmf_requires_answered_call() {
        let call = call(CallDirection::Outgoing);
        let err = call.send_dtmf_tone("123").await.unwrap_err();
        assert!(matches!(err, GsmError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_answer_rejects_outgoing_call() {
        let call = call(CallDirection::Outgoing);
        assert!(matches!(call.answer().await, Err(GsmError::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_hangup_of_ended_call_is_noop() {
        let call = call(CallDirection::Outgoing);
        call.mark_ended();
        // No modem behind the call, so anything but a no-op would fail
        call.hangup().await.unwrap();
    }
}
