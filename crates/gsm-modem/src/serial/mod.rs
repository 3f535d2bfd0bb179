//! Serial transport
//!
//! Owns the connection to the modem. A reader task splits incoming data into
//! lines and routes them either to the command currently awaiting a response
//! or, when nothing is waiting, into unsolicited notification batches.

pub mod codec;

pub use codec::{parse_error_code, LineFramer, ModemErrorCode, Segment};

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, StopBits};
use tracing::{debug, error, info};

use crate::errors::{GsmError, Result};

/// Receiver of unsolicited notification batches
pub type NotificationReceiver = mpsc::UnboundedReceiver<Vec<String>>;

type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Response being collected for the command in flight
struct PendingResponse {
    lines: Vec<String>,
    expected_term: Option<Vec<u8>>,
    done: oneshot::Sender<Vec<String>>,
}

/// State shared between writers and the reader task
#[derive(Default)]
struct Shared {
    pending: Mutex<Option<PendingResponse>>,
    closed: AtomicBool,
}

/// Serial connection to a modem
pub struct SerialComms {
    writer: tokio::sync::Mutex<BoxedWriter>,
    shared: Arc<Shared>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl SerialComms {
    /// Open a serial port (8N1, no flow control)
    pub fn open(port: &str, baud_rate: u32) -> Result<(Self, NotificationReceiver)> {
        info!(port = %port, baud = baud_rate, "Opening serial port");

        let stream = tokio_serial::new(port, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()?;

        Ok(Self::from_stream(stream))
    }

    /// Use an already-open byte stream (e.g. a socket or an in-memory duplex)
    pub fn from_stream<S>(stream: S) -> (Self, NotificationReceiver)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let shared = Arc::new(Shared::default());
        let (notify_tx, notify_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(read_loop(reader, Arc::clone(&shared), notify_tx));

        let comms = Self {
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            shared,
            reader_task: Mutex::new(Some(task)),
        };
        (comms, notify_rx)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Write `data` and, when `wait` is set, collect the response.
    ///
    /// The response ends at the first final result line, or as soon as the
    /// received data ends with `expected_term` when one is given.
    pub async fn write(
        &self,
        data: &[u8],
        wait: bool,
        timeout: Duration,
        expected_term: Option<&[u8]>,
    ) -> Result<Vec<String>> {
        let mut writer = self.writer.lock().await;
        if self.is_closed() {
            return Err(GsmError::ConnectionClosed);
        }

        if !wait {
            writer.write_all(data).await?;
            writer.flush().await?;
            return Ok(Vec::new());
        }

        let (done, response) = oneshot::channel();
        *self.shared.pending.lock() = Some(PendingResponse {
            lines: Vec::new(),
            expected_term: expected_term.map(<[u8]>::to_vec),
            done,
        });
        if self.is_closed() {
            self.shared.pending.lock().take();
            return Err(GsmError::ConnectionClosed);
        }

        let written = async {
            writer.write_all(data).await?;
            writer.flush().await
        }
        .await;
        if let Err(e) = written {
            self.shared.pending.lock().take();
            return Err(e.into());
        }

        match tokio::time::timeout(timeout, response).await {
            Ok(Ok(lines)) => Ok(lines),
            Ok(Err(_)) => Err(GsmError::ConnectionClosed),
            Err(_) => {
                let partial = self
                    .shared
                    .pending
                    .lock()
                    .take()
                    .map(|p| p.lines)
                    .filter(|lines| !lines.is_empty());
                Err(GsmError::Timeout(partial))
            }
        }
    }

    /// Stop the reader and shut down the port
    pub async fn close(&self) {
        self.shared.closed.store(true, Ordering::Release);
        if let Some(task) = self.reader_task.lock().take() {
            task.abort();
        }
        self.shared.pending.lock().take();

        let mut writer = self.writer.lock().await;
        if let Err(e) = writer.shutdown().await {
            debug!("Error shutting down serial writer: {}", e);
        }
        info!("Serial connection closed");
    }
}

impl Drop for SerialComms {
    fn drop(&mut self) {
        if let Some(task) = self.reader_task.get_mut().take() {
            task.abort();
        }
    }
}

async fn read_loop<R>(mut reader: R, shared: Arc<Shared>, notify_tx: mpsc::UnboundedSender<Vec<String>>)
where
    R: AsyncRead + Unpin,
{
    let mut framer = LineFramer::new();
    let mut notification: Vec<String> = Vec::new();

    loop {
        match reader.read_buf(framer.buffer_mut()).await {
            Ok(0) => {
                error!("Serial connection closed by device");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                error!("Fatal serial read error: {}", e);
                break;
            }
        }

        loop {
            let expected_term = shared
                .pending
                .lock()
                .as_ref()
                .and_then(|p| p.expected_term.clone());
            let Some(segment) = framer.next_segment(expected_term.as_deref()) else {
                break;
            };

            let complete = match &segment {
                Segment::Line(line) => framer.is_response_terminator(line),
                Segment::Terminated(_) => true,
            };
            let line = segment.into_string();
            debug!(line = %line.escape_debug(), "RX");

            let mut slot = shared.pending.lock();
            match slot.as_mut() {
                Some(pending) => {
                    pending.lines.push(line);
                    if complete {
                        if let Some(pending) = slot.take() {
                            debug!(response = ?pending.lines, "Response complete");
                            let _ = pending.done.send(pending.lines);
                        }
                    }
                }
                None => notification.push(line),
            }
        }

        // Flush once no partial line is left over
        if framer.is_empty() && !notification.is_empty() {
            debug!(lines = ?notification, "Notification");
            if notify_tx.send(std::mem::take(&mut notification)).is_err() {
                debug!("Notification receiver dropped");
            }
        }
    }

    shared.closed.store(true, Ordering::Release);
    // Dropping the sender wakes any waiter with ConnectionClosed
    shared.pending.lock().take();
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[tokio::test]
    async fn test_write_collects_response() {
        let (client, mut device) = duplex(1024);
        let (comms, _notifications) = SerialComms::from_stream(client);

        let device_task = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let n = device.read(&mut buf).await.unwrap();
            assert_eq!(&buf[..n], b"AT+CSQ\r");
            device.write_all(b"\r\n+CSQ: 18,99\r\n\r\nOK\r\n").await.unwrap();
            device
        });

        let response = comms
            .write(b"AT+CSQ\r", true, Duration::from_secs(2), None)
            .await
            .unwrap();
        assert_eq!(response, vec!["+CSQ: 18,99".to_string(), "OK".to_string()]);
        let _device = device_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_timeout_carries_partial_response() {
        let (client, mut device) = duplex(1024);
        let (comms, _notifications) = SerialComms::from_stream(client);

        let device_task = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let _ = device.read(&mut buf).await.unwrap();
            device.write_all(b"+CPIN: READY\r\n").await.unwrap();
            device
        });

        let err = comms
            .write(b"AT+CPIN?\r", true, Duration::from_millis(200), None)
            .await
            .unwrap_err();
        assert_eq!(err.timeout_data(), Some(&["+CPIN: READY".to_string()][..]));
        let _device = device_task.await.unwrap();
    }

    #[tokio::test]
    async fn test_unsolicited_lines_become_notifications() {
        let (client, mut device) = duplex(1024);
        let (_comms, mut notifications) = SerialComms::from_stream(client);

        device.write_all(b"\r\nRING\r\n+CLIP: \"+27820001234\",145\r\n").await.unwrap();
        let batch = tokio::time::timeout(Duration::from_secs(2), notifications.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(batch[0], "RING");
        assert!(batch.len() <= 2);
    }

    #[tokio::test]
    async fn test_prompt_terminator_ends_response() {
        let mock = tokio_test::io::Builder::new()
            .write(b"AT+CMGS=18\r")
            .read(b"\r\n> ")
            .write(b"0001000B917228214365F700000568656C6C6F\x1a")
            .read(b"\r\n+CMGS: 12\r\n\r\nOK\r\n")
            .build();
        let (comms, _notifications) = SerialComms::from_stream(mock);

        let prompt = comms
            .write(b"AT+CMGS=18\r", true, Duration::from_secs(2), Some(&b"> "[..]))
            .await
            .unwrap();
        assert_eq!(prompt, vec!["> ".to_string()]);

        let response = comms
            .write(
                b"0001000B917228214365F700000568656C6C6F\x1a",
                true,
                Duration::from_secs(2),
                None,
            )
            .await
            .unwrap();
        assert_eq!(response, vec!["+CMGS: 12".to_string(), "OK".to_string()]);
    }

    #[tokio::test]
    async fn test_closed_connection_fails_pending_write() {
        let (client, device) = duplex(1024);
        let (comms, _notifications) = SerialComms::from_stream(client);
        drop(device);

        let result = comms.write(b"AT\r", true, Duration::from_secs(2), None).await;
        assert!(matches!(result, Err(GsmError::ConnectionClosed) | Err(GsmError::Io(_))));
    }
}
