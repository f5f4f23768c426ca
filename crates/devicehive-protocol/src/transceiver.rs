//! Generic async transceiver: turns a bidirectional byte stream into a
//! stream of parsed frames plus a FIFO send queue, one outstanding write at
//! a time.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::io::{split, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::frame::{Frame, ParseOutcome};

const READ_CHUNK_SIZE: usize = 4096;

#[derive(Debug, thiserror::Error)]
pub enum TransceiverError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("send queue is full")]
    QueueFull,
    #[error("transceiver is closed")]
    Closed,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransceiverConfig {
    /// Caps the number of frames that may be in flight (enqueued but not yet
    /// written) before `send` fails fast instead of growing the queue
    /// unboundedly.
    pub max_queued_frames: Option<usize>,
}

struct SendTask {
    bytes: Vec<u8>,
    ack: oneshot::Sender<Result<(), TransceiverError>>,
}

/// Handle to a running transceiver. The background I/O task exits once both
/// the handle and the inbound frame receiver are dropped.
pub struct Transceiver<F> {
    send_tx: mpsc::UnboundedSender<SendTask>,
    queued: Arc<AtomicUsize>,
    max_queued: Option<usize>,
    _task: JoinHandle<()>,
    _marker: PhantomData<F>,
}

impl<F> Transceiver<F>
where
    F: Frame + Send + 'static,
{
    /// Spawn the I/O loop over `stream`. Returns a handle for sending frames
    /// and a channel of frames successfully parsed from the inbound side.
    ///
    /// Parsed frames are pushed to `frame_rx` from the spawned task, never
    /// invoked inline while draining — so a consumer reacting to a frame by
    /// calling `send` again can't reenter the parser's stack.
    pub fn spawn<S>(stream: S, config: TransceiverConfig) -> (Self, mpsc::UnboundedReceiver<F>)
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (send_tx, send_rx) = mpsc::unbounded_channel::<SendTask>();
        let (frame_tx, frame_rx) = mpsc::unbounded_channel::<F>();
        let queued = Arc::new(AtomicUsize::new(0));
        let task_queued = Arc::clone(&queued);

        let task = tokio::spawn(async move {
            Self::io_loop(stream, send_rx, frame_tx, task_queued).await;
        });

        (
            Transceiver {
                send_tx,
                queued,
                max_queued: config.max_queued_frames,
                _task: task,
                _marker: PhantomData,
            },
            frame_rx,
        )
    }

    /// Enqueue `frame`. Resolves once the frame has been written to the
    /// stream, or once the write (or the transceiver itself) has failed.
    pub async fn send(&self, frame: F) -> Result<(), TransceiverError> {
        if let Some(max) = self.max_queued {
            if self.queued.load(Ordering::SeqCst) >= max {
                return Err(TransceiverError::QueueFull);
            }
        }
        self.queued.fetch_add(1, Ordering::SeqCst);
        let (ack_tx, ack_rx) = oneshot::channel();
        let task = SendTask { bytes: frame.format(), ack: ack_tx };
        self.send_tx.send(task).map_err(|_| TransceiverError::Closed)?;
        ack_rx.await.map_err(|_| TransceiverError::Closed)?
    }

    async fn io_loop<S>(
        stream: S,
        mut send_rx: mpsc::UnboundedReceiver<SendTask>,
        frame_tx: mpsc::UnboundedSender<F>,
        queued: Arc<AtomicUsize>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut reader, mut writer) = split(stream);
        let mut buf: Vec<u8> = Vec::new();
        let mut read_chunk = [0u8; READ_CHUNK_SIZE];
        let mut send_closed = false;

        loop {
            tokio::select! {
                biased;

                send_task = send_rx.recv(), if !send_closed => {
                    match send_task {
                        Some(task) => {
                            let result = writer
                                .write_all(&task.bytes)
                                .await
                                .map_err(TransceiverError::from);
                            queued.fetch_sub(1, Ordering::SeqCst);
                            let _ = task.ack.send(result);
                        }
                        None => send_closed = true,
                    }
                }

                read_result = reader.read(&mut read_chunk) => {
                    match read_result {
                        Ok(0) => {
                            debug!("transceiver stream closed by peer");
                            return;
                        }
                        Ok(n) => {
                            buf.extend_from_slice(&read_chunk[..n]);
                            loop {
                                match F::parse(&buf) {
                                    ParseOutcome::Success { frame, consumed } => {
                                        buf.drain(..consumed);
                                        if frame_tx.send(frame).is_err() {
                                            return;
                                        }
                                    }
                                    ParseOutcome::BadChecksum { skip } => {
                                        warn!("dropping frame with bad checksum");
                                        buf.drain(..skip);
                                    }
                                    ParseOutcome::Incomplete { consumed } => {
                                        // Bytes before the next candidate signature (or
                                        // the whole buffer, if none is present) can
                                        // never become part of a frame — drop them so a
                                        // peer that never sends a signature byte doesn't
                                        // grow `buf` without bound.
                                        if consumed > 0 {
                                            buf.drain(..consumed);
                                        }
                                        break;
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "transceiver read error");
                            return;
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::SimpleFrame;

    #[tokio::test]
    async fn send_writes_formatted_bytes() {
        let (client, mut server) = tokio::io::duplex(1024);
        let (tx, _frames) = Transceiver::<SimpleFrame>::spawn(client, TransceiverConfig::default());

        let frame = SimpleFrame { intent: 7, payload: vec![1, 2, 3] };
        let expected = frame.format();
        tx.send(frame).await.unwrap();

        let mut got = vec![0u8; expected.len()];
        tokio::io::AsyncReadExt::read_exact(&mut server, &mut got).await.unwrap();
        assert_eq!(got, expected);
    }

    #[tokio::test]
    async fn recv_delivers_frames_in_order() {
        let (client, mut server) = tokio::io::duplex(1024);
        let (_tx, mut frames) = Transceiver::<SimpleFrame>::spawn(client, TransceiverConfig::default());

        let f1 = SimpleFrame { intent: 1, payload: vec![] };
        let f2 = SimpleFrame { intent: 2, payload: vec![9, 9] };
        let mut bytes = f1.format();
        bytes.extend(f2.format());
        tokio::io::AsyncWriteExt::write_all(&mut server, &bytes).await.unwrap();

        assert_eq!(frames.recv().await, Some(f1));
        assert_eq!(frames.recv().await, Some(f2));
    }

    #[tokio::test]
    async fn recv_discards_leading_junk_without_a_signature() {
        let (client, mut server) = tokio::io::duplex(1 << 16);
        let (_tx, mut frames) = Transceiver::<SimpleFrame>::spawn(client, TransceiverConfig::default());

        // A peer that streams plenty of noise before ever sending a real
        // frame must not make the receive buffer grow without bound.
        let junk = vec![0x00u8; 8192];
        tokio::io::AsyncWriteExt::write_all(&mut server, &junk).await.unwrap();

        let frame = SimpleFrame { intent: 3, payload: vec![7] };
        tokio::io::AsyncWriteExt::write_all(&mut server, &frame.format()).await.unwrap();

        assert_eq!(frames.recv().await, Some(frame));
    }

    #[tokio::test]
    async fn send_fails_fast_when_queue_full() {
        let (client, _server) = tokio::io::duplex(16);
        let config = TransceiverConfig { max_queued_frames: Some(0) };
        let (tx, _frames) = Transceiver::<SimpleFrame>::spawn(client, config);
        let err = tx.send(SimpleFrame { intent: 0, payload: vec![] }).await.unwrap_err();
        assert!(matches!(err, TransceiverError::QueueFull));
    }
}
