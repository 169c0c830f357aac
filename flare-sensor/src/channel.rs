//! Secure Channel Sync
//!
//! Delivers serialized alerts to the controller over two mutually
//! authenticated TLS channels, one per risk tier. The tiers are independent
//! failure domains: each has its own queue, its own consumer task and its own
//! connection, so a stalled urgent send never delays a routine send already
//! in flight. Delivery is at-most-once; a failed send is reported and the
//! alert is dropped, never redelivered.
//!
//! Framing: one JSON-encoded Alert per line (newline-delimited). A single
//! consumer task per tier gives the receiver per-tier FIFO ordering.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::{PrivateKeyDer, ServerName};
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use flare_schema::{Alert, RiskTier};

use crate::config::TierConfig;

/// Queue depth per tier. Bursts beyond this apply backpressure to the
/// sampling loop rather than growing without bound.
const TIER_QUEUE_DEPTH: usize = 64;

/// Upper bound on one delivery attempt, connection establishment included.
/// A black-holed endpoint must not stall the sampling cadence; past this
/// window the attempt is abandoned and the alert dropped.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// ERRORS & RESULTS
// ============================================================================

#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connect to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },
    #[error("tls setup failed: {0}")]
    Tls(String),
    #[error("write failed: {0}")]
    Write(String),
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),
    #[error("channel closed")]
    ChannelClosed,
}

/// Outcome of one `send`. A failure means the alert was dropped.
#[derive(Debug)]
pub enum DeliveryResult {
    Delivered { tier: RiskTier },
    Failed { tier: RiskTier, error: TransportError },
}

impl DeliveryResult {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryResult::Delivered { .. })
    }
}

// ============================================================================
// TRANSPORT SEAM
// ============================================================================

/// One tier's underlying byte transport. Production uses [`TlsTransport`];
/// tests substitute in-memory implementations.
#[async_trait]
pub trait AlertTransport: Send {
    /// Deliver one framed alert. An error means the frame was not (or may not
    /// have been) delivered; the caller does not retry.
    async fn deliver(&mut self, frame: &str) -> Result<(), TransportError>;

    /// Discard any connection state left behind by a cancelled delivery so
    /// the next attempt starts fresh. Stateless transports need nothing.
    fn discard_connection(&mut self) {}
}

/// Lazily connected, mutually authenticated TLS client connection.
///
/// The connection is established on first delivery and kept for subsequent
/// sends; any I/O error tears it down so the next send reconnects.
pub struct TlsTransport {
    endpoint: String,
    server_name: ServerName<'static>,
    connector: TlsConnector,
    stream: Option<TlsStream<TcpStream>>,
}

impl TlsTransport {
    /// Build the client TLS context from the tier's PEM material.
    pub fn from_config(config: &TierConfig) -> Result<Self, TransportError> {
        let mut roots = RootCertStore::empty();
        for cert in read_certs(&config.ca_path)? {
            roots
                .add(cert)
                .map_err(|e| TransportError::Tls(e.to_string()))?;
        }

        let chain = read_certs(&config.cert_path)?;
        let key = read_key(&config.key_path)?;

        let client_config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_client_auth_cert(chain, key)
            .map_err(|e| TransportError::Tls(e.to_string()))?;

        let server_name = ServerName::try_from(config.host.clone())
            .map_err(|e| TransportError::Tls(e.to_string()))?;

        Ok(Self {
            endpoint: config.endpoint(),
            server_name,
            connector: TlsConnector::from(Arc::new(client_config)),
            stream: None,
        })
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        let tcp = TcpStream::connect(&self.endpoint).await.map_err(|e| {
            TransportError::Connect {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            }
        })?;
        let tls = self
            .connector
            .connect(self.server_name.clone(), tcp)
            .await
            .map_err(|e| TransportError::Connect {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            })?;
        self.stream = Some(tls);
        Ok(())
    }
}

#[async_trait]
impl AlertTransport for TlsTransport {
    async fn deliver(&mut self, frame: &str) -> Result<(), TransportError> {
        if self.stream.is_none() {
            self.connect().await?;
        }
        // Invariant: stream is Some after connect succeeded.
        let stream = self.stream.as_mut().ok_or(TransportError::ChannelClosed)?;

        let write = async {
            stream.write_all(frame.as_bytes()).await?;
            stream.write_all(b"\n").await?;
            stream.flush().await
        };

        if let Err(e) = write.await {
            // Drop the broken connection; the next send reconnects.
            self.stream = None;
            return Err(TransportError::Write(e.to_string()));
        }
        Ok(())
    }

    fn discard_connection(&mut self) {
        self.stream = None;
    }
}

fn read_certs(
    path: &str,
) -> Result<Vec<tokio_rustls::rustls::pki_types::CertificateDer<'static>>, TransportError> {
    let file = File::open(path)
        .map_err(|e| TransportError::Tls(format!("open {path}: {e}")))?;
    rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| TransportError::Tls(format!("parse {path}: {e}")))
}

fn read_key(path: &str) -> Result<PrivateKeyDer<'static>, TransportError> {
    let file = File::open(path)
        .map_err(|e| TransportError::Tls(format!("open {path}: {e}")))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| TransportError::Tls(format!("parse {path}: {e}")))?
        .ok_or_else(|| TransportError::Tls(format!("no private key in {path}")))
}

// ============================================================================
// CHANNEL SYNC
// ============================================================================

struct Envelope {
    line: String,
    done: oneshot::Sender<Result<(), TransportError>>,
}

/// Dual-channel alert delivery, one independent task per tier.
pub struct SecureChannelSync {
    urgent_tx: mpsc::Sender<Envelope>,
    routine_tx: mpsc::Sender<Envelope>,
    tasks: Vec<JoinHandle<()>>,
}

impl SecureChannelSync {
    /// Start the two tier tasks over the given transports.
    pub fn start<U, R>(urgent: U, routine: R) -> Self
    where
        U: AlertTransport + 'static,
        R: AlertTransport + 'static,
    {
        Self::start_with_timeout(urgent, routine, DELIVERY_TIMEOUT)
    }

    /// Start with an explicit per-delivery time bound.
    pub fn start_with_timeout<U, R>(urgent: U, routine: R, delivery_timeout: Duration) -> Self
    where
        U: AlertTransport + 'static,
        R: AlertTransport + 'static,
    {
        let (urgent_tx, urgent_rx) = mpsc::channel(TIER_QUEUE_DEPTH);
        let (routine_tx, routine_rx) = mpsc::channel(TIER_QUEUE_DEPTH);

        let tasks = vec![
            tokio::spawn(tier_task(
                RiskTier::Urgent,
                urgent,
                urgent_rx,
                delivery_timeout,
            )),
            tokio::spawn(tier_task(
                RiskTier::Routine,
                routine,
                routine_rx,
                delivery_timeout,
            )),
        ];

        Self {
            urgent_tx,
            routine_tx,
            tasks,
        }
    }

    /// Start both tiers over mutually authenticated TLS.
    pub fn connect_tls(
        urgent: &TierConfig,
        routine: &TierConfig,
    ) -> Result<Self, TransportError> {
        Ok(Self::start(
            TlsTransport::from_config(urgent)?,
            TlsTransport::from_config(routine)?,
        ))
    }

    /// Deliver one alert on the given tier. At-most-once: a failure is
    /// reported and the alert is not redelivered.
    pub async fn send(&self, tier: RiskTier, alert: &Alert) -> DeliveryResult {
        let tx = match tier {
            RiskTier::Urgent => &self.urgent_tx,
            RiskTier::Routine => &self.routine_tx,
        };

        let (done_tx, done_rx) = oneshot::channel();
        let envelope = Envelope {
            line: alert.to_json(),
            done: done_tx,
        };

        if tx.send(envelope).await.is_err() {
            return DeliveryResult::Failed {
                tier,
                error: TransportError::ChannelClosed,
            };
        }

        match done_rx.await {
            Ok(Ok(())) => DeliveryResult::Delivered { tier },
            Ok(Err(error)) => DeliveryResult::Failed { tier, error },
            Err(_) => DeliveryResult::Failed {
                tier,
                error: TransportError::ChannelClosed,
            },
        }
    }

    /// Close both queues and let in-flight sends finish or fail within the
    /// grace period.
    pub async fn shutdown(self, grace: Duration) {
        drop(self.urgent_tx);
        drop(self.routine_tx);

        for task in self.tasks {
            if tokio::time::timeout(grace, task).await.is_err() {
                log::warn!("tier task did not drain within the shutdown grace period");
            }
        }
    }
}

async fn tier_task<T: AlertTransport>(
    tier: RiskTier,
    mut transport: T,
    mut rx: mpsc::Receiver<Envelope>,
    delivery_timeout: Duration,
) {
    while let Some(envelope) = rx.recv().await {
        let result =
            match tokio::time::timeout(delivery_timeout, transport.deliver(&envelope.line)).await
            {
                Ok(result) => result,
                Err(_) => {
                    // The abandoned attempt may have left a half-written
                    // connection behind.
                    transport.discard_connection();
                    Err(TransportError::Timeout(delivery_timeout))
                }
            };
        if let Err(e) = &result {
            log::warn!("{tier} tier delivery failed, alert dropped: {e}");
        }
        // The sender may have given up waiting; that is fine.
        let _ = envelope.done.send(result);
    }
    log::debug!("{tier} tier task stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use flare_schema::{RecommendedAction, TcpFlags};
    use std::net::Ipv4Addr;
    use std::sync::Mutex;
    use uuid::Uuid;

    fn alert(confidence: f64) -> Alert {
        Alert {
            alert_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source_ip: Ipv4Addr::UNSPECIFIED,
            destination_ip: Ipv4Addr::UNSPECIFIED,
            protocol: "TCP".to_string(),
            flags: TcpFlags::default(),
            classifier_confidence: confidence,
            recommended_action: RecommendedAction::NoAction,
        }
    }

    struct RecordingTransport {
        frames: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl AlertTransport for RecordingTransport {
        async fn deliver(&mut self, frame: &str) -> Result<(), TransportError> {
            self.frames.lock().unwrap().push(frame.to_string());
            Ok(())
        }
    }

    struct RefusingTransport {
        attempts: Arc<Mutex<usize>>,
    }

    #[async_trait]
    impl AlertTransport for RefusingTransport {
        async fn deliver(&mut self, _frame: &str) -> Result<(), TransportError> {
            *self.attempts.lock().unwrap() += 1;
            Err(TransportError::Connect {
                endpoint: "127.0.0.1:6001".to_string(),
                reason: "connection refused".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_tier_isolation_under_failure() {
        let attempts = Arc::new(Mutex::new(0));
        let frames = Arc::new(Mutex::new(Vec::new()));

        let sync = SecureChannelSync::start(
            RefusingTransport {
                attempts: attempts.clone(),
            },
            RecordingTransport {
                frames: frames.clone(),
            },
        );

        let urgent = sync.send(RiskTier::Urgent, &alert(0.95)).await;
        assert!(!urgent.is_delivered());

        // A routine send after the urgent failure still goes through.
        let routine = sync.send(RiskTier::Routine, &alert(0.5)).await;
        assert!(routine.is_delivered());
        assert_eq!(frames.lock().unwrap().len(), 1);

        sync.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_at_most_once_no_retry() {
        let attempts = Arc::new(Mutex::new(0));
        let frames = Arc::new(Mutex::new(Vec::new()));

        let sync = SecureChannelSync::start(
            RefusingTransport {
                attempts: attempts.clone(),
            },
            RecordingTransport {
                frames: frames.clone(),
            },
        );

        let result = sync.send(RiskTier::Urgent, &alert(0.95)).await;
        assert!(matches!(
            result,
            DeliveryResult::Failed {
                error: TransportError::Connect { .. },
                ..
            }
        ));
        // Exactly one delivery attempt for the dropped alert.
        assert_eq!(*attempts.lock().unwrap(), 1);

        sync.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_per_tier_ordering() {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sync = SecureChannelSync::start(
            RecordingTransport {
                frames: Arc::new(Mutex::new(Vec::new())),
            },
            RecordingTransport {
                frames: frames.clone(),
            },
        );

        let mut ids = Vec::new();
        for _ in 0..5 {
            let a = alert(0.4);
            ids.push(a.alert_id);
            assert!(sync.send(RiskTier::Routine, &a).await.is_delivered());
        }

        let recorded: Vec<Uuid> = frames
            .lock()
            .unwrap()
            .iter()
            .map(|line| Alert::from_json(line).unwrap().alert_id)
            .collect();
        assert_eq!(recorded, ids);

        sync.shutdown(Duration::from_secs(1)).await;
    }

    struct HangingTransport;

    #[async_trait]
    impl AlertTransport for HangingTransport {
        async fn deliver(&mut self, _frame: &str) -> Result<(), TransportError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_hung_delivery_times_out_and_drops() {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sync = SecureChannelSync::start_with_timeout(
            HangingTransport,
            RecordingTransport {
                frames: frames.clone(),
            },
            Duration::from_millis(50),
        );

        // A black-holed urgent endpoint fails the send within the bound
        // instead of stalling the caller.
        let result = sync.send(RiskTier::Urgent, &alert(0.95)).await;
        assert!(matches!(
            result,
            DeliveryResult::Failed {
                error: TransportError::Timeout(_),
                ..
            }
        ));

        // The routine tier is unaffected.
        assert!(sync.send(RiskTier::Routine, &alert(0.5)).await.is_delivered());
        assert_eq!(frames.lock().unwrap().len(), 1);

        sync.shutdown(Duration::from_secs(1)).await;
    }

    #[tokio::test]
    async fn test_shutdown_drains_in_flight_sends() {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sync = SecureChannelSync::start(
            RecordingTransport {
                frames: frames.clone(),
            },
            RecordingTransport {
                frames: frames.clone(),
            },
        );

        assert!(sync.send(RiskTier::Urgent, &alert(0.95)).await.is_delivered());
        sync.shutdown(Duration::from_secs(1)).await;
        assert_eq!(frames.lock().unwrap().len(), 1);
    }
}
