//! MQTT broker session and connection supervision.

use std::future::Future;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tracing::{debug, info, warn};

use crate::config::MqttConfig;
use crate::error::{Error, Result};
use crate::topic::ALL_TOPICS;

/// Capacity of the client request channel.
const REQUEST_CHANNEL_CAPACITY: usize = 10;

/// Upper bound for flushing DISCONNECT to the broker.
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Broker connection state, as seen by the subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connected => "connected",
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// A connection that can be (re)established by a [`Supervisor`].
pub trait Establish {
    /// Make one connection attempt.
    fn establish(&mut self) -> impl Future<Output = Result<()>> + Send;
}

/// Retries a connection at a fixed interval until it succeeds.
///
/// There is no backoff and no attempt limit: the process waits for the broker
/// for as long as it takes.
#[derive(Debug, Clone, Copy)]
pub struct Supervisor {
    retry_interval: Duration,
}

impl Supervisor {
    pub fn new(retry_interval: Duration) -> Self {
        Self { retry_interval }
    }

    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Attempt `link` until it is established, returning the number of attempts.
    pub async fn establish<L: Establish>(&self, link: &mut L) -> u64 {
        let mut attempt: u64 = 0;

        loop {
            attempt += 1;

            match link.establish().await {
                Ok(()) => return attempt,
                Err(e) => {
                    warn!(
                        attempt,
                        error = %e,
                        retry_in_secs = self.retry_interval.as_secs(),
                        "Cannot connect to MQTT broker"
                    );
                    tokio::time::sleep(self.retry_interval).await;
                }
            }
        }
    }
}

/// A client session with the MQTT broker.
///
/// Owns both the request handle and the event loop that drives the network
/// connection. Polling the event loop after a connection error reconnects.
pub struct MqttSession {
    client: AsyncClient,
    eventloop: EventLoop,
    address: String,
}

impl MqttSession {
    /// Create a session for the configured broker without connecting.
    pub fn new(config: &MqttConfig) -> Self {
        let mut options =
            MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        options
            .set_keep_alive(config.keep_alive())
            .set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        Self {
            client,
            eventloop,
            address: config.address(),
        }
    }

    /// Broker address in `host:port` form.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Subscribe to every topic at QoS 0.
    ///
    /// The broker's SUBACK arrives later through [`MqttSession::poll`].
    pub async fn subscribe_all(&mut self) -> Result<()> {
        self.client.subscribe(ALL_TOPICS, QoS::AtMostOnce).await?;
        info!(filter = ALL_TOPICS, "Subscription requested");
        Ok(())
    }

    /// Wait for the next network event.
    pub async fn poll(&mut self) -> Result<Event> {
        Ok(self.eventloop.poll().await?)
    }

    /// Send DISCONNECT and wait until it has been written to the broker.
    pub async fn disconnect(mut self) -> Result<()> {
        self.client.disconnect().await?;

        let flush = async {
            loop {
                if let Event::Outgoing(Outgoing::Disconnect) = self.eventloop.poll().await? {
                    return Ok::<(), Error>(());
                }
            }
        };

        tokio::time::timeout(DISCONNECT_TIMEOUT, flush)
            .await
            .map_err(|_| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "timed out flushing DISCONNECT",
                ))
            })??;

        info!(broker = %self.address, "Disconnected from MQTT broker");
        Ok(())
    }
}

impl Establish for MqttSession {
    /// Drive the event loop until the broker acknowledges the connection.
    async fn establish(&mut self) -> Result<()> {
        loop {
            if let Event::Incoming(Packet::ConnAck(ack)) = self.eventloop.poll().await? {
                debug!(session_present = ack.session_present, "Received CONNACK");
                return Ok(());
            }
        }
    }
}

/// Connect to the MQTT broker, retrying until it accepts the connection.
///
/// Never returns an error: failures are logged and retried every
/// `retry_interval_secs`.
pub async fn connect(config: &MqttConfig) -> MqttSession {
    let mut session = MqttSession::new(config);

    info!(
        broker = %session.address(),
        client_id = %config.client_id,
        "Connecting to MQTT broker"
    );

    let attempts = Supervisor::new(config.retry_interval())
        .establish(&mut session)
        .await;

    info!(broker = %session.address(), attempts, "Connected to MQTT broker");

    session
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    /// A link that refuses a fixed number of attempts before accepting.
    struct FlakyLink {
        failures_left: u32,
        attempts: Vec<Instant>,
    }

    impl FlakyLink {
        fn new(failures: u32) -> Self {
            Self {
                failures_left: failures,
                attempts: Vec::new(),
            }
        }
    }

    impl Establish for FlakyLink {
        async fn establish(&mut self) -> Result<()> {
            self.attempts.push(Instant::now());
            if self.failures_left > 0 {
                self.failures_left -= 1;
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "connection refused",
                )));
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_connects_first_time() {
        let mut link = FlakyLink::new(0);
        let start = Instant::now();

        let attempts = Supervisor::new(Duration::from_secs(30))
            .establish(&mut link)
            .await;

        assert_eq!(attempts, 1);
        assert_eq!(link.attempts.len(), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_supervisor_retries_at_fixed_interval() {
        let mut link = FlakyLink::new(3);

        let attempts = Supervisor::new(Duration::from_secs(30))
            .establish(&mut link)
            .await;

        assert_eq!(attempts, 4);
        assert_eq!(link.attempts.len(), 4);

        for pair in link.attempts.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= Duration::from_secs(30), "gap too short: {:?}", gap);
            assert!(gap < Duration::from_secs(31), "gap too long: {:?}", gap);
        }
    }

    #[test]
    fn test_connection_state() {
        assert_eq!(ConnectionState::default(), ConnectionState::Disconnected);
        assert!(!ConnectionState::Disconnected.is_connected());
        assert!(ConnectionState::Connected.is_connected());
        assert_eq!(ConnectionState::Connected.as_str(), "connected");
    }

    #[tokio::test]
    async fn test_session_address() {
        let config = MqttConfig {
            host: "broker.local".to_string(),
            port: 1884,
            ..Default::default()
        };

        let session = MqttSession::new(&config);
        assert_eq!(session.address(), "broker.local:1884");
    }
}
