//! MQTT subscriber feeding every received message to the router.

use std::time::Duration;

use anyhow::Context;
use mqtt2prom_common::{
    ALL_TOPICS, ConnectionState, Error, MqttConfig, MqttSession, Supervisor, connect,
};
use rumqttc::{Event, Packet, SubAck, SubscribeReasonCode};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::router::SharedRouter;

/// Subscribes to all topics and routes messages until shutdown.
///
/// A lost session is re-established by the same fixed-interval supervisor used
/// for the first connection, and the subscription is renewed every time.
pub struct MqttSubscriber {
    router: SharedRouter,
    mqtt: MqttConfig,
    supervisor: Supervisor,
    state: watch::Sender<ConnectionState>,
}

impl MqttSubscriber {
    /// Create a new subscriber. Connection changes are published on `state`.
    pub fn new(
        router: SharedRouter,
        mqtt: MqttConfig,
        state: watch::Sender<ConnectionState>,
    ) -> Self {
        let supervisor = Supervisor::new(mqtt.retry_interval());
        Self {
            router,
            mqtt,
            supervisor,
            state,
        }
    }

    /// Run the subscriber until the shutdown signal is received.
    ///
    /// Returns an error if the broker rejects the subscription or the session
    /// cannot be closed cleanly.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let mut session = tokio::select! {
            session = connect(&self.mqtt) => session,
            _ = shutdown_requested(&mut shutdown) => {
                info!("Shutdown requested before the broker accepted a connection");
                return Ok(());
            }
        };
        self.subscribe(&mut session).await?;

        loop {
            tokio::select! {
                _ = shutdown_requested(&mut shutdown) => {
                    info!("Shutdown signal received, stopping subscriber");
                    break;
                }

                event = session.poll() => match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        trace!(
                            topic = %publish.topic,
                            payload_len = publish.payload.len(),
                            "Received message"
                        );
                        self.router.route(&publish.topic, &publish.payload);
                    }
                    Ok(Event::Incoming(Packet::SubAck(ack))) => {
                        check_suback(&ack)?;
                        info!(filter = ALL_TOPICS, "Subscribed");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        self.state.send_replace(ConnectionState::Disconnected);
                        warn!(
                            error = %e,
                            retry_in_secs = self.supervisor.retry_interval().as_secs(),
                            "Lost connection to MQTT broker"
                        );

                        let resumed = tokio::select! {
                            _ = tokio::time::sleep(self.supervisor.retry_interval()) => true,
                            _ = shutdown_requested(&mut shutdown) => false,
                        };
                        if !resumed || !self.reconnect(&mut session, &mut shutdown).await? {
                            info!("Shutdown signal received while reconnecting");
                            break;
                        }
                    }
                },
            }
        }

        if self.state.borrow().is_connected() {
            session
                .disconnect()
                .await
                .context("Failed to disconnect from MQTT broker")?;
            self.state.send_replace(ConnectionState::Disconnected);
        }

        let stats = self.router.stats();
        info!(
            messages_received = stats.messages_received,
            messages_routed = stats.messages_routed,
            "Subscriber stopped"
        );
        Ok(())
    }

    /// Re-establish a lost session and subscribe again. Returns `false` on
    /// shutdown.
    async fn reconnect(
        &self,
        session: &mut MqttSession,
        shutdown: &mut watch::Receiver<bool>,
    ) -> anyhow::Result<bool> {
        tokio::select! {
            attempts = self.supervisor.establish(&mut *session) => {
                info!(broker = %session.address(), attempts, "Reconnected to MQTT broker");
            }
            _ = shutdown_requested(shutdown) => return Ok(false),
        }

        self.subscribe(session).await?;
        Ok(true)
    }

    /// Mark the session connected and request the all-topics subscription.
    async fn subscribe(&self, session: &mut MqttSession) -> anyhow::Result<()> {
        self.state.send_replace(ConnectionState::Connected);
        session
            .subscribe_all()
            .await
            .context("Failed to request subscription")
    }
}

/// Wait for a spawned [`MqttSubscriber::run`] to finish, bounded by `grace`.
///
/// The subscriber's own error is returned unchanged. A panic or a task that
/// outlives `grace` is reported as an error as well.
pub async fn join_subscriber(
    task: JoinHandle<anyhow::Result<()>>,
    grace: Duration,
) -> anyhow::Result<()> {
    match tokio::time::timeout(grace, task).await {
        Ok(joined) => joined.context("Subscriber task panicked")?,
        Err(_) => anyhow::bail!("Subscriber did not stop within {}s", grace.as_secs()),
    }
}

/// Resolve once shutdown is signalled or the signal sender is gone.
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Fail if the broker refused any of the requested filters.
fn check_suback(ack: &SubAck) -> Result<(), Error> {
    debug!(pkid = ack.pkid, codes = ?ack.return_codes, "Received SUBACK");

    if ack
        .return_codes
        .iter()
        .any(|code| matches!(code, SubscribeReasonCode::Failure))
    {
        return Err(Error::Subscription(format!(
            "Broker refused subscription to '{}'",
            ALL_TOPICS
        )));
    }
    Ok(())
}
