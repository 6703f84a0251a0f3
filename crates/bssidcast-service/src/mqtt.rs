//! MQTT transport for publishing snapshots.
//!
//! [`MqttPublishClient`] implements [`PublishClient`] on top of `rumqttc`.
//!
//! # Broker URIs
//!
//! | Scheme | Transport | Default port |
//! |--------|-----------|--------------|
//! | `tcp://`, `mqtt://` | plain TCP | 1883 |
//! | `ssl://`, `mqtts://` | TLS (native-tls) | 8883 |
//!
//! # Reconnection
//!
//! `connect()` waits for the broker's ConnAck. After that a background task
//! keeps polling the event loop, which reconnects on its own if the link
//! drops. While it is down, `publish()` fails and the scheduler reports the
//! failure; the next tick tries again.
//!
//! Only the most recent `connect()` owns a session. A connect that is
//! overtaken by a later `connect()` or `disconnect()` tears its own link
//! down and returns [`Error::Cancelled`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, MqttOptions, Outgoing, Packet,
};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use bssidcast_core::{Error, PublishClient, QoS, Result};

use crate::config::MqttConfig;

/// Capacity of the request channel between client and event loop.
const REQUEST_CAPACITY: usize = 100;

/// Pause between reconnect attempts after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// How long `disconnect()` waits for the Disconnect packet to go out.
const DISCONNECT_GRACE: Duration = Duration::from_secs(2);

/// A parsed broker URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerAddress {
    pub host: String,
    pub port: u16,
    pub tls: bool,
}

/// Parse a broker URI into host, port and transport.
pub fn parse_broker_url(url: &str) -> std::result::Result<BrokerAddress, String> {
    let (tls, rest) = if let Some(stripped) = url
        .strip_prefix("tcp://")
        .or_else(|| url.strip_prefix("mqtt://"))
    {
        (false, stripped)
    } else if let Some(stripped) = url
        .strip_prefix("ssl://")
        .or_else(|| url.strip_prefix("mqtts://"))
    {
        (true, stripped)
    } else {
        return Err(format!(
            "invalid broker URI '{}': must start with tcp://, mqtt://, ssl:// or mqtts://",
            url
        ));
    };

    let rest = rest.trim_end_matches('/');
    let default_port = if tls { 8883 } else { 1883 };

    let (host, port) = if let Some((h, p)) = rest.rsplit_once(':') {
        let port = p
            .parse::<u16>()
            .map_err(|_| format!("invalid port '{}' in broker URI", p))?;
        (h.to_string(), port)
    } else {
        (rest.to_string(), default_port)
    };

    if host.is_empty() {
        return Err("broker host cannot be empty".to_string());
    }
    if port == 0 {
        return Err("broker port cannot be 0".to_string());
    }

    Ok(BrokerAddress { host, port, tls })
}

fn to_mqtt_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

/// One broker link: the request handle, its event-loop task and the
/// link state that task maintains.
struct Session {
    client: AsyncClient,
    poller: JoinHandle<()>,
    connected: Arc<AtomicBool>,
}

impl Session {
    fn abort(self) {
        self.connected.store(false, Ordering::Relaxed);
        self.poller.abort();
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

/// `rumqttc`-backed [`PublishClient`].
pub struct MqttPublishClient {
    keep_alive: Duration,
    credentials: Option<(String, String)>,
    /// Bumped by every `connect()` and `disconnect()`.
    generation: AtomicU64,
    session: Mutex<Option<Session>>,
}

impl MqttPublishClient {
    /// Create an unconnected client.
    pub fn new(keep_alive: Duration) -> Self {
        Self {
            keep_alive,
            credentials: None,
            generation: AtomicU64::new(0),
            session: Mutex::new(None),
        }
    }

    /// Create a client from the `[mqtt]` configuration section.
    pub fn from_config(config: &MqttConfig) -> Self {
        let mut client = Self::new(Duration::from_secs(config.keep_alive));
        if let Some(username) = &config.username {
            client = client.with_credentials(
                username.clone(),
                config.password.clone().unwrap_or_default(),
            );
        }
        client
    }

    /// Authenticate with a username and password.
    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.credentials = Some((username, password));
        self
    }

    async fn close_session(&self) -> Result<()> {
        let Some(mut session) = self.session.lock().await.take() else {
            return Ok(());
        };
        session.connected.store(false, Ordering::Relaxed);

        let result = session
            .client
            .disconnect()
            .await
            .map_err(|e| Error::DisconnectFailure(e.to_string()));

        if tokio::time::timeout(DISCONNECT_GRACE, &mut session.poller)
            .await
            .is_err()
        {
            debug!("MQTT event loop did not finish in time, aborting");
            session.poller.abort();
        }
        result
    }
}

#[async_trait]
impl PublishClient for MqttPublishClient {
    async fn connect(&self, broker_uri: &str, client_id: &str, timeout_secs: u64) -> Result<()> {
        let broker =
            parse_broker_url(broker_uri).map_err(|e| Error::connect_failure(broker_uri, e))?;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        if let Err(e) = self.close_session().await {
            debug!("Ignoring error closing previous MQTT session: {}", e);
        }

        let mut mqtt_options = MqttOptions::new(client_id, broker.host.as_str(), broker.port);
        mqtt_options.set_keep_alive(self.keep_alive);
        if let Some((username, password)) = &self.credentials {
            mqtt_options.set_credentials(username, password);
        }
        if broker.tls {
            mqtt_options.set_transport(rumqttc::Transport::tls_with_config(rumqttc::TlsConfiguration::Native));
        }

        let (client, mut eventloop) = AsyncClient::new(mqtt_options, REQUEST_CAPACITY);

        let handshake = async {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        return if ack.code == ConnectReturnCode::Success {
                            Ok(())
                        } else {
                            Err(format!("broker refused connection: {:?}", ack.code))
                        };
                    }
                    Ok(_) => {}
                    Err(e) => return Err(e.to_string()),
                }
            }
        };

        let timeout = Duration::from_secs(timeout_secs);
        let outcome = tokio::time::timeout(timeout, handshake).await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => return Err(Error::connect_failure(broker_uri, reason)),
            Err(_) => return Err(Error::connect_timeout(broker_uri, timeout)),
        }

        let connected = Arc::new(AtomicBool::new(true));
        let link = Arc::clone(&connected);
        let poller = tokio::spawn(async move {
            loop {
                match eventloop.poll().await {
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        info!("MQTT reconnected: {:?}", ack);
                        link.store(true, Ordering::Relaxed);
                    }
                    Ok(Event::Incoming(Packet::PingResp)) => {
                        debug!("MQTT ping response received");
                    }
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        debug!("MQTT disconnect sent");
                        break;
                    }
                    Ok(_) => {}
                    Err(ConnectionError::RequestsDone) => {
                        debug!("MQTT client dropped, stopping event loop");
                        link.store(false, Ordering::Relaxed);
                        break;
                    }
                    Err(e) => {
                        link.store(false, Ordering::Relaxed);
                        warn!("MQTT connection error: {}. Reconnecting...", e);
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        });
        let session = Session {
            client,
            poller,
            connected,
        };

        let mut slot = self.session.lock().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            drop(slot);
            debug!("MQTT connect to {} was superseded, closing it", broker_uri);
            session.abort();
            return Err(Error::Cancelled);
        }
        if let Some(previous) = slot.replace(session) {
            previous.abort();
        }

        info!("MQTT connected to {}:{}", broker.host, broker.port);
        Ok(())
    }

    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<()> {
        let client = match self.session.lock().await.as_ref() {
            Some(session) if session.is_connected() => session.client.clone(),
            _ => return Err(Error::publish_failure(topic, "not connected")),
        };

        client
            .publish(topic, to_mqtt_qos(qos), false, payload)
            .await
            .map_err(|e| Error::publish_failure(topic, e.to_string()))?;

        debug!("Queued snapshot for {}", topic);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.close_session().await
    }

    async fn is_connected(&self) -> bool {
        self.session
            .lock()
            .await
            .as_ref()
            .is_some_and(Session::is_connected)
    }
}

impl Drop for MqttPublishClient {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.abort();
        }
    }
}
