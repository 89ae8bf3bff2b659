/**
 * MIT License
 *
 * Copyright (c) 2025 Takatoshi Kondo
 *
 * Permission is hereby granted, free of charge, to any person obtaining a copy
 * of this software and associated documentation files (the "Software"), to deal
 * in the Software without restriction, including without limitation the rights
 * to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
 * copies of the Software, and to permit persons to whom the Software is
 * furnished to do so, subject to the following conditions:
 *
 * The above copyright notice and this permission notice shall be included in all
 * copies or substantial portions of the Software.
 *
 * THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
 * IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
 * FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
 * AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
 * LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
 * OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
 * SOFTWARE.
 */
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use mqtt311_endpoint_tokio::mqtt_ep;

static INIT: Once = Once::new();

/// Automatic tracing initialization for ALL tests
///
/// Environment variables:
/// - `RUST_LOG`: Standard Rust logging (takes precedence if set)
/// - `MQTT_LOG_LEVEL`: Set log level (trace, debug, info, warn, error). Default: warn
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = if let Ok(rust_log) = std::env::var("RUST_LOG") {
            tracing_subscriber::EnvFilter::new(rust_log)
        } else {
            let level = std::env::var("MQTT_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());
            tracing_subscriber::EnvFilter::new(format!("mqtt311_endpoint_tokio={level}"))
        };

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_test_writer()
            .init();
    });
}

/// Poll a condition until it holds, panicking after one second. Endpoint
/// state changes ride the event-loop task, so tests observe them with a
/// bounded wait instead of a fixed sleep.
#[allow(dead_code)]
pub async fn wait_for(what: &str, mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !condition() {
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for: {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Wait until the outbound store holds exactly `len` entries.
#[allow(dead_code)]
pub async fn wait_store_len(endpoint: &mqtt_ep::Endpoint, what: &str, len: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    loop {
        if endpoint.get_stored_packets().await.unwrap().len() == len {
            return;
        }
        if tokio::time::Instant::now() > deadline {
            panic!("timed out waiting for: {what}");
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Everything a [`RecordingHandler`] observed, in callback order.
#[derive(Debug, Clone, PartialEq)]
#[allow(dead_code)]
pub enum Event {
    Connect {
        client_id: String,
        clean_session: bool,
    },
    Connack {
        session_present: bool,
        return_code: mqtt_ep::ConnectReturnCode,
    },
    Publish {
        dup: bool,
        qos: mqtt_ep::Qos,
        retain: bool,
        packet_id: Option<u16>,
        topic_name: String,
        payload: Vec<u8>,
    },
    Puback(u16),
    Pubrec(u16),
    Pubrel(u16),
    Pubcomp(u16),
    PubResSent(u16),
    Subscribe {
        packet_id: u16,
        entries: Vec<(String, mqtt_ep::Qos)>,
    },
    Suback {
        packet_id: u16,
        return_codes: Vec<mqtt_ep::SubackReturnCode>,
    },
    Unsubscribe {
        packet_id: u16,
        topic_filters: Vec<String>,
    },
    Unsuback(u16),
    Pingreq,
    Pingresp,
    Disconnect,
    Close,
    Error(String),
}

/// Handler that records every callback and keeps reading unless told
/// otherwise.
pub struct RecordingHandler {
    events: Arc<Mutex<Vec<Event>>>,
    publish_continue: bool,
}

#[allow(dead_code)]
impl RecordingHandler {
    pub fn new() -> (Self, Arc<Mutex<Vec<Event>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                events: events.clone(),
                publish_continue: true,
            },
            events,
        )
    }

    /// A handler whose `on_publish` stops the receive loop.
    pub fn stopping_on_publish() -> (Self, Arc<Mutex<Vec<Event>>>) {
        let (mut handler, events) = Self::new();
        handler.publish_continue = false;
        (handler, events)
    }

    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl mqtt_ep::EndpointHandler for RecordingHandler {
    fn on_close(&mut self) {
        self.push(Event::Close);
    }

    fn on_error(&mut self, error: &mqtt_ep::ConnectionError) {
        self.push(Event::Error(error.to_string()));
    }

    fn on_connect(&mut self, connect: &mqtt_ep::packet::Connect) -> bool {
        self.push(Event::Connect {
            client_id: connect.client_id.clone(),
            clean_session: connect.clean_session,
        });
        true
    }

    fn on_connack(
        &mut self,
        session_present: bool,
        return_code: mqtt_ep::ConnectReturnCode,
    ) -> bool {
        self.push(Event::Connack {
            session_present,
            return_code,
        });
        true
    }

    fn on_publish(
        &mut self,
        dup: bool,
        qos: mqtt_ep::Qos,
        retain: bool,
        packet_id: Option<u16>,
        topic_name: &str,
        payload: &[u8],
    ) -> bool {
        self.push(Event::Publish {
            dup,
            qos,
            retain,
            packet_id,
            topic_name: topic_name.to_owned(),
            payload: payload.to_vec(),
        });
        self.publish_continue
    }

    fn on_puback(&mut self, packet_id: u16) -> bool {
        self.push(Event::Puback(packet_id));
        true
    }

    fn on_pubrec(&mut self, packet_id: u16) -> bool {
        self.push(Event::Pubrec(packet_id));
        true
    }

    fn on_pubrel(&mut self, packet_id: u16) -> bool {
        self.push(Event::Pubrel(packet_id));
        true
    }

    fn on_pubcomp(&mut self, packet_id: u16) -> bool {
        self.push(Event::Pubcomp(packet_id));
        true
    }

    fn on_pub_res_sent(&mut self, packet_id: u16) {
        self.push(Event::PubResSent(packet_id));
    }

    fn on_subscribe(&mut self, packet_id: u16, entries: &[mqtt_ep::SubEntry]) -> bool {
        self.push(Event::Subscribe {
            packet_id,
            entries: entries
                .iter()
                .map(|e| (e.topic_filter.clone(), e.qos))
                .collect(),
        });
        true
    }

    fn on_suback(
        &mut self,
        packet_id: u16,
        return_codes: &[mqtt_ep::SubackReturnCode],
    ) -> bool {
        self.push(Event::Suback {
            packet_id,
            return_codes: return_codes.to_vec(),
        });
        true
    }

    fn on_unsubscribe(&mut self, packet_id: u16, topic_filters: &[String]) -> bool {
        self.push(Event::Unsubscribe {
            packet_id,
            topic_filters: topic_filters.to_vec(),
        });
        true
    }

    fn on_unsuback(&mut self, packet_id: u16) -> bool {
        self.push(Event::Unsuback(packet_id));
        true
    }

    fn on_pingreq(&mut self) -> bool {
        self.push(Event::Pingreq);
        true
    }

    fn on_pingresp(&mut self) -> bool {
        self.push(Event::Pingresp);
        true
    }

    fn on_disconnect(&mut self) {
        self.push(Event::Disconnect);
    }
}
