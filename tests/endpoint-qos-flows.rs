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
use mqtt311_endpoint_tokio::mqtt_ep;

mod common;
mod stub_transport;

use common::{Event, RecordingHandler};
use stub_transport::StubTransport;

const CONNACK_ACCEPTED: [u8; 4] = [0x20, 0x02, 0x00, 0x00];

async fn attached_client(
    clean_session: bool,
) -> (
    mqtt_ep::Endpoint,
    StubTransport,
    std::sync::Arc<std::sync::Mutex<Vec<Event>>>,
) {
    common::init_tracing();
    let endpoint = mqtt_ep::Endpoint::new();
    let (handler, events) = RecordingHandler::new();
    endpoint.set_handler(handler).await.unwrap();

    let stub = StubTransport::new();
    let options = mqtt_ep::ConnectionOption::builder()
        .client_id("cid")
        .clean_session(clean_session)
        .build()
        .unwrap();
    endpoint
        .attach_with_options(stub.clone(), mqtt_ep::Mode::Client, options)
        .await
        .unwrap();
    (endpoint, stub, events)
}

/// Drive the CONNECT/CONNACK handshake so the session is live.
async fn establish(
    endpoint: &mqtt_ep::Endpoint,
    stub: &StubTransport,
    events: &std::sync::Arc<std::sync::Mutex<Vec<Event>>>,
) {
    endpoint.connect(0).await.unwrap();
    stub.feed_recv(CONNACK_ACCEPTED);
    common::wait_for("CONNACK delivery", || {
        events
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, Event::Connack { .. }))
    })
    .await;
    stub.clear_calls();
}

#[tokio::test]
async fn test_qos0_publish_wire_bytes() {
    let (endpoint, stub, _events) = attached_client(true).await;

    endpoint
        .publish_at_most_once("a/b", b"hi".to_vec(), false)
        .await
        .unwrap();

    assert_eq!(
        stub.sent_frames(),
        vec![vec![0x30, 0x07, 0x00, 0x03, 0x61, 0x2F, 0x62, 0x68, 0x69]]
    );
    // no acknowledgment expected, nothing stored
    assert!(endpoint.get_stored_packets().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_connect_wire_bytes() {
    let (endpoint, stub, _events) = attached_client(true).await;

    endpoint.connect(30).await.unwrap();

    let mut expected = vec![0x10, 0x0F, 0x00, 0x04];
    expected.extend_from_slice(b"MQTT");
    expected.extend_from_slice(&[0x04, 0x02, 0x00, 0x1E, 0x00, 0x03]);
    expected.extend_from_slice(b"cid");
    assert_eq!(stub.sent_frames(), vec![expected]);
}

#[tokio::test]
async fn test_qos1_round_trip() {
    let (endpoint, stub, events) = attached_client(true).await;
    establish(&endpoint, &stub, &events).await;

    let packet_id = endpoint
        .publish_at_least_once("a/b", b"hi".to_vec(), false)
        .await
        .unwrap();
    assert_eq!(packet_id, 1);
    assert_eq!(
        stub.sent_frames(),
        vec![vec![0x32, 0x09, 0x00, 0x03, 0x61, 0x2F, 0x62, 0x00, 0x01, 0x68, 0x69]]
    );

    let stored = endpoint.get_stored_packets().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].packet_id, 1);
    assert_eq!(stored[0].expected_response, mqtt_ep::PacketType::Puback);

    // broker acknowledges
    stub.feed_recv([0x40, 0x02, 0x00, 0x01]);
    common::wait_store_len(&endpoint, "PUBACK handling", 0).await;
    assert!(events
        .lock()
        .unwrap()
        .iter()
        .any(|e| *e == Event::Puback(1)));

    // identifier 1 went back to the pool
    endpoint.register_packet_id(1).await.unwrap();
    endpoint.release_packet_id(1).await.unwrap();
}

#[tokio::test]
async fn test_qos2_round_trip() {
    let (endpoint, stub, events) = attached_client(true).await;
    establish(&endpoint, &stub, &events).await;

    // occupy identifier 1 with a QoS 1 publish and settle it
    let first = endpoint
        .publish_at_least_once("a/b", b"hi".to_vec(), false)
        .await
        .unwrap();
    assert_eq!(first, 1);
    stub.feed_recv([0x40, 0x02, 0x00, 0x01]);
    common::wait_store_len(&endpoint, "first publish settled", 0).await;
    stub.clear_calls();

    let packet_id = endpoint
        .publish_exactly_once("a/b", b"hi".to_vec(), false)
        .await
        .unwrap();
    assert_eq!(packet_id, 2);
    assert_eq!(
        stub.sent_frames(),
        vec![vec![0x34, 0x09, 0x00, 0x03, 0x61, 0x2F, 0x62, 0x00, 0x02, 0x68, 0x69]]
    );

    // PUBREC flips the store entry to the PUBREL/PUBCOMP half
    stub.feed_recv([0x50, 0x02, 0x00, 0x02]);
    common::wait_for("automatic PUBREL", || {
        stub.sent_frames().len() == 2
    })
    .await;
    assert_eq!(stub.sent_frames()[1], vec![0x62, 0x02, 0x00, 0x02]);

    let stored = endpoint.get_stored_packets().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].packet_id, 2);
    assert_eq!(stored[0].expected_response, mqtt_ep::PacketType::Pubcomp);
    // identifier still held mid-handshake
    assert!(endpoint.register_packet_id(2).await.is_err());

    // PUBCOMP terminates the exchange
    stub.feed_recv([0x70, 0x02, 0x00, 0x02]);
    common::wait_store_len(&endpoint, "PUBCOMP handling", 0).await;
    assert!(events
        .lock()
        .unwrap()
        .iter()
        .any(|e| *e == Event::Pubcomp(2)));
    endpoint.register_packet_id(2).await.unwrap();
}

#[tokio::test]
async fn test_qos1_inbound_auto_puback() {
    common::init_tracing();
    let endpoint = mqtt_ep::Endpoint::new();
    let (handler, events) = RecordingHandler::new();
    endpoint.set_handler(handler).await.unwrap();

    let stub = StubTransport::new();
    endpoint
        .attach(stub.clone(), mqtt_ep::Mode::Server)
        .await
        .unwrap();

    // client connects, broker accepts
    let mut connect = vec![0x10, 0x0F, 0x00, 0x04];
    connect.extend_from_slice(b"MQTT");
    connect.extend_from_slice(&[0x04, 0x02, 0x00, 0x1E, 0x00, 0x03]);
    connect.extend_from_slice(b"cid");
    stub.feed_recv(connect);
    common::wait_for("CONNECT delivery", || {
        events
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, Event::Connect { .. }))
    })
    .await;
    endpoint
        .connack(false, mqtt_ep::ConnectReturnCode::Accepted)
        .await
        .unwrap();
    stub.clear_calls();

    // QoS 1 PUBLISH id=5, topic "t", payload "x"
    stub.feed_recv([0x32, 0x06, 0x00, 0x01, 0x74, 0x00, 0x05, 0x78]);
    common::wait_for("automatic PUBACK", || {
        stub.sent_frames() == vec![vec![0x40, 0x02, 0x00, 0x05]]
    })
    .await;

    let events = events.lock().unwrap();
    assert!(events.iter().any(|e| matches!(
        e,
        Event::Publish {
            qos: mqtt_ep::Qos::AtLeastOnce,
            packet_id: Some(5),
            ..
        }
    )));
    assert!(events.iter().any(|e| *e == Event::PubResSent(5)));
}

#[tokio::test]
async fn test_qos2_inbound_duplicate_suppression() {
    common::init_tracing();
    let endpoint = mqtt_ep::Endpoint::new();
    let (handler, events) = RecordingHandler::new();
    endpoint.set_handler(handler).await.unwrap();

    let stub = StubTransport::new();
    endpoint
        .attach(stub.clone(), mqtt_ep::Mode::Server)
        .await
        .unwrap();

    let mut connect = vec![0x10, 0x0F, 0x00, 0x04];
    connect.extend_from_slice(b"MQTT");
    connect.extend_from_slice(&[0x04, 0x02, 0x00, 0x1E, 0x00, 0x03]);
    connect.extend_from_slice(b"cid");
    stub.feed_recv(connect);
    common::wait_for("CONNECT delivery", || {
        events
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, Event::Connect { .. }))
    })
    .await;
    endpoint
        .connack(false, mqtt_ep::ConnectReturnCode::Accepted)
        .await
        .unwrap();
    stub.clear_calls();

    // the same QoS 2 PUBLISH id=7 arrives twice before PUBREL
    let publish = [0x34, 0x06, 0x00, 0x01, 0x74, 0x00, 0x07, 0x78];
    let mut twice = publish.to_vec();
    twice.extend_from_slice(&publish);
    stub.feed_recv(twice);

    common::wait_for("two PUBREC responses", || {
        stub.sent_frames().len() == 2
    })
    .await;
    assert_eq!(
        stub.sent_frames(),
        vec![vec![0x50, 0x02, 0x00, 0x07], vec![0x50, 0x02, 0x00, 0x07]]
    );
    let publish_deliveries = events
        .lock()
        .unwrap()
        .iter()
        .filter(|e| matches!(e, Event::Publish { .. }))
        .count();
    assert_eq!(publish_deliveries, 1, "duplicate must not reach the handler");
    assert_eq!(
        endpoint.get_qos2_publish_handled_pids().await.unwrap(),
        std::collections::HashSet::from([7])
    );

    // PUBREL retires the identifier and is answered with PUBCOMP
    stub.feed_recv([0x62, 0x02, 0x00, 0x07]);
    common::wait_for("automatic PUBCOMP", || {
        stub.sent_frames().len() == 3
    })
    .await;
    assert_eq!(stub.sent_frames()[2], vec![0x70, 0x02, 0x00, 0x07]);
    assert!(endpoint
        .get_qos2_publish_handled_pids()
        .await
        .unwrap()
        .is_empty());

    // a fresh publish under the same identifier is a new message
    stub.feed_recv(publish);
    common::wait_for("redelivery after PUBREL", || {
        events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| matches!(e, Event::Publish { .. }))
            .count()
            == 2
    })
    .await;
}
