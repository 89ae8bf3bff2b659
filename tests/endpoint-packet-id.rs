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

#[tokio::test]
async fn test_acquire_register_release() {
    common::init_tracing();
    let endpoint = mqtt_ep::Endpoint::new();

    assert_eq!(endpoint.acquire_packet_id().await.unwrap(), 1);
    assert_eq!(endpoint.acquire_packet_id().await.unwrap(), 2);

    // collision with an acquired identifier
    assert!(matches!(
        endpoint.register_packet_id(1).await,
        Err(mqtt_ep::ConnectionError::Mqtt(
            mqtt_ep::MqttError::PacketIdCollision
        ))
    ));
    // zero is never valid
    assert!(endpoint.register_packet_id(0).await.is_err());

    endpoint.release_packet_id(1).await.unwrap();
    endpoint.register_packet_id(1).await.unwrap();
}

#[tokio::test]
async fn test_subscribe_releases_id_on_suback() {
    common::init_tracing();
    let endpoint = mqtt_ep::Endpoint::new();
    let (handler, events) = RecordingHandler::new();
    endpoint.set_handler(handler).await.unwrap();
    let stub = StubTransport::new();
    endpoint
        .attach(stub.clone(), mqtt_ep::Mode::Client)
        .await
        .unwrap();

    let packet_id = endpoint
        .subscribe(vec![mqtt_ep::SubEntry::new("a/b", mqtt_ep::Qos::AtLeastOnce)])
        .await
        .unwrap();
    assert_eq!(packet_id, 1);
    assert_eq!(
        stub.sent_frames(),
        vec![vec![0x82, 0x08, 0x00, 0x01, 0x00, 0x03, 0x61, 0x2F, 0x62, 0x01]]
    );
    assert!(endpoint.register_packet_id(packet_id).await.is_err());

    // SUBACK grants QoS 1 and frees the identifier
    stub.feed_recv([0x90, 0x03, 0x00, 0x01, 0x01]);
    common::wait_for("SUBACK delivery", || {
        events
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, Event::Suback { packet_id: 1, .. }))
    })
    .await;
    endpoint.register_packet_id(packet_id).await.unwrap();

    let events = events.lock().unwrap();
    assert!(events.iter().any(|e| *e
        == Event::Suback {
            packet_id: 1,
            return_codes: vec![mqtt_ep::SubackReturnCode::SuccessMaximumQos1],
        }));
}

#[tokio::test]
async fn test_suback_failure_code_surfaces() {
    common::init_tracing();
    let endpoint = mqtt_ep::Endpoint::new();
    let (handler, events) = RecordingHandler::new();
    endpoint.set_handler(handler).await.unwrap();
    let stub = StubTransport::new();
    endpoint
        .attach(stub.clone(), mqtt_ep::Mode::Client)
        .await
        .unwrap();

    let packet_id = endpoint
        .subscribe(vec![
            mqtt_ep::SubEntry::new("ok", mqtt_ep::Qos::AtMostOnce),
            mqtt_ep::SubEntry::new("denied", mqtt_ep::Qos::ExactlyOnce),
        ])
        .await
        .unwrap();

    stub.feed_recv([0x90, 0x04, 0x00, 0x01, 0x00, 0x80]);
    common::wait_for("SUBACK delivery", || {
        events
            .lock()
            .unwrap()
            .iter()
            .any(|e| matches!(e, Event::Suback { .. }))
    })
    .await;
    let events = events.lock().unwrap();
    assert!(events.iter().any(|e| *e
        == Event::Suback {
            packet_id,
            return_codes: vec![
                mqtt_ep::SubackReturnCode::SuccessMaximumQos0,
                mqtt_ep::SubackReturnCode::Failure,
            ],
        }));
}

#[tokio::test]
async fn test_unsubscribe_releases_id_on_unsuback() {
    common::init_tracing();
    let endpoint = mqtt_ep::Endpoint::new();
    let (handler, events) = RecordingHandler::new();
    endpoint.set_handler(handler).await.unwrap();
    let stub = StubTransport::new();
    endpoint
        .attach(stub.clone(), mqtt_ep::Mode::Client)
        .await
        .unwrap();

    let packet_id = endpoint.unsubscribe(vec!["a/b".to_string()]).await.unwrap();
    assert_eq!(
        stub.sent_frames(),
        vec![vec![0xA2, 0x07, 0x00, 0x01, 0x00, 0x03, 0x61, 0x2F, 0x62]]
    );

    stub.feed_recv([0xB0, 0x02, 0x00, 0x01]);
    common::wait_for("UNSUBACK delivery", || {
        events
            .lock()
            .unwrap()
            .iter()
            .any(|e| *e == Event::Unsuback(1))
    })
    .await;
    endpoint.register_packet_id(packet_id).await.unwrap();
}

#[tokio::test]
async fn test_manual_id_variants() {
    common::init_tracing();
    let endpoint = mqtt_ep::Endpoint::new();
    let stub = StubTransport::new();
    endpoint
        .attach(stub.clone(), mqtt_ep::Mode::Client)
        .await
        .unwrap();

    // caller-chosen identifier is accepted once
    assert!(endpoint
        .publish_at_least_once_with_id(42, "t", b"x".to_vec(), false)
        .await
        .unwrap());
    // and refused while in flight, without sending anything
    let frames_before = stub.sent_frames().len();
    assert!(!endpoint
        .publish_at_least_once_with_id(42, "t", b"x".to_vec(), false)
        .await
        .unwrap());
    assert_eq!(stub.sent_frames().len(), frames_before);

    // subscribe_with_id behaves the same way
    assert!(endpoint
        .subscribe_with_id(43, vec![mqtt_ep::SubEntry::new("a", mqtt_ep::Qos::AtMostOnce)])
        .await
        .unwrap());
    assert!(!endpoint
        .subscribe_with_id(43, vec![mqtt_ep::SubEntry::new("a", mqtt_ep::Qos::AtMostOnce)])
        .await
        .unwrap());

    // automatic allocation skips caller-registered identifiers
    endpoint.register_packet_id(1).await.unwrap();
    let id = endpoint.acquire_packet_id().await.unwrap();
    assert_eq!(id, 2);
}

#[tokio::test]
async fn test_publish_dup_sets_flag() {
    common::init_tracing();
    let endpoint = mqtt_ep::Endpoint::new();
    let stub = StubTransport::new();
    endpoint
        .attach(stub.clone(), mqtt_ep::Mode::Client)
        .await
        .unwrap();

    assert!(endpoint
        .publish_dup(9, "t", b"x".to_vec(), mqtt_ep::Qos::AtLeastOnce, false)
        .await
        .unwrap());
    assert_eq!(
        stub.sent_frames(),
        vec![vec![0x3A, 0x06, 0x00, 0x01, 0x74, 0x00, 0x09, 0x78]]
    );
}
