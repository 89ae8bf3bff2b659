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
use std::collections::VecDeque;
use std::future::Future;
use std::io::IoSlice;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use mqtt311_endpoint_tokio::mqtt_ep::{TransportError, TransportOps};

/// Call record for tracking method invocations
#[derive(Debug, Clone, PartialEq)]
#[allow(dead_code)]
pub enum TransportCall {
    Send { data: Vec<u8> },
    Recv,
    Shutdown { timeout: Duration },
}

#[derive(Default)]
struct RecvState {
    data: VecDeque<u8>,
    closed: bool,
    errors: VecDeque<TransportError>,
}

/// Stub transport for driving the endpoint without a network.
///
/// The test side feeds inbound bytes (or a close, or an error) at any
/// time; the endpoint side blocks in `recv` until something is available.
/// Every `send` is recorded as one call, so tests assert on exact wire
/// bytes and their order.
#[derive(Clone)]
pub struct StubTransport {
    calls: Arc<Mutex<Vec<TransportCall>>>,
    recv_state: Arc<Mutex<RecvState>>,
    recv_notify: Arc<Notify>,
    send_errors: Arc<Mutex<VecDeque<TransportError>>>,
}

#[allow(dead_code)]
impl StubTransport {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            recv_state: Arc::new(Mutex::new(RecvState::default())),
            recv_notify: Arc::new(Notify::new()),
            send_errors: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    /// Make the next bytes available to the endpoint's receive pipeline.
    pub fn feed_recv(&self, bytes: impl Into<Vec<u8>>) {
        self.recv_state
            .lock()
            .unwrap()
            .data
            .extend(bytes.into());
        self.recv_notify.notify_one();
    }

    /// Signal a clean close: the next drained `recv` returns `Ok(0)`.
    pub fn feed_close(&self) {
        self.recv_state.lock().unwrap().closed = true;
        self.recv_notify.notify_one();
    }

    /// Make the next `recv` fail.
    pub fn feed_recv_error(&self, error: TransportError) {
        self.recv_state.lock().unwrap().errors.push_back(error);
        self.recv_notify.notify_one();
    }

    /// Make the next `send` fail.
    pub fn push_send_error(&self, error: TransportError) {
        self.send_errors.lock().unwrap().push_back(error);
    }

    pub fn get_calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    /// The payload of every successful or attempted send, in order.
    pub fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|call| match call {
                TransportCall::Send { data } => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn shutdown_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| matches!(call, TransportCall::Shutdown { .. }))
            .count()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

impl Default for StubTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TransportOps for StubTransport {
    fn send<'a>(
        &'a mut self,
        buffers: &'a [IoSlice<'a>],
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let mut data = Vec::new();
            for buffer in buffers {
                data.extend_from_slice(buffer);
            }
            self.calls
                .lock()
                .unwrap()
                .push(TransportCall::Send { data });
            match self.send_errors.lock().unwrap().pop_front() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        })
    }

    fn recv<'a>(
        &'a mut self,
        buffer: &'a mut [u8],
    ) -> Pin<Box<dyn Future<Output = Result<usize, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            loop {
                let notified = self.recv_notify.notified();
                {
                    let mut state = self.recv_state.lock().unwrap();
                    if let Some(error) = state.errors.pop_front() {
                        self.calls.lock().unwrap().push(TransportCall::Recv);
                        return Err(error);
                    }
                    if !state.data.is_empty() {
                        let n = buffer.len().min(state.data.len());
                        for byte in buffer.iter_mut().take(n) {
                            *byte = state.data.pop_front().unwrap();
                        }
                        self.calls.lock().unwrap().push(TransportCall::Recv);
                        return Ok(n);
                    }
                    if state.closed {
                        self.calls.lock().unwrap().push(TransportCall::Recv);
                        return Ok(0);
                    }
                }
                notified.await;
            }
        })
    }

    fn shutdown<'a>(
        &'a mut self,
        timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + 'a>> {
        Box::pin(async move {
            self.calls
                .lock()
                .unwrap()
                .push(TransportCall::Shutdown { timeout });
        })
    }
}
