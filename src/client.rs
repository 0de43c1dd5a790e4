//! The client process: issues `get`/`set` calls against a replica and
//! matches replies back to the call that made them via the request id
//! (§4.E).
use std::any::Any;
use std::collections::HashMap;

use crate::future::Future;
use crate::sim::{Context, Process};
use crate::wire::{self, ClientRequest, WireMessage};
use crate::{Key, Pid, Value};

struct PendingCall {
    destination: Pid,
    request_id: u64,
    request: ClientRequest,
    future: Future,
}

/// Issues requests and tracks the futures awaiting their replies.
/// `pending_requests` holds calls not yet sent; on the next tick each is
/// sent and its future moves to `active_requests`, keyed by request id
/// (§4.E).
#[derive(Default)]
pub struct Client {
    next_request_id: u64,
    pending_requests: Vec<PendingCall>,
    active_requests: HashMap<u64, Future>,
}

impl Client {
    pub fn new() -> impl FnOnce(Pid) -> Client {
        |_pid| Client::default()
    }

    /// Queues a `get` for `key`, returning a future resolved once the
    /// reply is delivered.
    pub fn get(&mut self, destination: Pid, key: Key) -> Future {
        self.call(destination, ClientRequest::Get { key })
    }

    /// Queues a `set` of `key` to `value`, returning a future resolved
    /// once the reply is delivered.
    pub fn set(&mut self, destination: Pid, key: Key, value: Value) -> Future {
        self.call(destination, ClientRequest::Set { key, value })
    }

    fn call(&mut self, destination: Pid, request: ClientRequest) -> Future {
        let request_id = self.next_request_id;
        self.next_request_id += 1;
        let future = Future::new();
        self.pending_requests.push(PendingCall {
            destination,
            request_id,
            request,
            future: future.clone(),
        });
        future
    }
}

impl Process for Client {
    fn on_setup(&mut self, _process_count: usize) {}

    fn on_tick(&mut self, ctx: &mut Context) {
        for pending in std::mem::take(&mut self.pending_requests) {
            let message = WireMessage::ClientRequest {
                request_id: pending.request_id,
                request: pending.request,
            };
            match wire::encode(&message) {
                Ok(bytes) => {
                    ctx.send(pending.destination, bytes);
                    self.active_requests.insert(pending.request_id, pending.future);
                }
                Err(e) => warn!("client could not encode request {}: {}", pending.request_id, e),
            }
        }
    }

    fn on_receive(&mut self, _ctx: &mut Context, sender: Pid, message: &[u8]) {
        let decoded = match wire::decode(message) {
            Ok(m) => m,
            Err(e) => {
                warn!("client could not decode reply from {}: {}", sender, e);
                return;
            }
        };
        if let WireMessage::ClientReply { request_id, .. } = &decoded {
            match self.active_requests.remove(request_id) {
                Some(future) => future.set_value(decoded),
                None => warn!("client received a reply for unknown request id {}", request_id),
            }
        } else {
            warn!("client received a non-reply message from {}", sender);
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
