//! The process that hosts a key's worth of Paxos roles and answers client
//! requests once a value has been chosen (§4.D).
use std::any::Any;
use std::collections::HashMap;

use log::Level;

use crate::roles::RoleTriple;
use crate::sim::{Context, Process};
use crate::wire::{self, ClientRequest, Internal, WireMessage};
use crate::{Key, Pid, Value};

/// Work queued either from a `cls`-tagged internal message, or from the
/// replica's own handling of a client `set` - the `Propose` the reference
/// injects directly into the proposer without ever putting it on the wire
/// (§4.D).
enum RoleWork {
    FromWire(Internal),
    Propose { round: i64, value: Value },
}

/// A single Paxos replica. Hosts independent proposer/acceptor/learner
/// triples keyed by request key, materialized lazily on first touch (§9).
pub struct Replica {
    pid: Pid,
    roles: HashMap<Key, RoleTriple>,
    /// The full replica pid set, recorded explicitly at construction
    /// rather than derived from `process_count` at use time, so it never
    /// accidentally includes the client at pid 0 (§9 "Learner pid set").
    /// Every replica plays acceptor, proposer and learner for every key,
    /// so the same set serves both roles here.
    peers: Vec<Pid>,
    majority: usize,
    client_work: Vec<(Pid, u64, ClientRequest)>,
    internal_work: Vec<(Pid, Key, RoleWork)>,
}

impl Replica {
    /// `replica_pids` is every replica's pid, including this one. Returns
    /// a factory suitable for [`crate::sim::Environment::spawn_process`].
    pub fn new(replica_pids: Vec<Pid>) -> impl FnOnce(Pid) -> Replica {
        move |pid| {
            // Strict majority, not the reference's `n/2` (see DESIGN.md
            // "Majority threshold"): preserving the reference's non-strict
            // rounding would let a single acceptor's vote satisfy quorum
            // at n=3, which can break the Agreement invariant (§8) under
            // concurrent proposers.
            let majority = replica_pids.len() / 2 + 1;
            Replica {
                pid,
                roles: HashMap::new(),
                peers: replica_pids,
                majority,
                client_work: Vec::new(),
                internal_work: Vec::new(),
            }
        }
    }

    /// Send helper (§4.D): a self-addressed send is dispatched inline,
    /// within the current callback, rather than through a channel - the
    /// reentrant self-delivery described in §5. Everything else is
    /// encoded and handed to the environment.
    fn send(&mut self, ctx: &mut Context, recipient: Pid, message: WireMessage) -> crate::Result<()> {
        if recipient == self.pid {
            self.handle(ctx, self.pid, message)
        } else {
            let bytes = wire::encode(&message)?;
            ctx.send(recipient, bytes);
            Ok(())
        }
    }

    fn fan_out(&mut self, ctx: &mut Context, key: &Key, recipient: Pid, internal: Internal) -> crate::Result<()> {
        self.send(ctx, recipient, WireMessage::Internal { key: key.clone(), message: internal })
    }

    /// Dispatches one already-decoded message, queuing follow-up work for
    /// the next tick. Shared by `on_receive` (wire-delivered messages) and
    /// `send`'s self-delivery shortcut.
    fn handle(&mut self, _ctx: &mut Context, sender: Pid, message: WireMessage) -> crate::Result<()> {
        match message {
            WireMessage::ClientRequest { request_id, request } => {
                if let ClientRequest::Set { key, value } = &request {
                    self.internal_work.push((
                        sender,
                        key.clone(),
                        RoleWork::Propose { round: request_id as i64, value: value.clone() },
                    ));
                }
                self.client_work.push((sender, request_id, request));
            }
            WireMessage::Internal { key, message } => {
                self.internal_work.push((sender, key, RoleWork::FromWire(message)));
            }
            WireMessage::ClientReply { .. } => {
                warn!("replica {} received a client reply, which no replica ever sends", self.pid);
            }
        }
        Ok(())
    }

    /// Step 1 of a tick (§4.D): dispatch every queued internal message to
    /// the matching role method, forwarding whatever it emits.
    fn drain_internal_work(&mut self, ctx: &mut Context) -> crate::Result<()> {
        let work = std::mem::take(&mut self.internal_work);
        for (sender, key, item) in work {
            let triple = self.roles.entry(key.clone()).or_default();
            match item {
                RoleWork::Propose { round, value } => {
                    let prepares = triple.proposer.on_propose(round, value, &self.peers);
                    for prepare in prepares {
                        let acceptor = prepare.acceptor;
                        self.fan_out(ctx, &key, acceptor, Internal::Prepare(prepare))?;
                    }
                }
                RoleWork::FromWire(Internal::Prepare(p)) => {
                    if let Some(prepared) = triple.acceptor.on_prepare(sender, p.round) {
                        self.fan_out(ctx, &key, sender, Internal::Prepared(prepared))?;
                    }
                }
                RoleWork::FromWire(Internal::Prepared(p)) => {
                    let accepts = triple.proposer.on_prepared(
                        sender,
                        p.round,
                        p.voted_round,
                        p.voted_value,
                        self.majority,
                    );
                    for accept in accepts {
                        let acceptor = accept.acceptor;
                        self.fan_out(ctx, &key, acceptor, Internal::Accept(accept))?;
                    }
                }
                RoleWork::FromWire(Internal::Accept(a)) => {
                    let learns = triple.acceptor.on_accept(a.round, a.proposed_round, a.value, &self.peers);
                    for learn in learns {
                        let learner = learn.learner;
                        self.fan_out(ctx, &key, learner, Internal::Learn(learn))?;
                    }
                }
                RoleWork::FromWire(Internal::Learn(l)) => {
                    triple.learner.on_learn(sender, l.round, l.proposed_round, l.value, self.majority);
                }
            }
        }
        Ok(())
    }

    /// Step 2 of a tick (§4.D): answer pending client requests whose key
    /// now has a chosen value, re-enqueueing the rest for next tick.
    fn drain_client_work(&mut self, ctx: &mut Context) -> crate::Result<()> {
        let work = std::mem::take(&mut self.client_work);
        for (sender, request_id, request) in work {
            let triple = self.roles.get(request.key());
            let chosen = triple.and_then(|t| t.learner.chosen_value().cloned());
            let chosen_round = triple.and_then(|t| t.learner.chosen_round());

            match (chosen, &request) {
                (Some(value), ClientRequest::Get { .. }) => {
                    self.send(ctx, sender, WireMessage::ClientReply { request_id, value, flag: None })?;
                }
                (Some(value), ClientRequest::Set { .. }) => {
                    let flag = chosen_round == Some(request_id as i64);
                    self.send(ctx, sender, WireMessage::ClientReply { request_id, value, flag: Some(flag) })?;
                }
                (None, _) => {
                    self.client_work.push((sender, request_id, request));
                }
            }
        }
        Ok(())
    }
}

impl Process for Replica {
    fn on_setup(&mut self, _process_count: usize) {}

    fn on_tick(&mut self, ctx: &mut Context) {
        if let Err(e) = self.drain_internal_work(ctx) {
            warn!("replica {} failed draining internal work: {}", self.pid, e);
        }
        if let Err(e) = self.drain_client_work(ctx) {
            warn!("replica {} failed draining client work: {}", self.pid, e);
        }
    }

    fn on_receive(&mut self, ctx: &mut Context, sender: Pid, message: &[u8]) {
        let decoded = match wire::decode(message) {
            Ok(m) => m,
            Err(e) => {
                warn!("replica {} could not decode message from {}: {}", self.pid, sender, e);
                return;
            }
        };
        if log_enabled!(Level::Debug) {
            debug!("replica {} handling {:?} from {}", self.pid, decoded, sender);
        }
        if let Err(e) = self.handle(ctx, sender, decoded) {
            warn!("replica {} failed handling message from {}: {}", self.pid, sender, e);
        }
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
