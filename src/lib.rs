//! A single-decree Paxos replicated key-value register, plus the
//! deterministic discrete-event simulation harness used to exercise it.
//!
//! This crate is a teaching and testing scaffold, not a production server:
//! processes run the Paxos protocol over an in-memory simulated network
//! (`sim`), and a test driver steps the simulation - by tick, by delivery,
//! or by arbitrary random interleaving - to check the protocol's safety
//! properties hold under every interleaving a scheduler could produce.
//!
//! # Layout
//!
//! - [`roles`] - the per-key Acceptor / Proposer / Learner state machines.
//! - [`wire`] - the message types exchanged between processes.
//! - [`replica`] - the process that hosts a key's worth of roles and
//!   answers client requests once a value is chosen.
//! - [`client`] - the process that issues `get`/`set` calls and matches
//!   replies back to the call that made them.
//! - [`sim`] - the environment: process registry, per-pair FIFO channels,
//!   the virtual clock, and the tick/deliver/random-step primitives.
//! - [`future`] - the single-assignment result cell the client hands back
//!   from `call`, and the `await_futures` test helper built on it.
//! - [`config`] - run parameters (process count, await budget, seed)
//!   loadable from a TOML file or overridden on the CLI.
//! - [`error`] - the error taxonomy.
//! - [`scenarios`] - the end-to-end safety scenarios, shared by the test
//!   suite and the `run_scenarios` demo binary.
#[macro_use]
extern crate log;

pub mod client;
pub mod config;
pub mod error;
pub mod future;
pub mod replica;
pub mod roles;
pub mod scenarios;
pub mod sim;
pub mod wire;

/// A dense, non-negative process identifier assigned by the environment at
/// spawn time. Stable for the lifetime of a simulation run (§3).
pub type Pid = usize;

/// An opaque key, the index into a replica's per-key role state (§3).
pub type Key = String;

/// An opaque payload: the body of a `set`, the reply to a `get` (§3).
pub type Value = String;

/// A totally-ordered proposal round. The reference harness uses the
/// client's request id directly as the round, which doubles as a
/// proposer-identity-free ballot number (§3, §9): collisions across
/// replicas are possible and permitted, not a bug.
pub type Round = i64;

pub use error::{PaxosError, Result};
