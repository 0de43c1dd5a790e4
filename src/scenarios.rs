//! The three end-to-end safety scenarios from §8, as reusable functions.
//!
//! Each scenario builds its own environment from a caller-supplied seed,
//! drives it to completion with [`await_futures`], and returns `Err` with a
//! description of the first assertion that failed, so both `cargo test`
//! (see `tests/scenarios.rs`) and the `run_scenarios` demo binary can run
//! the same checks against a chosen or config-supplied interleaving seed.
use crate::client::Client;
use crate::future::{await_futures, Future, DEFAULT_AWAIT_BUDGET};
use crate::replica::Replica;
use crate::sim::Environment;
use crate::Value;

type ScenarioResult = std::result::Result<(), String>;

fn expect(condition: bool, message: impl Into<String>) -> ScenarioResult {
    if condition {
        Ok(())
    } else {
        Err(message.into())
    }
}

fn reply_of(f: &Future) -> (Value, Option<bool>) {
    let message = f.value();
    let (value, flag) = message.as_reply().expect("future resolved to a non-reply message");
    (value.clone(), flag)
}

/// `OneProcessSetGetTestCase` (§8): a single replica still runs a (trivial,
/// majority-of-one) Paxos round correctly, and a second `set` on an
/// already-decided key returns the original value with `flag=false`.
///
/// `seed` drives the environment's random stepper (see
/// [`crate::config::SimConfig::seed`]); callers that don't care about a
/// specific interleaving can pass `SimConfig::default().seed`.
pub fn one_process_set_get(seed: u64) -> ScenarioResult {
    let mut env = Environment::with_seed(seed);
    let client_pid = env.spawn_process(Client::new());
    let replica_pid = env.spawn_process(Replica::new(vec![1]));
    env.setup();

    let f = env.process_mut::<Client>(client_pid).unwrap().set(replica_pid, "the-key".into(), "the-value".into());
    await_futures(&mut env, &[f.clone()], DEFAULT_AWAIT_BUDGET).map_err(|e| e.to_string())?;
    let (value, flag) = reply_of(&f);
    expect(value == "the-value", format!("expected the-value, got {value}"))?;
    expect(flag == Some(true), "first set should win consensus (flag=true)")?;

    let f = env.process_mut::<Client>(client_pid).unwrap().set(replica_pid, "the-key".into(), "the-other-value".into());
    await_futures(&mut env, &[f.clone()], DEFAULT_AWAIT_BUDGET).map_err(|e| e.to_string())?;
    let (value, flag) = reply_of(&f);
    expect(value == "the-value", format!("key must stay decided at the-value, got {value}"))?;
    expect(flag == Some(false), "second set must lose (flag=false)")?;

    let f = env.process_mut::<Client>(client_pid).unwrap().get(replica_pid, "the-key".into());
    await_futures(&mut env, &[f.clone()], DEFAULT_AWAIT_BUDGET).map_err(|e| e.to_string())?;
    let (value, _) = reply_of(&f);
    expect(value == "the-value", format!("get should return the-value, got {value}"))
}

/// `ThreeProcessLearnSameValueTestCase` (§8): a value set on one replica is
/// eventually learned, and read back identically, on every replica.
pub fn three_process_learn_same_value(seed: u64) -> ScenarioResult {
    let mut env = Environment::with_seed(seed);
    let client_pid = env.spawn_process(Client::new());
    let replica_pids = vec![1, 2, 3];
    for &pid in &replica_pids {
        let spawned = env.spawn_process(Replica::new(replica_pids.clone()));
        expect(spawned == pid, "pids must be assigned densely in spawn order")?;
    }
    env.setup();

    let f = env.process_mut::<Client>(client_pid).unwrap().set(replica_pids[0], "the-key".into(), "the-value".into());
    await_futures(&mut env, &[f.clone()], DEFAULT_AWAIT_BUDGET).map_err(|e| e.to_string())?;
    let (value, flag) = reply_of(&f);
    expect(value == "the-value", format!("expected the-value, got {value}"))?;
    expect(flag == Some(true), "the only proposal should win consensus")?;

    let futures: Vec<_> = replica_pids
        .iter()
        .map(|&pid| env.process_mut::<Client>(client_pid).unwrap().get(pid, "the-key".into()))
        .collect();
    await_futures(&mut env, &futures, DEFAULT_AWAIT_BUDGET * 3).map_err(|e| e.to_string())?;

    for f in &futures {
        let (value, _) = reply_of(f);
        expect(value == "the-value", format!("all replicas must agree on the-value, got {value}"))?;
    }
    Ok(())
}

/// `ThreeProcessConcurrentSetsTestCase` (§8): three `set` calls race on the
/// same key against three different replicas before any of them can be
/// learned elsewhere. Exactly one proposal wins; every reply (including
/// later `get`s) must agree on that one value.
pub fn three_process_concurrent_sets(seed: u64) -> ScenarioResult {
    const N: usize = 3;
    let mut env = Environment::with_seed(seed);
    let client_pid = env.spawn_process(Client::new());
    let replica_pids: Vec<_> = (1..=N).collect();
    for &pid in &replica_pids {
        let spawned = env.spawn_process(Replica::new(replica_pids.clone()));
        expect(spawned == pid, "pids must be assigned densely in spawn order")?;
    }
    env.setup();

    let proposals: Vec<String> = (0..N).map(|i| format!("the-value-{i}")).collect();
    let futures: Vec<_> = replica_pids
        .iter()
        .zip(proposals.iter())
        .map(|(&pid, proposal)| {
            env.process_mut::<Client>(client_pid)
                .unwrap()
                .set(pid, "the-key".into(), proposal.clone())
        })
        .collect();
    await_futures(&mut env, &futures, DEFAULT_AWAIT_BUDGET * 3).map_err(|e| e.to_string())?;

    let mut decided_value: Option<String> = None;
    for (f, proposal) in futures.iter().zip(proposals.iter()) {
        let (value, flag) = reply_of(f);
        expect(proposals.contains(&value), format!("{value} was never proposed"))?;
        if flag == Some(true) {
            expect(decided_value.is_none(), "at-most-one-winner: a second flag=true reply was observed")?;
            expect(&value == proposal, "the winning reply's value must equal its own proposal")?;
            decided_value = Some(value);
        }
    }
    let decided_value = decided_value.ok_or_else(|| "no client ever observed flag=true".to_string())?;

    let futures: Vec<_> = replica_pids
        .iter()
        .map(|&pid| env.process_mut::<Client>(client_pid).unwrap().get(pid, "the-key".into()))
        .collect();
    await_futures(&mut env, &futures, DEFAULT_AWAIT_BUDGET * 3).map_err(|e| e.to_string())?;

    for f in &futures {
        let (value, _) = reply_of(f);
        expect(value == decided_value, format!("get returned {value}, expected winning value {decided_value}"))?;
    }
    Ok(())
}

/// Name, runnable pairs for every scenario, in the order the reference
/// harness lists them (used by both `tests/scenarios.rs` and
/// `run_scenarios`). Each runnable takes the RNG seed to build its
/// `Environment` with (see [`crate::config::SimConfig::seed`]).
pub fn all() -> Vec<(&'static str, fn(u64) -> ScenarioResult)> {
    vec![
        ("OneProcessSetGet", one_process_set_get as fn(u64) -> ScenarioResult),
        ("ThreeProcessLearnSameValue", three_process_learn_same_value as fn(u64) -> ScenarioResult),
        ("ThreeProcessConcurrentSets", three_process_concurrent_sets as fn(u64) -> ScenarioResult),
    ]
}
