//! Randomized version of `ThreeProcessConcurrentSets` (§8 item 4): for an
//! arbitrary replica count and an arbitrary interleaving seed, the same
//! safety properties must hold - Agreement (every learner that decides,
//! decides the same value), Validity (a decided value was actually
//! proposed by someone), Integrity (a future resolves exactly once,
//! enforced by `Future::set_value`'s own assertion rather than re-checked
//! here), at-most-one-winner, and read-after-write coherence between `set`
//! and a later `get`.
use proptest::prelude::*;

use paxos_kv_sim::client::Client;
use paxos_kv_sim::future::{await_futures, DEFAULT_AWAIT_BUDGET};
use paxos_kv_sim::replica::Replica;
use paxos_kv_sim::sim::Environment;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn concurrent_sets_agree_under_any_interleaving(
        replica_count in 3usize..6,
        seed in any::<u64>(),
    ) {
        let mut env = Environment::with_seed(seed);
        let client_pid = env.spawn_process(Client::new());
        let replica_pids: Vec<_> = (1..=replica_count).collect();
        for &pid in &replica_pids {
            let spawned = env.spawn_process(Replica::new(replica_pids.clone()));
            prop_assert_eq!(spawned, pid);
        }
        env.setup();

        let proposals: Vec<String> = (0..replica_count).map(|i| format!("value-{i}")).collect();
        let futures: Vec<_> = replica_pids
            .iter()
            .zip(proposals.iter())
            .map(|(&pid, proposal)| {
                env.process_mut::<Client>(client_pid)
                    .unwrap()
                    .set(pid, "k".into(), proposal.clone())
            })
            .collect();
        await_futures(&mut env, &futures, DEFAULT_AWAIT_BUDGET * replica_count)
            .expect("at least one set should resolve within budget");

        let mut decided: Option<String> = None;
        for (f, proposal) in futures.iter().zip(proposals.iter()) {
            if !f.has_value() {
                continue;
            }
            let message = f.value();
            let (value, flag) = message.as_reply().expect("set reply");
            prop_assert!(proposals.contains(value), "{} was never proposed", value);
            if flag == Some(true) {
                if let Some(already) = &decided {
                    prop_assert_eq!(already, value, "two different values both reported flag=true");
                }
                prop_assert_eq!(value, proposal, "winner's reply must match its own proposal");
                decided = Some(value.clone());
            }
        }

        if let Some(decided) = decided {
            let gets: Vec<_> = replica_pids
                .iter()
                .map(|&pid| env.process_mut::<Client>(client_pid).unwrap().get(pid, "k".into()))
                .collect();
            await_futures(&mut env, &gets, DEFAULT_AWAIT_BUDGET * replica_count)
                .expect("gets should resolve once a value was chosen");
            for f in &gets {
                if !f.has_value() {
                    continue;
                }
                let message = f.value();
                let (value, _) = message.as_reply().expect("get reply");
                prop_assert_eq!(value, &decided, "a later get disagreed with the decided value");
            }
        }
    }
}
