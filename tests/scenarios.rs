//! The three end-to-end scenarios from §8, run as ordinary `#[test]`
//! functions - Rust's test harness gives us independent, individually
//! reportable tests for free, so there's no need for the reference's
//! parametrized-by-implementation `BaseTestCase`/`impl_cls` indirection:
//! there is only one implementation here.
use paxos_kv_sim::config::SimConfig;
use paxos_kv_sim::scenarios::{one_process_set_get, three_process_concurrent_sets, three_process_learn_same_value};

#[test]
fn one_process_set_get_works() {
    one_process_set_get(SimConfig::default().seed).expect("OneProcessSetGet scenario");
}

#[test]
fn three_process_learn_same_value_works() {
    three_process_learn_same_value(SimConfig::default().seed).expect("ThreeProcessLearnSameValue scenario");
}

#[test]
fn three_process_concurrent_sets_works() {
    three_process_concurrent_sets(SimConfig::default().seed).expect("ThreeProcessConcurrentSets scenario");
}
