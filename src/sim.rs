//! The deterministic discrete-event simulation environment (§4.F, §5).
//!
//! Execution is single-threaded and cooperative: the environment never
//! invokes two process callbacks concurrently, so there is exactly one
//! logical thread of control and no shared-memory races within a run.
//! Suspension points are exactly the boundaries between steps - a callback
//! that sends several messages enqueues them atomically relative to other
//! processes, since nothing else runs until the callback returns.
use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use crate::Pid;

/// Which direction(s) of a process's channels [`Environment::step_by_delivering_messages`]
/// should drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Incoming,
    Outgoing,
    Both,
}

/// The contract a spawned process must implement to be driven by the
/// environment (§6 "Spawned-process contract").
///
/// `Process: Any` plus `as_any_mut` lets test code reach a specific spawned
/// process by pid (see [`Environment::process_mut`]) without the
/// environment giving up ownership of it - the Rust equivalent of the
/// reference's "process handles held by tests are weak references by pid"
/// (§3 Ownership): a test never outright owns a `Client`, it borrows one
/// back from the environment for the duration of a call.
pub trait Process: Any {
    /// Called once, after every process has been spawned, with the total
    /// process count - so a process can compute quorum sizes and the
    /// learner pid set (§9) up front.
    fn on_setup(&mut self, process_count: usize);

    /// Called on each tick step.
    fn on_tick(&mut self, ctx: &mut Context);

    /// Called on each delivery, with the raw bytes a sender passed to
    /// `Context::send`.
    fn on_receive(&mut self, ctx: &mut Context, sender: Pid, message: &[u8]);

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// A per-callback, scope-bound handle exposing the virtual clock and the
/// ability to send. Borrowing `Environment`'s fields rather than owning a
/// reference to the whole environment means the borrow checker enforces
/// that a context cannot outlive the callback it was built for - the
/// runtime "was this context destroyed" assertion the reference
/// implementation needs is, here, a compile error instead (§4.F, §5
/// "Cyclic collaboration").
pub struct Context<'a> {
    pid: Pid,
    time: &'a mut u64,
    channels: &'a mut HashMap<(Pid, Pid), VecDeque<(Vec<u8>, u64)>>,
}

impl<'a> Context<'a> {
    pub fn time(&self) -> u64 {
        *self.time
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Advances the clock by one and appends `message` to the
    /// `(self, recipient)` channel. Self-sends still go through this path
    /// for bookkeeping; replicas short-circuit same-pid sends before ever
    /// calling this (§5 "Reentrant self-delivery").
    pub fn send(&mut self, recipient: Pid, message: Vec<u8>) {
        *self.time += 1;
        let send_time = *self.time;
        self.channels
            .entry((self.pid, recipient))
            .or_default()
            .push_back((message, send_time));
    }
}

/// Owns every process and every per-ordered-pair FIFO channel in a
/// simulation run.
pub struct Environment {
    processes: Vec<Box<dyn Process>>,
    channels: HashMap<(Pid, Pid), VecDeque<(Vec<u8>, u64)>>,
    time: u64,
    dead: HashSet<Pid>,
    rng: StdRng,
}

impl Environment {
    /// A fixed default seed so `cargo test` runs are reproducible without
    /// callers having to thread one through explicitly. Use
    /// [`Environment::with_seed`] for property tests that need to vary it.
    pub fn new() -> Self {
        Self::with_seed(0xC0FFEE)
    }

    pub fn with_seed(seed: u64) -> Self {
        Environment {
            processes: Vec::new(),
            channels: HashMap::new(),
            time: 0,
            dead: HashSet::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    pub fn is_dead(&self, pid: Pid) -> bool {
        self.dead.contains(&pid)
    }

    /// Assigns the next pid and constructs the process with it, mirroring
    /// the reference `spawn_process(cls, ...)` (§4.F). The factory receives
    /// its own pid so constructors can build addressed `NetNode`-style
    /// state, though in this simulation pid is all a process needs.
    pub fn spawn_process<F, P>(&mut self, make: F) -> Pid
    where
        F: FnOnce(Pid) -> P,
        P: Process + 'static,
    {
        let pid = self.processes.len();
        let process = make(pid);
        debug!("spawned process pid={}", pid);
        self.processes.push(Box::new(process));
        pid
    }

    /// Creates channels between every ordered pair of distinct pids and
    /// calls `on_setup(process_count)` on every process. Must be called
    /// exactly once, after every process has been spawned: the process set
    /// is fixed thereafter (§1 "No reconfiguration").
    pub fn setup(&mut self) {
        let n = self.processes.len();
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    self.channels.insert((i, j), VecDeque::new());
                }
            }
        }
        debug!("created {} channels for {} processes", self.channels.len(), n);
        for process in self.processes.iter_mut() {
            process.on_setup(n);
        }
    }

    /// Marks `pid` dead. Subsequent tick/deliver operations targeting it
    /// are no-ops, and the random stepper skips it as a tick or channel
    /// endpoint.
    pub fn kill_process(&mut self, pid: Pid) {
        self.dead.insert(pid);
    }

    /// Borrows the process at `pid` back as a concrete `P`, e.g. so test
    /// code can call `Client::get`/`Client::set` on a spawned client
    /// without the environment giving up ownership. Returns `None` if
    /// `pid` is out of range or was spawned as a different type.
    pub fn process_mut<P: Process>(&mut self, pid: Pid) -> Option<&mut P> {
        self.processes.get_mut(pid)?.as_any_mut().downcast_mut::<P>()
    }

    pub fn step_by_ticking_process(&mut self, pid: Pid) {
        if self.dead.contains(&pid) {
            return;
        }
        self.time += 1;
        let entered_at = self.time;
        let Environment { processes, channels, time, .. } = self;
        let mut ctx = Context { pid, time, channels };
        processes[pid].on_tick(&mut ctx);
        trace!("t={:<5} pid={:<2} <-on_tick  # entered at t={}", self.time, pid, entered_at);
    }

    /// Drains every channel matching `direction` relative to `pid` in
    /// full, delivering each payload via `on_receive` in send order.
    pub fn step_by_delivering_messages(&mut self, pid: Pid, direction: Direction) {
        if self.dead.contains(&pid) {
            return;
        }
        let matching: Vec<(Pid, Pid)> = self
            .channels
            .keys()
            .copied()
            .filter(|&(s, r)| match direction {
                Direction::Incoming => r == pid,
                Direction::Outgoing => s == pid,
                Direction::Both => s == pid || r == pid,
            })
            .collect();
        for (sender, recipient) in matching {
            while self.channels.get(&(sender, recipient)).map_or(false, |q| !q.is_empty()) {
                self.step_receive_from_channel(sender, recipient);
            }
        }
    }

    /// With equal probability either ticks a uniformly-chosen live process
    /// or delivers one message from a uniformly-chosen non-empty channel
    /// whose two endpoints are both live; if no such channel exists, ticks
    /// instead (§4.F).
    pub fn step_randomly(&mut self) {
        let live_channels: Vec<(Pid, Pid)> = self
            .channels
            .iter()
            .filter(|(&(s, r), queue)| !queue.is_empty() && !self.dead.contains(&s) && !self.dead.contains(&r))
            .map(|(&k, _)| k)
            .collect();

        let deliver = !live_channels.is_empty() && self.rng.gen_bool(0.5);

        if deliver {
            let &(sender, recipient) = live_channels.choose(&mut self.rng).expect("checked non-empty above");
            self.step_receive_from_channel(sender, recipient);
        } else {
            let live_pids: Vec<Pid> = (0..self.processes.len()).filter(|p| !self.dead.contains(p)).collect();
            if let Some(&pid) = live_pids.choose(&mut self.rng) {
                self.step_by_ticking_process(pid);
            }
        }
    }

    fn step_receive_from_channel(&mut self, sender: Pid, recipient: Pid) {
        self.time += 1;
        let entered_at = self.time;
        let (payload, send_time) = self
            .channels
            .get_mut(&(sender, recipient))
            .expect("channel must exist between two spawned pids")
            .pop_front()
            .expect("caller only invokes this on a non-empty channel");
        trace!(
            "t={:<5} pid={:<2} ->on_receive(from={}, sent_at={})",
            self.time, recipient, sender, send_time
        );
        let Environment { processes, channels, time, .. } = self;
        let mut ctx = Context { pid: recipient, time, channels };
        processes[recipient].on_receive(&mut ctx, sender, &payload);
        trace!("t={:<5} pid={:<2} <-on_receive  # entered at t={}", self.time, recipient, entered_at);
    }
}

impl Default for Environment {
    fn default() -> Self {
        Environment::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo {
        received: Vec<(Pid, Vec<u8>)>,
    }

    impl Process for Echo {
        fn on_setup(&mut self, _process_count: usize) {}
        fn on_tick(&mut self, _ctx: &mut Context) {}
        fn on_receive(&mut self, _ctx: &mut Context, sender: Pid, message: &[u8]) {
            self.received.push((sender, message.to_vec()));
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn clock_strictly_increases_on_every_step() {
        let mut env = Environment::new();
        let a = env.spawn_process(|_| Echo { received: Vec::new() });
        let b = env.spawn_process(|_| Echo { received: Vec::new() });
        env.setup();
        env.step_by_ticking_process(a);
        let t1 = env.time();
        env.step_by_ticking_process(b);
        assert!(env.time() > t1);
    }

    struct Sender;
    impl Process for Sender {
        fn on_setup(&mut self, _n: usize) {}
        fn on_tick(&mut self, ctx: &mut Context) {
            ctx.send(0, b"first".to_vec());
            ctx.send(0, b"second".to_vec());
        }
        fn on_receive(&mut self, _ctx: &mut Context, _s: Pid, _m: &[u8]) {}
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    #[test]
    fn fifo_delivery_per_ordered_pair() {
        let mut env = Environment::new();
        let a = env.spawn_process(|_| Echo { received: Vec::new() });
        let sender_pid = env.spawn_process(|_| Sender);
        env.setup();
        env.step_by_ticking_process(sender_pid);
        env.step_by_delivering_messages(a, Direction::Incoming);
        // 1 tick (2 sends counted within it) + 2 receives.
        assert_eq!(env.time(), 4);
    }

    #[test]
    fn kill_process_makes_tick_and_deliver_no_ops() {
        let mut env = Environment::new();
        let a = env.spawn_process(|_| Echo { received: Vec::new() });
        env.setup();
        env.kill_process(a);
        let t0 = env.time();
        env.step_by_ticking_process(a);
        assert_eq!(env.time(), t0);
    }
}
