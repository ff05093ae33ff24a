use dramctl_core::Simulator;
use dramctl_core::common::{CommandKind, Completion, Payload, Request, RequestTag};
use dramctl_core::config::Config;
use dramctl_core::sim::{CompletionRecord, Pattern, Workload};
use dramctl_core::timing::TimingModel;

/// One traced command reduced to the fields the scenarios compare.
pub type Cmd = (u64, CommandKind, usize, u32, u32);

/// 4 banks, burst length 4, tREFI 64, tRFC 8, tRAS 4.
pub fn scenario_config() -> Config {
    let mut config = Config::default();
    config.timing.t_refi = 64;
    config.timing.t_rfc = 8;
    config.timing.t_ras = 4;
    config
}

/// The scenario configuration with refresh switched off and deep queues.
pub fn quiet_config() -> Config {
    let mut config = scenario_config();
    config.controller.with_refresh = false;
    config.controller.req_queue_size = 64;
    config
}

#[derive(Debug)]
pub struct TestContext {
    pub sim: Simulator,
    next_tag: u64,
}

impl TestContext {
    pub fn new(config: &Config) -> Self {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
        Self {
            sim: Simulator::new(config).expect("valid test config"),
            next_tag: 0,
        }
    }

    fn tag(&mut self) -> RequestTag {
        let tag = RequestTag(self.next_tag);
        self.next_tag += 1;
        tag
    }

    /// Queues a read and returns its tag.
    pub fn read(&mut self, bank: usize, row: u32, column: u32) -> RequestTag {
        let tag = self.tag();
        self.submit(Request::read(bank, row, column, tag));
        tag
    }

    /// Queues a write of `word` on every phase and returns its tag.
    pub fn write(&mut self, bank: usize, row: u32, column: u32, word: u64) -> RequestTag {
        let tag = self.tag();
        let nphases = self.sim.controller().timing().nphases();
        self.submit(Request::write(bank, row, column, Payload::splat(word, nphases), tag));
        tag
    }

    pub fn submit(&mut self, request: Request) {
        assert!(self.sim.submit(request).is_ok(), "test queue overflow");
    }

    /// Runs until idle and asserts the device saw a legal command stream.
    pub fn run_to_idle(&mut self) {
        assert!(
            self.sim.run_until_idle(100_000).is_some(),
            "controller did not drain"
        );
        assert!(
            self.sim.violations().is_empty(),
            "timing violations: {:?}",
            self.sim.violations()
        );
    }

    /// Ticks `cycles` times, topping the bank queues up from `workload` before each cycle.
    ///
    /// Stops generating once `limit` requests have been issued. A request whose
    /// bank queue is full is held back until it fits.
    pub fn feed(&mut self, workload: &mut Workload, limit: u64, cycles: u64) {
        let mut held: Option<Request> = None;
        for _ in 0..cycles {
            loop {
                if held.is_none() && workload.issued() < limit {
                    held = Some(workload.next_request());
                }
                match held.take() {
                    Some(request) if self.sim.has_room(request.bank) => self.submit(request),
                    other => {
                        held = other;
                        break;
                    }
                }
            }
            let _ = self.sim.tick();
        }
        if let Some(request) = held {
            // The bank queue drains within a bounded time; wait for room.
            while !self.sim.has_room(request.bank) {
                let _ = self.sim.tick();
            }
            self.submit(request);
        }
    }

    /// Every traced command.
    pub fn commands(&self) -> Vec<Cmd> {
        self.sim
            .trace()
            .iter()
            .map(|c| (c.cycle, c.kind, c.bank, c.row, c.column))
            .collect()
    }

    pub fn kinds(&self) -> Vec<CommandKind> {
        self.sim.trace().iter().map(|c| c.kind).collect()
    }

    /// Completion record for `tag`.
    pub fn completion(&self, tag: RequestTag) -> &CompletionRecord {
        self.sim
            .completions()
            .iter()
            .find(|r| r.completion.tag() == tag)
            .expect("request completed")
    }

    /// Read data returned for `tag`.
    pub fn read_data(&self, tag: RequestTag) -> Payload {
        match &self.completion(tag).completion {
            Completion::Read { data, .. } => data.clone(),
            Completion::Write { .. } => panic!("{tag} is a write"),
        }
    }
}

/// A workload over the geometry of `config`.
pub fn workload(config: &Config, pattern: Pattern, seed: u64, write_percent: u8) -> Workload {
    let timing = TimingModel::new(config).expect("valid test config");
    Workload::new(pattern, seed, write_percent, &timing)
}

/// Longest a bank with a pending command can be passed over while the
/// refresher is idle.
///
/// Per bank, one full close-open-access sequence plus the write turnaround and
/// activate spacing; plus both read/write budgets and the row-hit bypass limit.
pub fn starvation_bound(timing: &TimingModel) -> u64 {
    let sequence = timing.t_ras().max(timing.phy_write_latency() + timing.t_wr())
        + timing.t_rp()
        + timing.t_rcd()
        + timing.phy_write_latency()
        + timing.t_wtr()
        + timing.t_rrd();
    timing.nbanks() as u64 * u64::from(sequence + 1)
        + u64::from(timing.read_time() + timing.write_time() + timing.row_hit_bypass_limit())
}
