//! # Simulation Runs
//!
//! Synthetic workloads driven end to end through the simulator: queues,
//! controller and the checking device model.

use dramctl_core::common::{Payload, Request, RequestTag, SubmitError};
use dramctl_core::config::ArbitrationPolicy;
use dramctl_core::sim::Pattern;
use pretty_assertions::assert_eq;
use rstest::rstest;

use crate::common::harness::{TestContext, scenario_config, workload};

const REQUESTS: u64 = 400;

#[rstest]
fn test_workload_completes(
    #[values(Pattern::Sequential, Pattern::Random, Pattern::Thrash)] pattern: Pattern,
    #[values(
        ArbitrationPolicy::RoundRobin,
        ArbitrationPolicy::RowHitFirst,
        ArbitrationPolicy::ReadWriteBudget
    )]
    policy: ArbitrationPolicy,
) {
    let mut config = scenario_config();
    config.controller.policy = policy;
    let mut ctx = TestContext::new(&config);
    let mut traffic = workload(&config, pattern, 42, 30);

    while traffic.issued() < REQUESTS {
        ctx.feed(&mut traffic, REQUESTS, 1);
    }
    ctx.run_to_idle();

    let stats = ctx.sim.stats();
    assert_eq!(stats.reads_completed + stats.writes_completed, REQUESTS);
    assert_eq!(stats.cmd_read + stats.cmd_write, REQUESTS);
    assert_eq!(stats.row_hits + stats.row_misses + stats.row_empty, REQUESTS);
    // Refresh can close a row between accept and access, adding activates.
    assert!(stats.cmd_activate >= stats.row_misses + stats.row_empty);
    assert!(stats.cmd_precharge <= stats.row_misses);
    assert!(stats.cmd_precharge_all - stats.cmd_refresh <= 1);
    assert!(stats.cmd_refresh >= stats.cycles / u64::from(config.timing.t_refi));
    assert_eq!(stats.timing_violations, 0);
    assert_eq!(ctx.sim.completions().len() as u64, REQUESTS);

    if pattern == Pattern::Thrash {
        assert_eq!(stats.row_hits, 0);
    }
}

#[test]
fn test_sequential_is_mostly_row_hits() {
    let config = scenario_config();
    let mut ctx = TestContext::new(&config);
    let mut traffic = workload(&config, Pattern::Sequential, 1, 0);
    while traffic.issued() < REQUESTS {
        ctx.feed(&mut traffic, REQUESTS, 1);
    }
    ctx.run_to_idle();

    let stats = ctx.sim.stats();
    assert!(
        stats.row_hits > stats.row_misses + stats.row_empty,
        "hits {} misses {} empty {}",
        stats.row_hits,
        stats.row_misses,
        stats.row_empty
    );
    assert!(stats.mean_read_latency() > 0.0);
}

#[test]
fn test_full_queue_rejects_request() {
    let mut config = scenario_config();
    config.controller.req_queue_size = 2;
    let mut ctx = TestContext::new(&config);
    let _ = ctx.read(0, 1, 0);
    let _ = ctx.read(0, 1, 1);
    assert!(!ctx.sim.has_room(0));
    assert!(ctx.sim.has_room(1));

    let rejected = Request::read(0, 1, 2, RequestTag(99));
    assert_eq!(
        ctx.sim.submit(rejected.clone()),
        Err(SubmitError::QueueFull(rejected))
    );
    assert_eq!(ctx.sim.stats().queue_rejections, 1);

    ctx.run_to_idle();
    assert_eq!(ctx.sim.stats().reads_completed, 2);
}

#[rstest]
#[case::column_on_a10(0, 5, 256)]
#[case::column_wraps_to_zero(0, 5, 1 << 30)]
#[case::row_wider_than_bus(1, (1 << 13) + 5, 0)]
#[case::unknown_bank(4, 5, 0)]
fn test_out_of_geometry_request_rejected(
    #[case] bank: usize,
    #[case] row: u32,
    #[case] column: u32,
) {
    let mut ctx = TestContext::new(&scenario_config());
    let rejected = Request::write(bank, row, column, Payload::splat(0xbeef, 2), RequestTag(7));
    assert_eq!(
        ctx.sim.submit(rejected.clone()),
        Err(SubmitError::OutOfRange(rejected))
    );
    assert!(ctx.sim.is_idle());

    // Nothing aliased onto column 0 of the in-range row.
    let read = ctx.read(bank.min(3), row & 0x1fff, 0);
    ctx.run_to_idle();
    assert_eq!(ctx.read_data(read), Payload::zeroed(2));
    assert_eq!(ctx.sim.stats().writes_completed, 0);
    assert_eq!(ctx.sim.stats().queue_rejections, 0);
}

#[test]
fn test_duplicate_in_flight_tag_rejected() {
    let mut ctx = TestContext::new(&scenario_config());
    ctx.submit(Request::read(0, 1, 0, RequestTag(5)));
    let duplicate = Request::read(1, 2, 0, RequestTag(5));
    assert_eq!(
        ctx.sim.submit(duplicate.clone()),
        Err(SubmitError::DuplicateTag(duplicate))
    );
    ctx.run_to_idle();
    assert_eq!(ctx.sim.stats().reads_completed, 1);
    assert_eq!(ctx.sim.completions().len(), 1);

    // Once completed, the tag may be reused.
    ctx.submit(Request::read(1, 2, 0, RequestTag(5)));
    ctx.run_to_idle();
    assert_eq!(ctx.sim.stats().reads_completed, 2);
}

#[test]
fn test_write_lands_in_device_storage() {
    let config = scenario_config();
    let mut ctx = TestContext::new(&config);
    let _ = ctx.write(2, 100, 17, 0xdead_beef);
    ctx.run_to_idle();
    assert_eq!(
        ctx.sim.dram().peek(2, 100, 17),
        Payload::splat(0xdead_beef, 2)
    );
    assert_eq!(ctx.sim.dram().open_row(2), Some(100));
}
