//! # Command Sequence Scenarios
//!
//! Small request streams with fully known command traces on the reference
//! configuration: 4 banks, burst length 4, tREFI 64, tRFC 8, tRAS 4,
//! tRP 2, tRCD 2, write latency 1, tWR 2, tWTR 2.

use std::collections::VecDeque;

use dramctl_core::Controller;
use dramctl_core::common::{
    CommandKind, Completion, DfiFrame, Payload, PRECHARGE_ALL_BIT, Request, RequestTag,
};
use pretty_assertions::assert_eq;

use crate::common::harness::{TestContext, quiet_config, scenario_config};

use CommandKind::{Activate, Precharge, PrechargeAll, Read, Refresh, Write};

// ══════════════════════════════════════════════════════════
// 1. Row buffer sequences
// ══════════════════════════════════════════════════════════

#[test]
fn test_row_hit_write_then_read() {
    let mut ctx = TestContext::new(&scenario_config());
    let write = ctx.write(0, 5, 0, 0xabcd);
    let read = ctx.read(0, 5, 1);
    ctx.run_to_idle();

    // WR at tRCD; RD waits WL + tWTR after the write.
    assert_eq!(
        ctx.commands(),
        vec![
            (0, Activate, 0, 5, 0),
            (2, Write, 0, 5, 0),
            (5, Read, 0, 5, 1),
        ]
    );

    let timing = ctx.sim.controller().timing().clone();
    let read_done = ctx.completion(read);
    assert_eq!(read_done.completion.granted_at(), 5);
    assert_eq!(read_done.cycle, 5 + u64::from(timing.read_latency()));
    let write_done = ctx.completion(write);
    assert_eq!(write_done.cycle, 2 + u64::from(timing.write_latency()));
}

#[test]
fn test_row_hit_read_returns_written_data() {
    let mut ctx = TestContext::new(&scenario_config());
    let _ = ctx.write(0, 5, 1, 0x1234);
    let read = ctx.read(0, 5, 1);
    ctx.run_to_idle();
    assert_eq!(ctx.read_data(read), Payload::splat(0x1234, 2));
}

#[test]
fn test_row_conflict_precharges_after_tras() {
    let mut ctx = TestContext::new(&scenario_config());
    let _ = ctx.read(0, 5, 0);
    let _ = ctx.read(0, 9, 0);
    ctx.run_to_idle();

    assert_eq!(
        ctx.commands(),
        vec![
            (0, Activate, 0, 5, 0),
            (2, Read, 0, 5, 0),
            (4, Precharge, 0, 5, 0),
            (6, Activate, 0, 9, 0),
            (8, Read, 0, 9, 0),
        ]
    );
}

#[test]
fn test_banks_interleave_under_activate_spacing() {
    let mut ctx = TestContext::new(&quiet_config());
    for bank in 0..4 {
        let _ = ctx.read(bank, 3, 0);
    }
    ctx.run_to_idle();

    let activates: Vec<_> = ctx
        .commands()
        .into_iter()
        .filter(|c| c.1 == Activate)
        .map(|c| (c.0, c.2))
        .collect();
    // Reads interleave with the activates; tRRD = 2 spaces the activates.
    assert_eq!(activates, vec![(0, 0), (2, 1), (5, 2), (7, 3)]);
    assert!(activates.windows(2).all(|w| w[1].0 - w[0].0 >= 2));
    assert_eq!(ctx.sim.stats().cmd_read, 4);
}

// ══════════════════════════════════════════════════════════
// 2. Refresh
// ══════════════════════════════════════════════════════════

#[test]
fn test_idle_refresh_cadence() {
    let mut ctx = TestContext::new(&scenario_config());
    ctx.sim.run(200);

    // Request raised at tREFI - lead = 58, PREA granted at once, REF tRP later.
    assert_eq!(
        ctx.commands(),
        vec![
            (58, PrechargeAll, 0, 0, 0),
            (60, Refresh, 0, 0, 0),
            (118, PrechargeAll, 0, 0, 0),
            (120, Refresh, 0, 0, 0),
            (178, PrechargeAll, 0, 0, 0),
            (180, Refresh, 0, 0, 0),
        ]
    );
    assert_eq!(ctx.sim.trace()[0].address, PRECHARGE_ALL_BIT);
    assert_eq!(ctx.sim.controller().refresher().refreshes(), 3);
    assert!(ctx.sim.violations().is_empty());
}

#[test]
fn test_refresh_closes_open_row() {
    let mut ctx = TestContext::new(&scenario_config());
    let _ = ctx.read(0, 5, 0);
    ctx.sim.run(40);
    assert_eq!(ctx.sim.controller().bank_state(0).and_then(|s| s.open_row), Some(5));

    ctx.sim.run(40);
    let state = ctx.sim.controller().bank_state(0).unwrap();
    assert!(!state.is_open);
    assert_eq!(state.open_row, None);

    let _ = ctx.read(0, 5, 1);
    ctx.run_to_idle();
    let activates = ctx.kinds().iter().filter(|k| **k == Activate).count();
    assert_eq!(activates, 2);
}

#[test]
fn test_no_command_during_refresh_recovery() {
    let mut ctx = TestContext::new(&scenario_config());
    // Keep every bank busy across the first refresh.
    for i in 0..8 {
        for bank in 0..4 {
            let _ = ctx.read(bank, i % 2, i);
        }
    }
    ctx.run_to_idle();

    let trace = ctx.commands();
    let refresh = trace
        .iter()
        .find(|c| c.1 == Refresh)
        .map(|c| c.0)
        .expect("a refresh inside the run");
    assert!(
        trace
            .iter()
            .all(|c| c.0 <= refresh || c.0 >= refresh + 8),
        "command inside tRFC window: {trace:?}"
    );
}

// ══════════════════════════════════════════════════════════
// 3. DFI frames and data path
// ══════════════════════════════════════════════════════════

#[test]
fn test_dfi_frame_for_write() {
    let mut controller = Controller::new(&quiet_config()).unwrap();
    let payload = Payload(vec![0x11, 0x22]);
    let mut queue: Vec<VecDeque<Request>> = vec![VecDeque::new(); 4];
    queue[0].push_back(Request::write(0, 7, 3, payload.clone(), RequestTag(9)));

    let frames: Vec<_> = (0..6).map(|_| controller.tick(&mut queue, None)).collect();

    let act: &DfiFrame = &frames[0].frame;
    assert_eq!(act.phases[0].signals, Activate.strobes());
    assert_eq!(act.phases[0].address, 7);

    let wr = &frames[2].frame;
    assert_eq!(wr.command.map(|c| c.kind), Some(Write));
    assert_eq!(wr.phases[0].signals, Write.strobes());
    assert_eq!(wr.phases[0].address, 3 << 2);
    assert!(wr.phases[1].wrdata_en);
    assert!(!wr.phases[0].rddata_en);
    assert_eq!(wr.write_data(), None);

    assert_eq!(frames[3].frame.write_data(), Some(payload));
    assert_eq!(
        frames[4].completions,
        vec![Completion::Write {
            tag: RequestTag(9),
            bank: 0,
            granted_at: 2
        }]
    );
    assert!(controller.is_idle());
}

#[test]
fn test_read_enable_on_read_phase() {
    let mut controller = Controller::new(&quiet_config()).unwrap();
    let mut queue: Vec<VecDeque<Request>> = vec![VecDeque::new(); 4];
    queue[2].push_back(Request::read(2, 1, 0, RequestTag(1)));

    let rd = (0..3)
        .map(|_| controller.tick(&mut queue, None))
        .last()
        .unwrap();
    assert_eq!(rd.command().map(|c| c.kind), Some(Read));
    assert_eq!(rd.frame.phases[0].bank, 2);
    assert!(rd.frame.phases[0].rddata_en);
    assert!(!rd.frame.phases[1].wrdata_en);
}

#[test]
fn test_out_of_geometry_request_never_widens_the_bus() {
    let mut controller = Controller::new(&quiet_config()).unwrap();
    let mut queue: Vec<VecDeque<Request>> = vec![VecDeque::new(); 4];
    queue[0].push_back(Request::read(0, (1 << 13) + 5, 256, RequestTag(1)));
    queue[0].push_back(Request::read(0, 5, 1 << 30, RequestTag(2)));

    let outputs: Vec<_> = (0..16).map(|_| controller.tick(&mut queue, None)).collect();
    let commands: Vec<_> = outputs.iter().filter_map(|o| o.command().copied()).collect();
    assert_eq!(
        commands.iter().map(|c| (c.kind, c.row, c.address)).collect::<Vec<_>>(),
        vec![(Activate, 5, 5), (Read, 5, 0), (Read, 5, 0)]
    );
    assert!(commands.iter().all(|c| c.address & PRECHARGE_ALL_BIT == 0));

    let tags: Vec<_> = outputs
        .iter()
        .flat_map(|o| o.completions.iter().map(Completion::tag))
        .collect();
    assert_eq!(tags, vec![RequestTag(1), RequestTag(2)]);
}

#[test]
fn test_missing_read_data_completes_with_zeros() {
    let mut controller = Controller::new(&quiet_config()).unwrap();
    let mut queue: Vec<VecDeque<Request>> = vec![VecDeque::new(); 4];
    queue[1].push_back(Request::read(1, 4, 2, RequestTag(3)));

    let latency = controller.timing().read_latency();
    let completions: Vec<_> = (0..20)
        .flat_map(|_| controller.tick(&mut queue, None).completions)
        .collect();
    assert_eq!(
        completions,
        vec![Completion::Read {
            tag: RequestTag(3),
            bank: 1,
            data: Payload::zeroed(2),
            granted_at: 2
        }]
    );
    assert_eq!(latency, 5);
}

#[test]
fn test_bandwidth_counters() {
    let mut config = scenario_config();
    config.controller.with_bandwidth = true;
    config.controller.bandwidth_period = 16;
    let mut ctx = TestContext::new(&config);
    let _ = ctx.write(0, 5, 0, 1);
    let _ = ctx.read(0, 5, 1);
    ctx.sim.run(20);

    let bw = ctx.sim.controller().bandwidth().expect("bandwidth enabled");
    assert_eq!(bw.reads(), 1);
    assert_eq!(bw.writes(), 1);
    assert_eq!(bw.commands(), 3);
    assert_eq!(bw.periods(), 1);
    assert_eq!(bw.last_period().commands, 3);
}
