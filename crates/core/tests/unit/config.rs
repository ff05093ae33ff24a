//! # Configuration Tests
//!
//! Tests for configuration defaults, JSON deserialization and the validation
//! performed when the timing model is derived.

use std::io::Write;

use dramctl_core::common::{ConfigError, Request, RequestTag};
use dramctl_core::config::*;
use dramctl_core::timing::TimingModel;
use pretty_assertions::assert_eq;

// ══════════════════════════════════════════════════════════
// 1. Defaults
// ══════════════════════════════════════════════════════════

#[test]
fn test_config_default() {
    let config = Config::default();
    assert_eq!(config.phy.memtype, MemoryType::Ddr);
    assert_eq!(config.phy.nphases, 2);
    assert_eq!(config.geom.bankbits, 2);
    assert_eq!(config.controller.policy, ArbitrationPolicy::RoundRobin);
    assert!(config.controller.with_refresh);
    assert!(!config.controller.with_bandwidth);
    assert!(config.validate().is_ok());
}

#[test]
fn test_derived_constants() {
    let model = TimingModel::new(&Config::default()).unwrap();
    assert_eq!(model.nbanks(), 4);
    assert_eq!(model.burst_length(), 4);
    assert_eq!(model.address_align(), 2);
    assert_eq!(model.read_latency(), model.phy_read_latency() + 1);
    assert_eq!(model.write_latency(), model.phy_write_latency() + 1);
    assert_eq!(
        model.refresh_period(),
        model.t_refi() - model.refresh_lead()
    );
}

#[test]
fn test_sdr_burst_length_equals_phases() {
    let mut config = Config::default();
    config.phy.memtype = MemoryType::Sdr;
    config.phy.nphases = 4;
    let model = TimingModel::new(&config).unwrap();
    assert_eq!(model.burst_length(), 4);
    assert_eq!(model.address_align(), 2);
}

// ══════════════════════════════════════════════════════════
// 2. JSON loading
// ══════════════════════════════════════════════════════════

#[test]
fn test_from_file_partial_overrides() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{
            "phy": {{ "memtype": "ddr3", "read_latency": 6 }},
            "geom": {{ "bankbits": 3 }},
            "controller": {{ "policy": "Budget", "read_time": 8, "with_bandwidth": true }}
        }}"#
    )
    .unwrap();

    let config = Config::from_file(file.path()).unwrap();
    assert_eq!(config.phy.memtype, MemoryType::Ddr3);
    assert_eq!(config.phy.read_latency, 6);
    assert_eq!(config.phy.nphases, 2);
    assert_eq!(config.controller.policy, ArbitrationPolicy::ReadWriteBudget);
    assert_eq!(config.controller.read_time, 8);
    assert!(config.controller.with_bandwidth);

    let model = TimingModel::new(&config).unwrap();
    assert_eq!(model.nbanks(), 8);
    assert_eq!(model.read_latency(), 7);
}

#[test]
fn test_policy_aliases() {
    let config = Config::from_json(r#"{ "controller": { "policy": "RowHit" } }"#).unwrap();
    assert_eq!(config.controller.policy, ArbitrationPolicy::RowHitFirst);
}

#[test]
fn test_unknown_memory_type_rejected() {
    let err = Config::from_json(r#"{ "phy": { "memtype": "HBM" } }"#).unwrap_err();
    assert!(matches!(err, ConfigError::Json(_)));
    assert!(err.to_string().contains("HBM"));
    assert!(matches!(
        "GDDR5".parse::<MemoryType>(),
        Err(ConfigError::UnknownMemoryType(name)) if name == "GDDR5"
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Config::from_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

// ══════════════════════════════════════════════════════════
// 3. Validation
// ══════════════════════════════════════════════════════════

#[test]
fn test_burst_length_must_be_power_of_two() {
    let mut config = Config::default();
    config.phy.nphases = 3;
    config.phy.wrphase = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::BurstLengthNotPowerOfTwo(6))
    ));
}

#[test]
fn test_refresh_interval_shorter_than_recovery() {
    let mut config = Config::default();
    config.timing.t_refi = 8;
    config.timing.t_rfc = 11;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::RefreshIntervalTooShort { t_refi: 8, .. })
    ));
}

#[test]
fn test_refresh_interval_must_fit_sequence() {
    let mut config = Config::default();
    config.timing.t_rfc = 8;
    // lead = tRP + max(tRAS, WL + tWR) = 2 + 4
    config.timing.t_refi = 13;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::RefreshIntervalTooShort {
            t_refi: 13,
            required: 14
        })
    ));
    config.timing.t_refi = 14;
    assert!(config.validate().is_ok());
}

#[test]
fn test_refresh_interval_ignored_without_refresh() {
    let mut config = Config::default();
    config.timing.t_refi = 4;
    config.timing.t_rfc = 11;
    config.controller.with_refresh = false;
    let timing = TimingModel::new(&config).unwrap();
    assert_eq!(timing.refresh_period(), 0);

    let mut sim = dramctl_core::Simulator::new(&config).unwrap();
    assert!(sim.submit(Request::read(0, 3, 0, RequestTag(0))).is_ok());
    assert!(sim.run_until_idle(1_000).is_some());
    sim.run(100);
    assert_eq!(sim.controller().refresher().refreshes(), 0);
    assert!(sim.violations().is_empty());
}

#[test]
fn test_phase_out_of_range() {
    let mut config = Config::default();
    config.phy.rdphase = 2;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidPhase {
            name: "rdphase",
            value: 2,
            nphases: 2
        })
    ));
}

#[test]
fn test_geometry_must_fit_address_bus() {
    let mut config = Config::default();
    config.geom.rowbits = 14;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidGeometry(_))
    ));

    let mut config = Config::default();
    config.geom.addressbits = 10;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidGeometry(_))
    ));

    let mut config = Config::default();
    config.geom.colbits = 2;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidGeometry(_))
    ));
}

#[test]
fn test_zero_timing_rejected() {
    let mut config = Config::default();
    config.timing.t_rcd = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ZeroTiming("t_rcd"))
    ));
}

#[test]
fn test_zero_queue_and_data_width_rejected() {
    let mut config = Config::default();
    config.controller.req_queue_size = 0;
    assert!(matches!(config.validate(), Err(ConfigError::ZeroQueueDepth)));

    let mut config = Config::default();
    config.phy.dfi_databits = 65;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidDataWidth(65))
    ));
}

// ══════════════════════════════════════════════════════════
// 4. Arithmetic limits
// ══════════════════════════════════════════════════════════

#[test]
fn test_huge_timing_values_rejected_not_overflowed() {
    let config = Config::from_json(r#"{"timing":{"t_wr":4294967295}}"#).unwrap();
    assert!(matches!(
        TimingModel::new(&config),
        Err(ConfigError::TimingOverflow(_))
    ));

    let mut config = Config::default();
    config.timing.t_rfc = u32::MAX;
    config.timing.t_refi = u32::MAX;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::TimingOverflow(_))
    ));

    let mut config = Config::default();
    config.phy.write_latency = u32::MAX;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::TimingOverflow(_))
    ));
}

#[test]
fn test_phase_count_bounded() {
    let config = Config::from_json(r#"{"phy":{"nphases":4294967295}}"#).unwrap();
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidPhaseCount {
            value: 4_294_967_295,
            ..
        })
    ));

    let mut config = Config::default();
    config.phy.nphases = 0;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidPhaseCount { value: 0, .. })
    ));

    let mut config = Config::default();
    config.phy.nphases = 16;
    config.phy.memtype = MemoryType::Sdr;
    assert!(config.validate().is_ok());
    config.phy.nphases = 32;
    assert!(matches!(
        config.validate(),
        Err(ConfigError::InvalidPhaseCount { value: 32, max: 16 })
    ));
}
