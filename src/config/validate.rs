// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{EngineConfig, RawEngineConfig};
use crate::errors::{EngineError, Result};
use crate::runtime::RuntimeVersion;

impl TryFrom<RawEngineConfig> for EngineConfig {
    type Error = EngineError;

    fn try_from(raw: RawEngineConfig) -> std::result::Result<Self, Self::Error> {
        let mut cfg = EngineConfig::default();
        apply_engine_section(&mut cfg, &raw)?;
        apply_timeouts(&mut cfg, &raw)?;
        apply_intervals(&mut cfg, &raw)?;
        validate_config(&cfg)?;
        Ok(cfg)
    }
}

fn apply_engine_section(cfg: &mut EngineConfig, raw: &RawEngineConfig) -> Result<()> {
    let section = &raw.engine;

    if let Some(ref cluster) = section.cluster {
        cfg.cluster = cluster.clone();
    }
    if let Some(ref image) = section.pause_image {
        cfg.pause_image = image.clone();
    }
    if let Some(ref prefix) = section.label_prefix {
        cfg.label_prefix = prefix.clone();
    }
    if let Some(ref prefix) = section.runtime_name_prefix {
        cfg.runtime_name_prefix = prefix.clone();
    }
    if let Some(size) = section.state_change_buffer {
        cfg.state_change_buffer = size;
    }
    if let Some(size) = section.task_inbox_size {
        cfg.task_inbox_size = size;
    }
    if let Some(ref version) = section.concurrent_pull_min_version {
        cfg.concurrent_pull_min_version = version.parse::<RuntimeVersion>().map_err(|e| {
            EngineError::Config(format!("[engine].concurrent_pull_min_version: {e}"))
        })?;
    }
    if let Some(attempts) = section.max_transition_attempts {
        cfg.max_transition_attempts = attempts;
    }
    if let Some(block) = section.block_instance_metadata {
        cfg.block_instance_metadata = block;
    }
    Ok(())
}

fn apply_timeouts(cfg: &mut EngineConfig, raw: &RawEngineConfig) -> Result<()> {
    let section = &raw.timeouts;
    let t = &mut cfg.timeouts;

    override_duration(&mut t.pull, &section.pull, "timeouts.pull")?;
    override_duration(&mut t.create, &section.create, "timeouts.create")?;
    override_duration(&mut t.start, &section.start, "timeouts.start")?;
    override_duration(&mut t.stop, &section.stop, "timeouts.stop")?;
    override_duration(&mut t.provision, &section.provision, "timeouts.provision")?;
    override_duration(&mut t.remove, &section.remove, "timeouts.remove")?;
    override_duration(&mut t.inspect, &section.inspect, "timeouts.inspect")?;
    Ok(())
}

fn apply_intervals(cfg: &mut EngineConfig, raw: &RawEngineConfig) -> Result<()> {
    let section = &raw.intervals;

    override_duration(
        &mut cfg.steady_state_verify_interval,
        &section.steady_state_verify,
        "intervals.steady_state_verify",
    )?;
    override_duration(
        &mut cfg.task_cleanup_wait,
        &section.task_cleanup_wait,
        "intervals.task_cleanup_wait",
    )?;
    override_duration(
        &mut cfg.transition_retry_delay,
        &section.transition_retry_delay,
        "intervals.transition_retry_delay",
    )?;
    override_duration(
        &mut cfg.attachment_reconcile_interval,
        &section.attachment_reconcile,
        "intervals.attachment_reconcile",
    )?;
    Ok(())
}

fn override_duration(target: &mut Duration, raw: &Option<String>, key: &str) -> Result<()> {
    if let Some(s) = raw {
        *target = parse_duration(s).map_err(|e| EngineError::Config(format!("[{key}]: {e}")))?;
    }
    Ok(())
}

/// Sanity checks on a fully-populated config.
pub fn validate_config(cfg: &EngineConfig) -> Result<()> {
    if cfg.state_change_buffer == 0 {
        return Err(EngineError::Config(
            "[engine].state_change_buffer must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.task_inbox_size == 0 {
        return Err(EngineError::Config(
            "[engine].task_inbox_size must be >= 1 (got 0)".to_string(),
        ));
    }
    if cfg.max_transition_attempts == 0 {
        return Err(EngineError::Config(
            "[engine].max_transition_attempts must be >= 1 (got 0)".to_string(),
        ));
    }

    let t = &cfg.timeouts;
    let named = [
        ("pull", t.pull),
        ("create", t.create),
        ("start", t.start),
        ("stop", t.stop),
        ("provision", t.provision),
        ("remove", t.remove),
        ("inspect", t.inspect),
        ("steady_state_verify", cfg.steady_state_verify_interval),
        ("attachment_reconcile", cfg.attachment_reconcile_interval),
    ];
    for (name, value) in named {
        if value.is_zero() {
            return Err(EngineError::Config(format!("{name} must be greater than zero")));
        }
    }

    Ok(())
}

/// Parse a duration string like `"500ms"`, `"3s"`, `"2m"` or `"1h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    match unit.as_str() {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        "m" => Ok(Duration::from_secs(value * 60)),
        "h" => Ok(Duration::from_secs(value * 60 * 60)),
        _ => Err(format!(
            "unsupported duration unit '{}'; expected ms, s, m, or h",
            unit
        )),
    }
}
