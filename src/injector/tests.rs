use std::time::Duration;

use super::{InjectionSchedule, InjectionStep, ScheduleEntry};
use crate::error::ValidationError;

#[test]
fn ramp_spreads_users_uniformly() -> Result<(), String> {
    let schedule = InjectionSchedule::build(&[InjectionStep::RampUsers {
        users: 100,
        during: Duration::from_secs(10),
    }])
    .map_err(|err| format!("build failed: {}", err))?;

    let starts: Vec<Duration> = schedule.starts().collect();
    if starts.len() != 100 || schedule.total_users() != 100 {
        return Err(format!("Expected 100 starts, got {}", starts.len()));
    }
    if starts.windows(2).any(|pair| matches!(pair, [a, b] if b < a)) {
        return Err("Start offsets must be non-decreasing".to_owned());
    }
    if starts.first() != Some(&Duration::ZERO) {
        return Err(format!("First start should be 0, got {:?}", starts.first()));
    }
    if starts.iter().any(|start| *start >= Duration::from_secs(10)) {
        return Err("Every start must fall before the ramp ends".to_owned());
    }
    if starts.get(10) != Some(&Duration::from_secs(1)) {
        return Err(format!("User 11 should start at 1s, got {:?}", starts.get(10)));
    }
    Ok(())
}

#[test]
fn steps_compose_in_order() -> Result<(), String> {
    let schedule = InjectionSchedule::build(&[
        InjectionStep::NothingFor(Duration::from_secs(2)),
        InjectionStep::AtOnceUsers(3),
        InjectionStep::RampUsers {
            users: 2,
            during: Duration::from_secs(4),
        },
    ])
    .map_err(|err| format!("build failed: {}", err))?;

    let expected = [
        ScheduleEntry {
            offset: Duration::from_secs(2),
            count: 4,
        },
        ScheduleEntry {
            offset: Duration::from_secs(4),
            count: 1,
        },
    ];
    if schedule.entries() != expected {
        return Err(format!("Unexpected entries: {:?}", schedule.entries()));
    }
    if schedule.last_offset() != Duration::from_secs(4) {
        return Err(format!("Unexpected last offset: {:?}", schedule.last_offset()));
    }
    Ok(())
}

#[test]
fn constant_rate_emits_rate_times_duration() -> Result<(), String> {
    let schedule = InjectionSchedule::build(&[InjectionStep::ConstantUsersPerSec {
        rate: 4,
        during: Duration::from_secs(5),
    }])
    .map_err(|err| format!("build failed: {}", err))?;
    if schedule.total_users() != 20 {
        return Err(format!("Expected 20 users, got {}", schedule.total_users()));
    }
    if schedule.starts().nth(1) != Some(Duration::from_millis(250)) {
        return Err("Users should arrive every 250ms".to_owned());
    }
    Ok(())
}

#[test]
fn ramp_rate_interpolates_per_second() -> Result<(), String> {
    let schedule = InjectionSchedule::build(&[InjectionStep::RampUsersPerSec {
        from: 0,
        to: 4,
        during: Duration::from_secs(4),
    }])
    .map_err(|err| format!("build failed: {}", err))?;
    // 0 + 1 + 2 + 3 arrivals across the four seconds.
    if schedule.total_users() != 6 {
        return Err(format!("Expected 6 users, got {}", schedule.total_users()));
    }
    let starts: Vec<Duration> = schedule.starts().collect();
    if starts.first() != Some(&Duration::from_secs(1)) {
        return Err(format!("Unexpected first start: {:?}", starts.first()));
    }
    Ok(())
}

#[test]
fn sub_second_rate_ramp_keeps_offsets_monotonic() -> Result<(), String> {
    let schedule = InjectionSchedule::build(&[
        InjectionStep::RampUsersPerSec {
            from: 4,
            to: 4,
            during: Duration::from_millis(500),
        },
        InjectionStep::AtOnceUsers(1),
    ])
    .map_err(|err| format!("build failed: {}", err))?;

    let starts: Vec<Duration> = schedule.starts().collect();
    let expected = [
        Duration::ZERO,
        Duration::from_millis(250),
        Duration::from_millis(500),
    ];
    if starts != expected {
        return Err(format!("Unexpected starts: {:?}", starts));
    }
    if starts.windows(2).any(|pair| matches!(pair, [a, b] if b < a)) {
        return Err("Start offsets must be non-decreasing".to_owned());
    }
    Ok(())
}

#[test]
fn rate_ramp_covers_partial_final_second() -> Result<(), String> {
    let schedule = InjectionSchedule::build(&[InjectionStep::RampUsersPerSec {
        from: 2,
        to: 2,
        during: Duration::from_millis(2_500),
    }])
    .map_err(|err| format!("build failed: {}", err))?;

    if schedule.total_users() != 5 {
        return Err(format!("Expected 5 users, got {}", schedule.total_users()));
    }
    if schedule.last_offset() != Duration::from_secs(2) {
        return Err(format!("Unexpected last offset: {:?}", schedule.last_offset()));
    }
    if schedule.starts().any(|start| start >= Duration::from_millis(2_500)) {
        return Err("Every start must fall before the ramp ends".to_owned());
    }
    Ok(())
}

#[test]
fn schedule_is_deterministic() -> Result<(), String> {
    let profile = [
        InjectionStep::AtOnceUsers(1),
        InjectionStep::RampUsers {
            users: 7,
            during: Duration::from_millis(700),
        },
    ];
    let first = InjectionSchedule::build(&profile).map_err(|err| err.to_string())?;
    let second = InjectionSchedule::build(&profile).map_err(|err| err.to_string())?;
    if first != second {
        return Err("Schedules for the same profile must match".to_owned());
    }
    Ok(())
}

#[test]
fn rejects_misconfigured_profiles() -> Result<(), String> {
    match InjectionSchedule::build(&[]) {
        Err(ValidationError::InjectionEmpty) => {}
        other => return Err(format!("Expected InjectionEmpty, got {:?}", other)),
    }
    match InjectionSchedule::build(&[InjectionStep::NothingFor(Duration::from_secs(1))]) {
        Err(ValidationError::InjectionEmpty) => {}
        other => return Err(format!("Expected InjectionEmpty, got {:?}", other)),
    }
    match InjectionSchedule::build(&[InjectionStep::RampUsers {
        users: 5,
        during: Duration::ZERO,
    }]) {
        Err(ValidationError::RampWithoutDuration { index: 1, users: 5 }) => {}
        other => return Err(format!("Expected RampWithoutDuration, got {:?}", other)),
    }
    match InjectionSchedule::build(&[
        InjectionStep::AtOnceUsers(1),
        InjectionStep::ConstantUsersPerSec {
            rate: 0,
            during: Duration::from_secs(1),
        },
    ]) {
        Err(ValidationError::RateZero { index: 2 }) => Ok(()),
        other => Err(format!("Expected RateZero, got {:?}", other)),
    }
}
