//! Open-workload injection: an ordered profile of steps expanded once into a
//! deterministic schedule of virtual-user start offsets.
#[cfg(test)]
mod tests;

use std::fmt;
use std::time::Duration;

use crate::error::ValidationError;

const NANOS_PER_SEC: u128 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionStep {
    /// Start nobody for the given duration.
    NothingFor(Duration),
    AtOnceUsers(u64),
    /// Spread `users` starts uniformly over `during`.
    RampUsers { users: u64, during: Duration },
    ConstantUsersPerSec { rate: u64, during: Duration },
    /// Arrival rate interpolated linearly per second from `from` to `to`.
    RampUsersPerSec { from: u64, to: u64, during: Duration },
}

impl InjectionStep {
    const fn span(&self) -> Duration {
        match *self {
            Self::AtOnceUsers(_) => Duration::ZERO,
            Self::NothingFor(during)
            | Self::RampUsers { during, .. }
            | Self::ConstantUsersPerSec { during, .. }
            | Self::RampUsersPerSec { during, .. } => during,
        }
    }
}

impl fmt::Display for InjectionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NothingFor(during) => write!(f, "nothingFor({:?})", during),
            Self::AtOnceUsers(users) => write!(f, "atOnceUsers({})", users),
            Self::RampUsers { users, during } => {
                write!(f, "rampUsers({}).during({:?})", users, during)
            }
            Self::ConstantUsersPerSec { rate, during } => {
                write!(f, "constantUsersPerSec({}).during({:?})", rate, during)
            }
            Self::RampUsersPerSec { from, to, during } => {
                write!(f, "rampUsersPerSec({}).to({}).during({:?})", from, to, during)
            }
        }
    }
}

/// One batch of starts: `count` users begin `offset` after the run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleEntry {
    pub offset: Duration,
    pub count: u64,
}

/// Monotonic list of start batches. Built once, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InjectionSchedule {
    entries: Vec<ScheduleEntry>,
    total_users: u64,
}

impl InjectionSchedule {
    /// Expands an injection profile.
    ///
    /// # Errors
    ///
    /// Returns an error when the profile is empty, starts no users, has a ramp or
    /// rate step without a duration, a zero constant rate, or overflows.
    pub fn build(profile: &[InjectionStep]) -> Result<Self, ValidationError> {
        let mut schedule = Self::default();
        let mut cursor = Duration::ZERO;

        for (index, step) in profile.iter().enumerate() {
            let index = index.saturating_add(1);
            match *step {
                InjectionStep::NothingFor(_) => {}
                InjectionStep::AtOnceUsers(users) => schedule.push(cursor, users)?,
                InjectionStep::RampUsers { users, during } => {
                    if users > 0 && during.is_zero() {
                        return Err(ValidationError::RampWithoutDuration { index, users });
                    }
                    schedule.spread(cursor, users, during)?;
                }
                InjectionStep::ConstantUsersPerSec { rate, during } => {
                    if during.is_zero() {
                        return Err(ValidationError::RateWithoutDuration { index });
                    }
                    if rate == 0 {
                        return Err(ValidationError::RateZero { index });
                    }
                    let users = users_for_rate(rate, during)?;
                    schedule.spread(cursor, users, during)?;
                }
                InjectionStep::RampUsersPerSec { from, to, during } => {
                    if during.is_zero() {
                        return Err(ValidationError::RateWithoutDuration { index });
                    }
                    schedule.ramp_rate(cursor, from, to, during)?;
                }
            }
            cursor = cursor
                .checked_add(step.span())
                .ok_or(ValidationError::InjectionOverflow)?;
        }

        if schedule.total_users == 0 {
            return Err(ValidationError::InjectionEmpty);
        }
        Ok(schedule)
    }

    #[must_use]
    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    #[must_use]
    pub const fn total_users(&self) -> u64 {
        self.total_users
    }

    /// Offset of the last start batch.
    #[must_use]
    pub fn last_offset(&self) -> Duration {
        self.entries
            .last()
            .map_or(Duration::ZERO, |entry| entry.offset)
    }

    /// One offset per virtual user, in start order.
    pub fn starts(&self) -> impl Iterator<Item = Duration> + '_ {
        self.entries.iter().flat_map(|entry| {
            std::iter::repeat_n(
                entry.offset,
                usize::try_from(entry.count).unwrap_or(usize::MAX),
            )
        })
    }

    fn push(&mut self, offset: Duration, count: u64) -> Result<(), ValidationError> {
        if count == 0 {
            return Ok(());
        }
        self.total_users = self
            .total_users
            .checked_add(count)
            .ok_or(ValidationError::InjectionOverflow)?;
        match self.entries.last_mut() {
            Some(last) if last.offset == offset => {
                last.count = last.count.saturating_add(count);
            }
            _ => self.entries.push(ScheduleEntry { offset, count }),
        }
        Ok(())
    }

    /// User `i` of `users` starts at `start + i * during / users`, so every start
    /// lands in `[start, start + during)`.
    fn spread(
        &mut self,
        start: Duration,
        users: u64,
        during: Duration,
    ) -> Result<(), ValidationError> {
        let span = during.as_nanos();
        let total = u128::from(users);
        for user in 0..users {
            let nanos = u128::from(user)
                .saturating_mul(span)
                .checked_div(total)
                .unwrap_or(0);
            self.push(offset_from(start, nanos)?, 1)?;
        }
        Ok(())
    }

    /// The rate is interpolated per one-second slice of `during`; a trailing
    /// partial slice gets a proportional share of its rate. Every start lands in
    /// `[start, start + during)`.
    fn ramp_rate(
        &mut self,
        start: Duration,
        from: u64,
        to: u64,
        during: Duration,
    ) -> Result<(), ValidationError> {
        let span = during.as_nanos();
        let slices = span.div_ceil(NANOS_PER_SEC);
        let slices_i =
            i128::try_from(slices).map_err(|_overflow| ValidationError::InjectionOverflow)?;
        let from_i = i128::from(from);
        let delta = i128::from(to).saturating_sub(from_i);
        for slice in 0..slices {
            let slice_start = slice.saturating_mul(NANOS_PER_SEC);
            let slice_len = span.saturating_sub(slice_start).min(NANOS_PER_SEC);
            let slice_i =
                i128::try_from(slice).map_err(|_overflow| ValidationError::InjectionOverflow)?;
            let step = delta.saturating_mul(slice_i).checked_div(slices_i).unwrap_or(0);
            let rate = u64::try_from(from_i.saturating_add(step)).unwrap_or(0);
            let slice_during = Duration::from_nanos(
                u64::try_from(slice_len).map_err(|_overflow| ValidationError::InjectionOverflow)?,
            );
            let users = users_for_rate(rate, slice_during)?;
            self.spread(offset_from(start, slice_start)?, users, slice_during)?;
        }
        Ok(())
    }
}

fn users_for_rate(rate: u64, during: Duration) -> Result<u64, ValidationError> {
    let users = u128::from(rate)
        .saturating_mul(during.as_nanos())
        .checked_div(NANOS_PER_SEC)
        .unwrap_or(0);
    u64::try_from(users).map_err(|_overflow| ValidationError::InjectionOverflow)
}

fn offset_from(start: Duration, nanos: u128) -> Result<Duration, ValidationError> {
    let nanos = u64::try_from(nanos).map_err(|_overflow| ValidationError::InjectionOverflow)?;
    start
        .checked_add(Duration::from_nanos(nanos))
        .ok_or(ValidationError::InjectionOverflow)
}
