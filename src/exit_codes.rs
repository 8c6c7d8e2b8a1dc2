/// Process exit codes of the `volley` binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,

    /// The run completed but its failure rate exceeded the configured threshold.
    ThresholdFailed = 11,

    /// Invalid CLI/config/simulation, or the target failed preflight.
    InvalidInput = 30,

    /// Internal/runtime error (runtime build, reporter loss, summary output).
    RuntimeError = 40,
}

impl ExitCode {
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub const fn from_verdict(passed: bool) -> Self {
        if passed {
            Self::Success
        } else {
            Self::ThresholdFailed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_maps_to_codes() -> Result<(), String> {
        if ExitCode::from_verdict(true).as_i32() != 0 {
            return Err("Passing run should exit 0".to_owned());
        }
        if ExitCode::from_verdict(false).as_i32() != 11 {
            return Err("Failing threshold should exit 11".to_owned());
        }
        if ExitCode::InvalidInput.as_i32() != 30 || ExitCode::RuntimeError.as_i32() != 40 {
            return Err("Unexpected error exit codes".to_owned());
        }
        Ok(())
    }
}
