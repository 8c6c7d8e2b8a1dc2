use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid header format: '{value}'. Expected 'Key: Value'")]
    InvalidHeaderFormat { value: String },
    #[error("Duration must not be empty.")]
    DurationEmpty,
    #[error("Invalid duration '{value}'.")]
    InvalidDurationFormat { value: String },
    #[error("Invalid duration '{value}': {source}")]
    InvalidDurationNumber {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Duration overflow.")]
    DurationOverflow,
    #[error("Invalid duration unit '{unit}'.")]
    InvalidDurationUnit { unit: String },
    #[error("Duration must be > 0.")]
    DurationZero,
    #[error("Invalid percentage '{value}'. Expected a number between 0 and 100 with up to two decimals.")]
    InvalidPercentage { value: String },
    #[error("Value must be >= {min}.")]
    ValueTooSmall { min: u64 },
    #[error("Invalid value: {source}")]
    InvalidNumber {
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("Injection profile starts no users.")]
    InjectionEmpty,
    #[error("Injection step {index}: ramp of {users} users needs a duration > 0.")]
    RampWithoutDuration { index: usize, users: u64 },
    #[error("Injection step {index}: rate-based injection needs a duration > 0.")]
    RateWithoutDuration { index: usize },
    #[error("Injection step {index}: constant rate must be > 0 users/sec.")]
    RateZero { index: usize },
    #[error("Injection schedule is too long to represent.")]
    InjectionOverflow,
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
