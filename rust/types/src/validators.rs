//! Pure range checks for index tuning parameters. Builders run these at
//! `build()` so an invalid configuration can never be constructed.

use std::fmt::Display;

use validator::ValidationError;

pub fn require_positive<T>(name: &'static str, value: T) -> Result<(), ValidationError>
where
    T: PartialOrd + Default + Display,
{
    if value <= T::default() {
        return Err(ValidationError::new(name)
            .with_message(format!("{name} must be positive, got {value}").into()));
    }
    Ok(())
}

pub fn require_at_least<T>(name: &'static str, value: T, min: T) -> Result<(), ValidationError>
where
    T: PartialOrd + Display,
{
    if value < min {
        return Err(ValidationError::new(name)
            .with_message(format!("{name} must be at least {min}, got {value}").into()));
    }
    Ok(())
}

pub fn require_positive_finite(name: &'static str, value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::new(name)
            .with_message(format!("{name} must be a positive finite number, got {value}").into()));
    }
    Ok(())
}

pub fn require_range<T>(
    name: &'static str,
    value: T,
    min: T,
    max: T,
) -> Result<(), ValidationError>
where
    T: PartialOrd + Display,
{
    if value < min || value > max {
        return Err(ValidationError::new(name)
            .with_message(format!("{name} must be in [{min}, {max}], got {value}").into()));
    }
    Ok(())
}
