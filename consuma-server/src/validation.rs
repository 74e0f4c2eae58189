//! Request body bounds checks, ported from the `pydantic`
//! `Field(..., min_length=..., max_length=..., ge=..., le=...)` constraints
//! on `SyncRequest`/`AsyncRequest` in `original_source/src/app/models.py`.

use consuma_core::error::ValidationError;

pub const INPUT_DATA_MIN: usize = 1;
pub const INPUT_DATA_MAX: usize = 10_000;
pub const ITERATIONS_MIN: u32 = 1;
pub const ITERATIONS_MAX: u32 = 1_000_000;
pub const CALLBACK_URL_MIN: usize = 1;
pub const CALLBACK_URL_MAX: usize = 2048;

pub fn validate_input_data(input_data: &str) -> Result<(), ValidationError> {
    let len = input_data.len();
    if len < INPUT_DATA_MIN || len > INPUT_DATA_MAX {
        return Err(ValidationError::InputDataLength(len));
    }
    Ok(())
}

pub fn validate_iterations(iterations: u32) -> Result<(), ValidationError> {
    if iterations < ITERATIONS_MIN || iterations > ITERATIONS_MAX {
        return Err(ValidationError::Iterations(iterations));
    }
    Ok(())
}

pub fn validate_callback_url(callback_url: &str) -> Result<(), ValidationError> {
    let len = callback_url.len();
    if len < CALLBACK_URL_MIN || len > CALLBACK_URL_MAX {
        return Err(ValidationError::CallbackUrlLength(len));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_input_data() {
        assert!(validate_input_data("").is_err());
    }

    #[test]
    fn accepts_boundary_lengths() {
        assert!(validate_input_data(&"a".repeat(INPUT_DATA_MAX)).is_ok());
        assert!(validate_input_data(&"a".repeat(INPUT_DATA_MAX + 1)).is_err());
    }

    #[test]
    fn rejects_zero_iterations() {
        assert!(validate_iterations(0).is_err());
    }

    #[test]
    fn rejects_too_many_iterations() {
        assert!(validate_iterations(ITERATIONS_MAX + 1).is_err());
    }

    #[test]
    fn rejects_oversized_callback_url() {
        let url = format!("http://example.com/{}", "a".repeat(CALLBACK_URL_MAX));
        assert!(validate_callback_url(&url).is_err());
    }
}
