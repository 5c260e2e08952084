//! Request argument validation.
//!
//! Runs before any network activity so that a bad call sends zero bytes.

use chrono::{DateTime, Utc};

use crate::application::error::DataClientError;

/// Convert a caller limit into a query limit; zero means unlimited.
///
/// # Errors
///
/// Returns `InvalidArgument` for a negative limit.
pub fn query_limit(limit: i64) -> Result<Option<u64>, DataClientError> {
    match u64::try_from(limit) {
        Ok(0) => Ok(None),
        Ok(limit) => Ok(Some(limit)),
        Err(_) => Err(DataClientError::InvalidArgument(format!(
            "limit must be zero or positive, got {limit}"
        ))),
    }
}

/// Check that a date range is ordered.
///
/// # Errors
///
/// Returns `InvalidArgument` when both bounds are set and `from > to`.
pub fn check_range(
    from: Option<DateTime<Utc>>,
    to: Option<DateTime<Utc>>,
) -> Result<(), DataClientError> {
    if let (Some(from), Some(to)) = (from, to)
        && from > to
    {
        return Err(DataClientError::InvalidArgument(format!(
            "from ({from}) is after to ({to})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use test_case::test_case;

    use super::*;

    #[test_case(0, None ; "zero is unlimited")]
    #[test_case(1, Some(1) ; "one")]
    #[test_case(1000, Some(1000) ; "positive passes through")]
    fn accepted_limits(limit: i64, expected: Option<u64>) {
        assert_eq!(query_limit(limit).unwrap(), expected);
    }

    #[test_case(-1 ; "minus one")]
    #[test_case(i64::MIN ; "minimum")]
    fn negative_limits_rejected(limit: i64) {
        assert!(matches!(
            query_limit(limit),
            Err(DataClientError::InvalidArgument(_))
        ));
    }

    #[test]
    fn range_checks() {
        let jan1 = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let jan2 = Utc.with_ymd_and_hms(2020, 1, 2, 0, 0, 0).unwrap();

        assert!(check_range(Some(jan1), Some(jan2)).is_ok());
        assert!(check_range(Some(jan1), Some(jan1)).is_ok());
        assert!(check_range(None, Some(jan1)).is_ok());
        assert!(check_range(Some(jan2), None).is_ok());
        assert!(check_range(Some(jan2), Some(jan1)).is_err());
    }
}
