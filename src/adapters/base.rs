//! Validation, pagination, and batch helpers shared by every adapter.
//!
//! Validation failures are produced here, before any request is built;
//! they never reach the transport and are never wrapped further.

use std::future::Future;

use crate::errors::{Error, Result};

/// A required, non-empty resource name.
pub fn validate_name(value: &str, field: &'static str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::validation(field, "name is required"));
    }
    Ok(())
}

/// A required numeric identifier; zero is never a valid id.
pub fn validate_id_u32(id: Option<u32>, field: &'static str) -> Result<u32> {
    match id {
        None => Err(Error::validation(field, "id is required")),
        Some(0) => Err(Error::validation_value(field, 0, "id must be greater than 0")),
        Some(id) => Ok(id),
    }
}

/// A required string identifier; empty is never valid.
pub fn validate_id_str<'a>(id: Option<&'a str>, field: &'static str) -> Result<&'a str> {
    match id {
        None => Err(Error::validation(field, "id is required")),
        Some("") => Err(Error::validation(field, "id cannot be empty")),
        Some(id) => Ok(id),
    }
}

/// A numeric limit that must not be negative.
pub fn validate_non_negative(value: f64, field: &'static str) -> Result<()> {
    if value < 0.0 {
        return Err(Error::validation_value(field, value, "must be non-negative"));
    }
    Ok(())
}

/// Apply offset/limit to an already-filtered collection.
///
/// Returns the page and the pre-pagination total. Filtering must
/// happen before this call; the total reflects everything that
/// matched. An out-of-range offset yields an empty page with the
/// total unchanged. A limit of zero means unlimited.
pub fn paginate<T>(items: Vec<T>, offset: usize, limit: usize) -> (Vec<T>, usize) {
    let total = items.len();

    if offset >= total {
        return (Vec::new(), total);
    }

    let mut page: Vec<T> = items.into_iter().skip(offset).collect();
    if limit > 0 && page.len() > limit {
        page.truncate(limit);
    }

    (page, total)
}

/// Run `op` over each item.
///
/// With `continue_on_error` false, the first failure aborts and is
/// returned as-is. With it true, every item is attempted and a single
/// [`Error::Batch`] enumerates each failure by index; success when
/// nothing failed.
pub async fn batch_operation<T, F, Fut>(
    items: Vec<T>,
    mut op: F,
    continue_on_error: bool,
) -> Result<()>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let total = items.len();
    let mut failures = Vec::new();

    for (index, item) in items.into_iter().enumerate() {
        match op(item).await {
            Ok(()) => {}
            Err(err) if continue_on_error => failures.push((index, err)),
            Err(err) => return Err(err),
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(Error::Batch { total, failures })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_slices_after_totalling() {
        let items: Vec<u32> = (0..10).collect();
        let (page, total) = paginate(items, 1, 2);
        assert_eq!(page, vec![1, 2]);
        assert_eq!(total, 10);
    }

    #[test]
    fn out_of_range_offset_is_empty_not_an_error() {
        let items: Vec<u32> = (0..10).collect();
        let (page, total) = paginate(items, 15, 2);
        assert!(page.is_empty());
        assert_eq!(total, 10);
    }

    #[test]
    fn zero_limit_means_unlimited() {
        let items: Vec<u32> = (0..10).collect();
        let (page, total) = paginate(items, 4, 0);
        assert_eq!(page.len(), 6);
        assert_eq!(total, 10);
    }

    #[test]
    fn id_validation_distinguishes_absent_zero_empty() {
        assert!(matches!(
            validate_id_u32(None, "job_id"),
            Err(Error::Validation { .. })
        ));
        let err = validate_id_u32(Some(0), "job_id").unwrap_err();
        assert!(err.to_string().contains("greater than 0"));
        assert_eq!(validate_id_u32(Some(7), "job_id").unwrap(), 7);

        assert!(validate_id_str(None, "name").is_err());
        let err = validate_id_str(Some(""), "name").unwrap_err();
        assert!(err.to_string().contains("cannot be empty"));
        assert_eq!(validate_id_str(Some("gpu"), "name").unwrap(), "gpu");
    }

    #[tokio::test]
    async fn batch_aborts_on_first_failure_by_default() {
        let mut attempted = Vec::new();
        let result = batch_operation(
            vec![1, 2, 3],
            |n| {
                attempted.push(n);
                async move {
                    if n == 2 {
                        Err(Error::validation("n", "boom"))
                    } else {
                        Ok(())
                    }
                }
            },
            false,
        )
        .await;

        assert!(matches!(result, Err(Error::Validation { .. })));
        assert_eq!(attempted, vec![1, 2]);
    }

    #[tokio::test]
    async fn batch_continue_on_error_reports_every_failure() {
        let result = batch_operation(
            vec![1, 2, 3, 4],
            |n| async move {
                if n % 2 == 0 {
                    Err(Error::validation("n", "even"))
                } else {
                    Ok(())
                }
            },
            true,
        )
        .await;

        match result.unwrap_err() {
            Error::Batch { total, failures } => {
                assert_eq!(total, 4);
                let indexes: Vec<usize> = failures.iter().map(|(i, _)| *i).collect();
                assert_eq!(indexes, vec![1, 3]);
            }
            other => panic!("expected Batch error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn batch_all_success_is_ok() {
        let result = batch_operation(vec![1, 2], |_| async { Ok(()) }, true).await;
        assert!(result.is_ok());
    }
}
