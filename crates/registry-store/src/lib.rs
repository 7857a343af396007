//! Durable member registry backed by SQLite.
//!
//! Holds applicant records in one writable cohort and two read-only legacy
//! cohorts, plus the persisted counter that hands out member numbers.

mod error;
mod store;
mod types;

pub use error::StoreError;
pub use store::{RegistryStore, StoreTransaction, DEFAULT_BUSY_TIMEOUT};
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_applicant_record_new() {
        let record = ApplicantRecord::new("Alice", "qq1", "bili1", 0);
        assert_eq!(record.display_name, "Alice");
        assert_eq!(record.identifier_a, "qq1");
        assert_eq!(record.identifier_b, "bili1");
        assert_eq!(record.member_number, 0);
    }

    #[test]
    fn test_cohort_precedence_order() {
        let ranks: Vec<i64> = Cohort::ALL.iter().map(|c| c.rank()).collect();
        assert_eq!(ranks, vec![0, 1, 2]);
    }
}
