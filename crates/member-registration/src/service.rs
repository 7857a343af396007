//! Signup and lookup over the registry store.

use crate::error::RegistrationError;
use registry_store::{ApplicantRecord, MemberNumber, RegistryStore};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn, Span};

/// A signup submission.
#[derive(Debug, Clone)]
pub struct SignupForm {
    pub display_name: String,
    pub identifier_a: String,
    pub identifier_b: String,
}

/// Result of a successful lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberSummary {
    pub display_name: String,
    pub member_number: MemberNumber,
}

/// Owns the member-number allocation and duplicate-submission rules.
#[derive(Clone)]
pub struct RegistrationService {
    store: Arc<RegistryStore>,
}

impl RegistrationService {
    pub fn new(store: Arc<RegistryStore>) -> Self {
        Self { store }
    }

    /// Register an applicant and return their member number.
    ///
    /// Reading the counter, the duplicate check, the insert and the counter
    /// write happen in one store transaction, so concurrent signups never
    /// share a member number or admit the same identifier twice.
    #[instrument(skip(self, form), fields(identifier_a = %form.identifier_a))]
    pub async fn signup(&self, form: SignupForm) -> Result<MemberNumber, RegistrationError> {
        let display_name = required("displayName", &form.display_name)?;
        let identifier_a = required("identifierA", &form.identifier_a)?;
        let identifier_b = required("identifierB", &form.identifier_b)?;

        let store = Arc::clone(&self.store);
        let span = Span::current();
        let member_number = tokio::task::spawn_blocking(move || {
            span.in_scope(|| {
                store.with_transaction(|tx| {
                    let next = tx.read_counter()?;

                    if tx.exists_by_either_identifier(&identifier_a, &identifier_b)? {
                        warn!(identifier_a = %identifier_a, identifier_b = %identifier_b, "Duplicate signup rejected");
                        return Err(RegistrationError::Duplicate);
                    }

                    let following = next.checked_add(1).ok_or_else(|| {
                        RegistrationError::Internal(format!("Member counter overflow at {}", next))
                    })?;

                    let record =
                        ApplicantRecord::new(display_name, identifier_a, identifier_b, next);
                    tx.insert(&record)?;
                    tx.write_counter(following)?;

                    Ok(next)
                })
            })
        })
        .await??;

        info!(member_number, "Signup accepted");
        Ok(member_number)
    }

    /// Look up a member by identifier A across every cohort.
    #[instrument(skip(self))]
    pub async fn lookup(&self, identifier: &str) -> Result<MemberSummary, RegistrationError> {
        let identifier = required("identifierA", identifier)?;

        let store = Arc::clone(&self.store);
        let key = identifier.clone();
        let record = tokio::task::spawn_blocking(move || store.find_by_identifier(&key)).await??;

        match record {
            Some(record) => {
                debug!(member_number = record.member_number, "Lookup hit");
                Ok(MemberSummary {
                    display_name: record.display_name,
                    member_number: record.member_number,
                })
            }
            None => Err(RegistrationError::NotFound(identifier)),
        }
    }

    /// Number of members in the writable cohort.
    pub async fn member_count(&self) -> Result<u64, RegistrationError> {
        let store = Arc::clone(&self.store);
        Ok(tokio::task::spawn_blocking(move || store.member_count()).await??)
    }
}

/// Reject an empty form field. Values are kept exactly as submitted.
fn required(field: &str, value: &str) -> Result<String, RegistrationError> {
    if value.is_empty() {
        return Err(RegistrationError::Validation(format!("{} must not be empty", field)));
    }
    Ok(value.to_string())
}
