//! Applicant record and cohort types.

/// Sequential member number assigned at signup.
pub type MemberNumber = i64;

/// One of the three equally shaped record tables.
///
/// Only [`Cohort::Current`] accepts new signups; the legacy cohorts are
/// archives carried over from earlier recruitment rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cohort {
    /// Writable cohort
    Current,
    /// First legacy archive
    LegacyA,
    /// Second legacy archive
    LegacyB,
}

impl Cohort {
    /// All cohorts in lookup precedence order.
    pub const ALL: [Cohort; 3] = [Cohort::Current, Cohort::LegacyA, Cohort::LegacyB];

    /// Backing table name.
    pub const fn table(self) -> &'static str {
        match self {
            Cohort::Current => "Akmembers",
            Cohort::LegacyA => "another",
            Cohort::LegacyB => "rgmembers",
        }
    }

    /// Lookup precedence, lower wins.
    pub const fn rank(self) -> i64 {
        match self {
            Cohort::Current => 0,
            Cohort::LegacyA => 1,
            Cohort::LegacyB => 2,
        }
    }

    pub(crate) fn from_rank(rank: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.rank() == rank)
    }
}

/// A registered applicant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicantRecord {
    pub display_name: String,
    /// First external identifier, also the lookup key
    pub identifier_a: String,
    pub identifier_b: String,
    pub member_number: MemberNumber,
}

impl ApplicantRecord {
    pub fn new(
        display_name: impl Into<String>,
        identifier_a: impl Into<String>,
        identifier_b: impl Into<String>,
        member_number: MemberNumber,
    ) -> Self {
        Self {
            display_name: display_name.into(),
            identifier_a: identifier_a.into(),
            identifier_b: identifier_b.into(),
            member_number,
        }
    }
}

/// A lookup hit together with the cohort it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CohortMatch {
    pub cohort: Cohort,
    pub record: ApplicantRecord,
}
