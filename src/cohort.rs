//! The four fixed cohorts ("years") that partition student records.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cohort {
    FirstYear,
    SecondYear,
    ThirdYear,
    FourthYear,
}

impl Cohort {
    pub const COUNT: usize = 4;

    /// All cohorts in year order. Aggregate reads concatenate in this order.
    pub const ALL: [Cohort; Cohort::COUNT] = [Cohort::FirstYear, Cohort::SecondYear, Cohort::ThirdYear, Cohort::FourthYear];

    /// Zero-based slot index, stable for the process lifetime.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Cohort::FirstYear => 0,
            Cohort::SecondYear => 1,
            Cohort::ThirdYear => 2,
            Cohort::FourthYear => 3,
        }
    }

    /// Year number, 1..=4.
    #[inline]
    pub fn year(self) -> u8 { self.index() as u8 + 1 }

    /// URL segment used by the HTTP surface.
    pub fn slug(self) -> &'static str {
        match self {
            Cohort::FirstYear => "first-year",
            Cohort::SecondYear => "second-year",
            Cohort::ThirdYear => "third-year",
            Cohort::FourthYear => "fourth-year",
        }
    }

    pub fn from_slug(s: &str) -> Option<Cohort> {
        Cohort::ALL.into_iter().find(|c| c.slug() == s)
    }

    pub fn from_year(year: u8) -> Option<Cohort> {
        Cohort::ALL.get(usize::from(year).checked_sub(1)?).copied()
    }

    /// Name of the backing collection.
    pub fn collection_name(self) -> String { format!("students_year{}", self.year()) }

    /// Default cohort label stored on records created without one.
    pub fn roman(self) -> &'static str {
        match self {
            Cohort::FirstYear => "I",
            Cohort::SecondYear => "II",
            Cohort::ThirdYear => "III",
            Cohort::FourthYear => "IV",
        }
    }
}

impl Display for Cohort {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { f.write_str(self.slug()) }
}
