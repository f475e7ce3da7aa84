use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;

/// One scored candidate from a classification call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub subject_id: i32,

    /// Lower values mean the sample is closer to the subject.
    pub distance: f64,

    /// Free-form origin note, e.g. why the candidate was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Candidates of one classification call, in the order they were scored.
///
/// Nothing is deduplicated. A candidate's rank is its insertion index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultSet {
    matches: Vec<Match>,
}

impl ResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            matches: Vec::with_capacity(capacity),
        }
    }

    pub fn add(&mut self, subject_id: i32, distance: f64, label: Option<String>) {
        self.matches.push(Match {
            subject_id,
            distance,
            label,
        });
    }

    /// Returns the candidate with the smallest distance. On ties the one
    /// added first wins.
    ///
    /// Distances compare by [`f64::total_cmp`], the same order
    /// [`ResultSet::ranked`] uses, so the minimum is always `ranked()[0]`.
    /// A NaN distance sorts after every number.
    pub fn minimum(&self) -> Result<&Match, ClassifierError> {
        self.pick(Ordering::Less)
    }

    /// Returns the candidate with the largest distance. On ties the one
    /// added first wins.
    pub fn maximum(&self) -> Result<&Match, ClassifierError> {
        self.pick(Ordering::Greater)
    }

    fn pick(&self, wanted: Ordering) -> Result<&Match, ClassifierError> {
        let mut iter = self.matches.iter();
        let mut best = iter.next().ok_or(ClassifierError::EmptyResultSet)?;
        for m in iter {
            if m.distance.total_cmp(&best.distance) == wanted {
                best = m;
            }
        }
        Ok(best)
    }

    /// Candidates sorted by ascending distance. The sort is stable, so
    /// equal distances keep their insertion order.
    pub fn ranked(&self) -> Vec<&Match> {
        let mut sorted: Vec<&Match> = self.matches.iter().collect();
        sorted.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        sorted
    }

    pub fn get(&self, rank: usize) -> Option<&Match> {
        self.matches.get(rank)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Match> {
        self.matches.iter()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a Match;
    type IntoIter = std::slice::Iter<'a, Match>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.iter()
    }
}
