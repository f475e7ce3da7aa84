use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ClassifierError;

/// Identifies the preprocessing and feature-extraction configuration a
/// model was trained under. Vectors from a different pipeline are not
/// comparable with the stored means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Pipeline {
    pub preprocessing: u32,
    pub extraction: u32,
}

impl Pipeline {
    pub fn new(preprocessing: u32, extraction: u32) -> Self {
        Self {
            preprocessing,
            extraction,
        }
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.preprocessing, self.extraction)
    }
}

/// Learned representative of one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct SubjectModel {
    pub subject_id: i32,

    /// Mean feature vector. `None` only when a stored blob carried a
    /// record without a vector; training always sets it.
    pub mean: Option<Vec<f64>>,
}

/// Every known subject's model plus the pipeline it was built under.
///
/// Subjects keep the order in which they were first trained. Retraining
/// a subject replaces its mean in place.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    pipeline: Pipeline,
    subjects: Vec<SubjectModel>,
}

impl TrainingSet {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            subjects: Vec::new(),
        }
    }

    /// Builds a set from already-decoded records without validation.
    pub(crate) fn from_parts(pipeline: Pipeline, subjects: Vec<SubjectModel>) -> Self {
        Self { pipeline, subjects }
    }

    pub fn pipeline(&self) -> Pipeline {
        self.pipeline
    }

    pub fn subjects(&self) -> &[SubjectModel] {
        &self.subjects
    }

    pub fn get(&self, subject_id: i32) -> Option<&SubjectModel> {
        self.subjects.iter().find(|s| s.subject_id == subject_id)
    }

    /// Returns the common vector length, taken from the first subject
    /// that has a mean.
    pub fn dimension(&self) -> Option<usize> {
        self.subjects
            .iter()
            .find_map(|s| s.mean.as_ref().map(Vec::len))
    }

    /// Inserts or overwrites the mean for `subject_id`.
    ///
    /// Fails if the vector length differs from the vectors already held,
    /// so every mean in the set keeps the same length.
    pub fn upsert(&mut self, subject_id: i32, mean: &[f64]) -> Result<(), ClassifierError> {
        if let Some(dim) = self.dimension() {
            let replacing_only_vector = self.subjects.len() == 1
                && self.subjects[0].subject_id == subject_id;
            if dim != mean.len() && !replacing_only_vector {
                return Err(ClassifierError::DimensionMismatch {
                    expected: dim,
                    got: mean.len(),
                });
            }
        }

        match self.subjects.iter_mut().find(|s| s.subject_id == subject_id) {
            Some(existing) => existing.mean = Some(mean.to_vec()),
            None => self.subjects.push(SubjectModel {
                subject_id,
                mean: Some(mean.to_vec()),
            }),
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.subjects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subjects.is_empty()
    }
}

/// Subject ids known to the random baseline. No vectors are kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownIdSet {
    pipeline: Pipeline,
    ids: BTreeSet<i32>,
}

impl KnownIdSet {
    pub fn new(pipeline: Pipeline) -> Self {
        Self {
            pipeline,
            ids: BTreeSet::new(),
        }
    }

    pub(crate) fn from_parts(pipeline: Pipeline, ids: BTreeSet<i32>) -> Self {
        Self { pipeline, ids }
    }

    pub fn pipeline(&self) -> Pipeline {
        self.pipeline
    }

    /// Adds an id. Returns false if it was already present.
    pub fn insert(&mut self, subject_id: i32) -> bool {
        self.ids.insert(subject_id)
    }

    pub fn contains(&self, subject_id: i32) -> bool {
        self.ids.contains(&subject_id)
    }

    /// Returns the id at `index` in ascending order.
    pub fn nth(&self, index: usize) -> Option<i32> {
        self.ids.iter().nth(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.ids.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
