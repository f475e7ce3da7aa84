use std::sync::PoisonError;

use tracing::{debug, info};

use crate::error::ClassifierError;
use crate::metric::{DistanceMetric, Metric};
use crate::model::TrainingSet;
use crate::result::{Match, ResultSet};
use crate::store::ModelStore;

/// Train/classify contract shared by every classifier.
pub trait Classifier: Send {
    /// Records `features` as the model of `subject_id` and persists it.
    fn train(&mut self, subject_id: i32, features: &[f64]) -> Result<(), ClassifierError>;

    /// Scores `features` against every known subject.
    ///
    /// On error the previous result set is left untouched.
    fn classify(&mut self, features: &[f64]) -> Result<&ResultSet, ClassifierError>;

    /// Candidates recorded by the last successful [`Classifier::classify`].
    fn result_set(&self) -> &ResultSet;

    /// The best candidate of the last classification.
    fn result(&self) -> Result<&Match, ClassifierError> {
        self.result_set().minimum()
    }
}

/// Nearest-neighbor classifier over per-subject mean vectors.
///
/// The metric is fixed at construction. Every [`Classifier::classify`]
/// call restores the training set from the store, so models trained by
/// other instances sharing the store are picked up immediately.
pub struct DistanceClassifier<M = Metric> {
    metric: M,
    store: ModelStore,
    results: ResultSet,
}

impl<M: DistanceMetric> DistanceClassifier<M> {
    pub fn new(metric: M, store: ModelStore) -> Self {
        Self {
            metric,
            store,
            results: ResultSet::new(),
        }
    }

    pub fn metric(&self) -> &M {
        &self.metric
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    fn restore(&self) -> Result<TrainingSet, ClassifierError> {
        let lock = self.store.lock();
        let _guard = lock.read().unwrap_or_else(PoisonError::into_inner);
        let (set, _) = self.store.restore::<TrainingSet>()?;
        Ok(set)
    }
}

/// Returns the first value in `features` that is NaN or infinite.
fn non_finite(features: &[f64]) -> Option<(usize, f64)> {
    features
        .iter()
        .copied()
        .enumerate()
        .find(|(_, v)| !v.is_finite())
}

fn check_finite(features: &[f64]) -> Result<(), ClassifierError> {
    match non_finite(features) {
        Some((index, value)) => Err(ClassifierError::NonFinite { index, value }),
        None => Ok(()),
    }
}

impl<M: DistanceMetric> Classifier for DistanceClassifier<M> {
    /// Fails with [`ClassifierError::NonFinite`] if any value is NaN or
    /// infinite; nothing is stored in that case.
    fn train(&mut self, subject_id: i32, features: &[f64]) -> Result<(), ClassifierError> {
        check_finite(features)?;

        let lock = self.store.lock();
        let _guard = lock.write().unwrap_or_else(PoisonError::into_inner);

        let (mut set, _) = self.store.restore::<TrainingSet>()?;
        set.upsert(subject_id, features)?;
        self.store.dump(&set)?;

        info!(
            key = self.store.key(),
            subject_id,
            subjects = set.len(),
            "trained subject"
        );
        Ok(())
    }

    fn classify(&mut self, features: &[f64]) -> Result<&ResultSet, ClassifierError> {
        check_finite(features)?;

        let set = self.restore()?;
        let pipeline = set.pipeline();

        let mut results = ResultSet::with_capacity(set.len());

        for subject in set.subjects() {
            let corrupt = |reason: String| ClassifierError::ModelCorrupt {
                subject_id: subject.subject_id,
                pipeline,
                reason,
            };

            let mean = subject
                .mean
                .as_deref()
                .ok_or_else(|| corrupt("mean vector is missing".into()))?;
            if mean.len() != features.len() {
                return Err(corrupt(format!(
                    "mean vector has {} values, sample has {}",
                    mean.len(),
                    features.len()
                )));
            }
            if let Some((index, value)) = non_finite(mean) {
                return Err(corrupt(format!("mean value {index} is not finite: {value}")));
            }

            let distance = self.metric.distance(mean, features);
            results.add(subject.subject_id, distance, None);
        }

        // Ties resolve in ResultSet::minimum, to the subject trained first.
        debug!(
            key = self.store.key(),
            subjects = results.len(),
            best = ?results.minimum().ok().map(|m| m.subject_id),
            "classified sample"
        );
        self.results = results;
        Ok(&self.results)
    }

    fn result_set(&self) -> &ResultSet {
        &self.results
    }
}
