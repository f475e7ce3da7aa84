use std::sync::PoisonError;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use crate::classifier::Classifier;
use crate::error::ClassifierError;
use crate::model::KnownIdSet;
use crate::result::ResultSet;
use crate::store::ModelStore;

/// Label of the candidate produced when no subject has been trained yet.
pub const OUT_OF_THE_BLUE: &str = "out of the blue";

/// Baseline classifier that guesses among the subjects it has seen.
///
/// It ignores feature vectors entirely. Any real classifier should beat
/// it on the same data; it exists as a floor for regression tests.
///
/// Each classification yields two candidates, both at distance 0. Their
/// order in the result set is their rank.
pub struct RandomClassifier<R = StdRng> {
    store: ModelStore,
    rng: R,
    known: Option<KnownIdSet>,
    results: ResultSet,
}

impl RandomClassifier<StdRng> {
    pub fn new(store: ModelStore) -> Self {
        Self::with_rng(store, StdRng::from_entropy())
    }

    /// Creates a baseline with a reproducible sequence of guesses.
    pub fn seeded(store: ModelStore, seed: u64) -> Self {
        Self::with_rng(store, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng + Send> RandomClassifier<R> {
    pub fn with_rng(store: ModelStore, rng: R) -> Self {
        Self {
            store,
            rng,
            known: None,
            results: ResultSet::new(),
        }
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    /// Ids currently held in memory, if they have been restored yet.
    pub fn known(&self) -> Option<&KnownIdSet> {
        self.known.as_ref()
    }

    /// Restores the id set, persisting an empty one if none is stored.
    /// Callers must hold the store's write lock.
    fn restore_locked(&self) -> Result<KnownIdSet, ClassifierError> {
        let (ids, existed) = self.store.restore::<KnownIdSet>()?;
        if !existed {
            self.store.dump(&ids)?;
        }
        Ok(ids)
    }

    fn restore(&self) -> Result<KnownIdSet, ClassifierError> {
        let lock = self.store.lock();
        let _guard = lock.write().unwrap_or_else(PoisonError::into_inner);
        self.restore_locked()
    }
}

impl<R: Rng + Send> Classifier for RandomClassifier<R> {
    /// Adds `subject_id` to the known ids. The feature vector is ignored.
    ///
    /// Training an id twice stores it once; the blob is rewritten with
    /// the same content.
    fn train(&mut self, subject_id: i32, _features: &[f64]) -> Result<(), ClassifierError> {
        let lock = self.store.lock();
        let _guard = lock.write().unwrap_or_else(PoisonError::into_inner);

        let mut ids = self.restore_locked()?;
        let added = ids.insert(subject_id);
        self.store.dump(&ids)?;

        info!(key = self.store.key(), subject_id, added, known = ids.len(), "trained subject");
        self.known = Some(ids);
        Ok(())
    }

    /// Draws two distinct known ids at random.
    ///
    /// With no known ids, answers subject 0 and remembers 0 as known for
    /// this instance only. With a single known id `k`, the second
    /// candidate is `k + 1`.
    fn classify(&mut self, _features: &[f64]) -> Result<&ResultSet, ClassifierError> {
        let mut known = match self.known.take() {
            Some(known) => known,
            None => self.restore()?,
        };

        let mut results = ResultSet::with_capacity(2);
        let ids: Vec<i32> = known.iter().collect();
        match ids.len() {
            0 => {
                results.add(0, 0.0, Some(OUT_OF_THE_BLUE.into()));
                known.insert(0);
            }
            1 => {
                let first = ids[0];
                results.add(first, 0.0, None);
                results.add(first.wrapping_add(1), 0.0, None);
            }
            n => {
                let first = ids[self.rng.gen_range(0..n)];
                let second = loop {
                    let candidate = ids[self.rng.gen_range(0..n)];
                    if candidate != first {
                        break candidate;
                    }
                };
                results.add(first, 0.0, None);
                results.add(second, 0.0, None);
            }
        }

        debug!(key = self.store.key(), known = ids.len(), "guessed subjects");
        self.known = Some(known);
        self.results = results;
        Ok(&self.results)
    }

    fn result_set(&self) -> &ResultSet {
        &self.results
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::Pipeline;
    use crate::store::{BlobStore, MemoryStore};

    fn store(backend: Arc<dyn BlobStore>) -> ModelStore {
        ModelStore::new(backend, "Random", Pipeline::new(1, 1))
    }

    #[test]
    fn first_guess_comes_out_of_the_blue() {
        let mut c = RandomClassifier::seeded(store(Arc::new(MemoryStore::new())), 1);
        let results = c.classify(&[]).unwrap();
        assert_eq!(results.len(), 1);

        let only = results.get(0).unwrap();
        assert_eq!(only.subject_id, 0);
        assert_eq!(only.distance, 0.0);
        assert_eq!(only.label.as_deref(), Some(OUT_OF_THE_BLUE));
        assert_eq!(c.result().unwrap().subject_id, 0);
    }

    #[test]
    fn seeded_zero_is_not_persisted() {
        let backend = Arc::new(MemoryStore::new());
        let mut c = RandomClassifier::seeded(store(backend.clone()), 1);
        c.classify(&[]).unwrap();
        assert!(c.known().unwrap().contains(0));

        // The empty set was persisted on restore, without the seeded 0.
        let (stored, existed) = store(backend.clone()).restore::<KnownIdSet>().unwrap();
        assert!(existed);
        assert!(stored.is_empty());

        // The same instance now answers from its in-memory {0}.
        let results = c.classify(&[]).unwrap();
        let ids: Vec<i32> = results.iter().map(|m| m.subject_id).collect();
        assert_eq!(ids, vec![0, 1]);
    }

    #[test]
    fn single_known_id_pairs_with_successor() {
        let mut c = RandomClassifier::seeded(store(Arc::new(MemoryStore::new())), 7);
        c.train(41, &[]).unwrap();

        let results = c.classify(&[1.0]).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results.get(0).unwrap().subject_id, 41);
        assert_eq!(results.get(1).unwrap().subject_id, 42);
        assert!(results.iter().all(|m| m.distance == 0.0));
        assert_eq!(c.result().unwrap().subject_id, 41);
    }

    #[test]
    fn guesses_are_distinct_known_ids() {
        let mut c = RandomClassifier::seeded(store(Arc::new(MemoryStore::new())), 42);
        for id in [3, 5, 9] {
            c.train(id, &[]).unwrap();
        }

        for _ in 0..100 {
            let results = c.classify(&[]).unwrap();
            assert_eq!(results.len(), 2);
            let first = results.get(0).unwrap().subject_id;
            let second = results.get(1).unwrap().subject_id;
            assert_ne!(first, second);
            assert!([3, 5, 9].contains(&first));
            assert!([3, 5, 9].contains(&second));
        }
    }

    #[test]
    fn training_twice_stores_once() {
        let backend = Arc::new(MemoryStore::new());
        let mut c = RandomClassifier::seeded(store(backend.clone()), 3);
        c.train(12, &[]).unwrap();
        let first_blob = backend.read("Random.1.1.gzbin").unwrap().unwrap();
        c.train(12, &[]).unwrap();
        let second_blob = backend.read("Random.1.1.gzbin").unwrap().unwrap();

        let (ids, _) = store(backend).restore::<KnownIdSet>().unwrap();
        assert_eq!(ids.len(), 1);
        assert!(ids.contains(12));
        let first: KnownIdSet = crate::codec::decode(&first_blob).unwrap();
        let second: KnownIdSet = crate::codec::decode(&second_blob).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn training_picks_up_other_instances() {
        let backend: Arc<dyn BlobStore> = Arc::new(MemoryStore::new());
        let mut a = RandomClassifier::seeded(store(backend.clone()), 1);
        let mut b = RandomClassifier::seeded(store(backend.clone()), 2);
        a.train(1, &[]).unwrap();
        b.train(2, &[]).unwrap();

        let (ids, _) = store(backend).restore::<KnownIdSet>().unwrap();
        assert_eq!(ids.iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn same_seed_same_guesses() {
        let backend: Arc<dyn BlobStore> = Arc::new(MemoryStore::new());
        let mut trainer = RandomClassifier::new(store(backend.clone()));
        for id in 0..20 {
            trainer.train(id, &[]).unwrap();
        }

        let mut a = RandomClassifier::seeded(store(backend.clone()), 99);
        let mut b = RandomClassifier::seeded(store(backend), 99);
        for _ in 0..10 {
            let ra = a.classify(&[]).unwrap().clone();
            let rb = b.classify(&[]).unwrap().clone();
            assert_eq!(ra, rb);
        }
    }
}
