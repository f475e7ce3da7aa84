//! Nearest-neighbor subject classification with persisted per-subject models.
//!
//! A subject (e.g. a speaker) is trained by storing its mean feature
//! vector. Classifying a sample scores it against every stored mean with
//! a [`DistanceMetric`] and records one [`Match`] per subject; the
//! smallest distance wins.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use giztoy_nnclass::{Classifier, DistanceClassifier, MemoryStore, Metric, ModelStore, Pipeline};
//!
//! let store = ModelStore::new(Arc::new(MemoryStore::new()), "Euclidean", Pipeline::new(1, 1));
//! let mut c = DistanceClassifier::new(Metric::Euclidean, store);
//!
//! c.train(1, &[0.0, 0.0]).unwrap();
//! c.train(2, &[3.0, 4.0]).unwrap();
//!
//! c.classify(&[2.5, 4.0]).unwrap();
//! assert_eq!(c.result().unwrap().subject_id, 2);
//! ```
//!
//! # Persistence
//!
//! Models live in a [`BlobStore`] under `"<kind>.<preprocessing>.<extraction>.gzbin"`,
//! gzip-compressed in a versioned binary layout (see [`codec`]).
//! Training holds the key's write lock across restore, update and dump;
//! classification holds the read lock while restoring.
//!
//! # Baseline
//!
//! [`RandomClassifier`] guesses among known subject ids. Real classifiers
//! must beat it; it is a floor for regression tests, not a predictor.

mod classifier;
pub mod codec;
mod error;
pub mod metric;
mod model;
mod random;
mod registry;
mod result;
mod store;

pub use classifier::{Classifier, DistanceClassifier};
pub use error::{ClassifierError, StorageError};
pub use metric::{DEFAULT_MINKOWSKI_ORDER, DistanceMetric, Metric, MinkowskiOrder};
pub use model::{KnownIdSet, Pipeline, SubjectModel, TrainingSet};
pub use random::{OUT_OF_THE_BLUE, RandomClassifier};
pub use registry::{ClassifierKind, Settings, build};
pub use result::{Match, ResultSet};
pub use store::{BLOB_EXTENSION, BlobStore, FileStore, MemoryStore, ModelStore};
