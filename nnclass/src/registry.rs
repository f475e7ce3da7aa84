use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classifier::{Classifier, DistanceClassifier};
use crate::error::ClassifierError;
use crate::metric::{DEFAULT_MINKOWSKI_ORDER, Metric};
use crate::model::Pipeline;
use crate::random::RandomClassifier;
use crate::store::{BlobStore, ModelStore};

/// Every classifier this crate can build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierKind {
    /// Nearest neighbor by city-block (L1) distance.
    #[serde(alias = "l1", alias = "city-block", alias = "cityblock")]
    Manhattan,
    #[serde(alias = "l2")]
    Euclidean,
    Chebyshev,
    #[default]
    Minkowski,
    Cosine,
    /// The random baseline.
    #[serde(alias = "baseline")]
    Random,
}

impl ClassifierKind {
    pub const ALL: [ClassifierKind; 6] = [
        Self::Manhattan,
        Self::Euclidean,
        Self::Chebyshev,
        Self::Minkowski,
        Self::Cosine,
        Self::Random,
    ];

    /// Canonical name, also the first segment of the model blob key.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manhattan => "Manhattan",
            Self::Euclidean => "Euclidean",
            Self::Chebyshev => "Chebyshev",
            Self::Minkowski => "Minkowski",
            Self::Cosine => "Cosine",
            Self::Random => "Random",
        }
    }

    /// Returns the metric for distance-based kinds, `None` for the
    /// random baseline.
    pub fn metric(&self, minkowski_order: Option<f64>) -> Result<Option<Metric>, ClassifierError> {
        let metric = match self {
            Self::Manhattan => Metric::Manhattan,
            Self::Euclidean => Metric::Euclidean,
            Self::Chebyshev => Metric::Chebyshev,
            Self::Minkowski => {
                Metric::minkowski(minkowski_order.unwrap_or(DEFAULT_MINKOWSKI_ORDER))?
            }
            Self::Cosine => Metric::Cosine,
            Self::Random => return Ok(None),
        };
        Ok(Some(metric))
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ClassifierKind {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "manhattan" | "l1" | "city-block" | "cityblock" => Ok(Self::Manhattan),
            "euclidean" | "l2" => Ok(Self::Euclidean),
            "chebyshev" => Ok(Self::Chebyshev),
            "minkowski" => Ok(Self::Minkowski),
            "cosine" => Ok(Self::Cosine),
            "random" | "baseline" => Ok(Self::Random),
            _ => Err(ClassifierError::UnknownKind(s.to_string())),
        }
    }
}

/// Everything needed to build a classifier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub classifier: ClassifierKind,

    /// Minkowski order `r`. Defaults to 3.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minkowski_order: Option<f64>,

    pub pipeline: Pipeline,

    /// Directory holding model blobs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_dir: Option<PathBuf>,

    /// Seed for the random baseline. Entropy when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Builds the classifier selected by `settings` over `backend`.
pub fn build(
    settings: &Settings,
    backend: Arc<dyn BlobStore>,
) -> Result<Box<dyn Classifier>, ClassifierError> {
    let kind = settings.classifier;
    let store = ModelStore::new(backend, kind.as_str(), settings.pipeline);
    debug!(%kind, key = store.key(), "building classifier");

    match kind.metric(settings.minkowski_order)? {
        Some(metric) => Ok(Box::new(DistanceClassifier::new(metric, store))),
        None => Ok(match settings.seed {
            Some(seed) => Box::new(RandomClassifier::seeded(store, seed)),
            None => Box::new(RandomClassifier::new(store)),
        }),
    }
}
