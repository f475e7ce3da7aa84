use std::fmt;

use crate::error::ClassifierError;

/// Minkowski order used when none is configured.
pub const DEFAULT_MINKOWSKI_ORDER: f64 = 3.0;

/// Scores the dissimilarity of two feature vectors.
///
/// Both slices must have the same length; callers check this before
/// scoring. Implementations must be pure: the same inputs always give
/// the same distance and nothing outside the arguments is touched.
pub trait DistanceMetric: Send + Sync {
    fn distance(&self, a: &[f64], b: &[f64]) -> f64;
}

impl<F> DistanceMetric for F
where
    F: Fn(&[f64], &[f64]) -> f64 + Send + Sync,
{
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        self(a, b)
    }
}

/// Order `r` of a Minkowski metric: a positive finite number.
///
/// The only way to get one is [`MinkowskiOrder::new`] (or `default()`,
/// which is 3), so an unchecked order never reaches a metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MinkowskiOrder(f64);

impl MinkowskiOrder {
    pub fn new(order: f64) -> Result<Self, ClassifierError> {
        if !order.is_finite() || order <= 0.0 {
            return Err(ClassifierError::InvalidOrder(order));
        }
        Ok(Self(order))
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for MinkowskiOrder {
    fn default() -> Self {
        Self(DEFAULT_MINKOWSKI_ORDER)
    }
}

impl fmt::Display for MinkowskiOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Built-in distance metrics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Metric {
    /// City-block (L1) distance: `Σ |a_i − b_i|`.
    ///
    /// Older model files call this metric "Chebyshev". The numbers are
    /// unchanged, only the name is corrected; see [`Metric::Chebyshev`]
    /// for the max-abs metric.
    Manhattan,
    /// `sqrt(Σ (a_i − b_i)^2)`.
    Euclidean,
    /// Maximum absolute coordinate difference.
    Chebyshev,
    /// `(Σ |a_i − b_i|^order)^(1/order)`.
    Minkowski(MinkowskiOrder),
    /// `1 − cos(a, b)`, in `[0, 2]`.
    Cosine,
}

impl Metric {
    /// Builds a Minkowski metric, rejecting orders that are not positive
    /// finite numbers.
    pub fn minkowski(order: f64) -> Result<Self, ClassifierError> {
        MinkowskiOrder::new(order).map(Self::Minkowski)
    }
}

impl Default for Metric {
    fn default() -> Self {
        Self::Minkowski(MinkowskiOrder::default())
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Manhattan => write!(f, "manhattan"),
            Self::Euclidean => write!(f, "euclidean"),
            Self::Chebyshev => write!(f, "chebyshev"),
            Self::Minkowski(order) => write!(f, "minkowski(r={order})"),
            Self::Cosine => write!(f, "cosine"),
        }
    }
}

impl DistanceMetric for Metric {
    fn distance(&self, a: &[f64], b: &[f64]) -> f64 {
        match *self {
            Self::Manhattan => manhattan(a, b),
            Self::Euclidean => euclidean(a, b),
            Self::Chebyshev => chebyshev(a, b),
            Self::Minkowski(order) => minkowski(a, b, order),
            Self::Cosine => cosine(a, b),
        }
    }
}

/// Sum of absolute differences.
pub fn manhattan(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y).abs()).sum()
}

pub fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

pub fn chebyshev(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f64::max)
}

pub fn minkowski(a: &[f64], b: &[f64], order: MinkowskiOrder) -> f64 {
    let order = order.get();
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs().powf(order))
        .sum::<f64>()
        .powf(1.0 / order)
}

/// Two zero vectors are identical (0.0); a zero vector against any
/// other vector scores the maximum, 2.0.
pub fn cosine(a: &[f64], b: &[f64]) -> f64 {
    let mut dot = 0.0;
    let mut norm_a = 0.0;
    let mut norm_b = 0.0;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 && norm_b == 0.0 {
        return 0.0;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 2.0;
    }

    // Clamp to [-1, 1] to absorb rounding.
    let similarity = (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0);
    1.0 - similarity
}
