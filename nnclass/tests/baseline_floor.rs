//! Every distance classifier must beat the random baseline on data with
//! well separated subjects.

use std::sync::Arc;

use giztoy_nnclass::{BlobStore, ClassifierKind, FileStore, Pipeline, Settings, build};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const DIM: usize = 8;
const SUBJECTS: i32 = 5;
const SAMPLES: usize = 200;

/// Subject `k` sits at `10 * e_(k-1)`.
fn centroid(subject_id: i32) -> Vec<f64> {
    let mut v = vec![0.0; DIM];
    v[(subject_id - 1) as usize] = 10.0;
    v
}

fn noisy_samples(seed: u64) -> Vec<(i32, Vec<f64>)> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..SAMPLES)
        .map(|_| {
            let subject_id = rng.gen_range(1..=SUBJECTS);
            let sample = centroid(subject_id)
                .into_iter()
                .map(|x| x + rng.gen_range(-2.0..2.0))
                .collect();
            (subject_id, sample)
        })
        .collect()
}

fn accuracy(settings: &Settings, backend: Arc<dyn BlobStore>, samples: &[(i32, Vec<f64>)]) -> usize {
    let mut trainer = build(settings, backend.clone()).unwrap();
    for subject_id in 1..=SUBJECTS {
        trainer.train(subject_id, &centroid(subject_id)).unwrap();
    }

    // A fresh instance must see the persisted model.
    let mut c = build(settings, backend).unwrap();
    samples
        .iter()
        .filter(|(truth, sample)| {
            let results = c.classify(sample).unwrap();
            assert!(!results.is_empty());
            c.result().unwrap().subject_id == *truth
        })
        .count()
}

#[test]
fn distance_classifiers_beat_random_baseline() {
    let dir = tempfile::tempdir().unwrap();
    let backend: Arc<dyn BlobStore> = Arc::new(FileStore::open(dir.path()).unwrap());
    let pipeline = Pipeline::new(3, 7);
    let samples = noisy_samples(2024);

    let baseline = accuracy(
        &Settings {
            classifier: ClassifierKind::Random,
            pipeline,
            seed: Some(17),
            ..Default::default()
        },
        backend.clone(),
        &samples,
    );
    assert!(
        baseline < SAMPLES / 2,
        "random baseline is suspiciously good: {baseline}/{SAMPLES}"
    );

    for kind in ClassifierKind::ALL {
        if kind == ClassifierKind::Random {
            continue;
        }
        let settings = Settings {
            classifier: kind,
            pipeline,
            ..Default::default()
        };
        let correct = accuracy(&settings, backend.clone(), &samples);
        assert!(
            correct > baseline,
            "{kind}: {correct}/{SAMPLES} does not beat baseline {baseline}/{SAMPLES}"
        );
        assert_eq!(correct, SAMPLES, "{kind} misclassified separable samples");
    }
}

#[test]
fn minkowski_orders_agree_on_separable_data() {
    let dir = tempfile::tempdir().unwrap();
    let backend: Arc<dyn BlobStore> = Arc::new(FileStore::open(dir.path()).unwrap());
    let samples = noisy_samples(7);

    for order in [1.0, 2.0, 3.0, 4.5] {
        let settings = Settings {
            classifier: ClassifierKind::Minkowski,
            minkowski_order: Some(order),
            ..Default::default()
        };
        assert_eq!(
            accuracy(&settings, backend.clone(), &samples),
            SAMPLES,
            "minkowski r={order}"
        );
    }
}
