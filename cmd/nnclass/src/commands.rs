//! Subcommand implementations.

use std::sync::Arc;

use giztoy_nnclass::{ClassifierKind, FileStore, Match, Settings, build};
use serde::Serialize;

use crate::Cli;
use crate::config;

#[derive(Serialize)]
struct TrainOutput {
    classifier: ClassifierKind,
    subject: i32,
    dimension: usize,
}

#[derive(Serialize)]
struct ClassifyOutput<'a> {
    classifier: ClassifierKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    best: Option<&'a Match>,
    ranked: Vec<&'a Match>,
}

#[derive(Serialize)]
struct KindInfo {
    name: &'static str,
    distance_based: bool,
}

fn settings(cli: &Cli) -> anyhow::Result<Settings> {
    let file = config::load_settings(cli.config.as_deref())?;
    config::resolve(cli, file)
}

fn open(settings: &Settings) -> anyhow::Result<Box<dyn giztoy_nnclass::Classifier>> {
    let dir = settings
        .model_dir
        .clone()
        .ok_or_else(|| anyhow::anyhow!("model directory is not set"))?;
    let store = FileStore::open(dir)?;
    Ok(build(settings, Arc::new(store))?)
}

/// Parses "1.0, -2.5,3" into a feature vector.
pub fn parse_features(s: &str) -> anyhow::Result<Vec<f64>> {
    let values = s
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<f64>()
                .map_err(|e| anyhow::anyhow!("invalid feature value {v:?}: {e}"))
        })
        .collect::<anyhow::Result<Vec<f64>>>()?;
    if values.is_empty() {
        anyhow::bail!("feature vector is empty");
    }
    Ok(values)
}

fn write<T: Serialize>(cli: &Cli, value: &T) -> anyhow::Result<()> {
    let output = if cli.json {
        serde_json::to_string_pretty(value)?
    } else {
        serde_yaml::to_string(value)?
    };
    println!("{}", output);
    Ok(())
}

pub fn train(cli: &Cli, subject: i32, features: &str) -> anyhow::Result<()> {
    let settings = settings(cli)?;
    let features = parse_features(features)?;
    let mut classifier = open(&settings)?;
    classifier.train(subject, &features)?;

    write(
        cli,
        &TrainOutput {
            classifier: settings.classifier,
            subject,
            dimension: features.len(),
        },
    )
}

pub fn classify(cli: &Cli, features: &str) -> anyhow::Result<()> {
    let settings = settings(cli)?;
    let features = parse_features(features)?;
    let mut classifier = open(&settings)?;
    let results = classifier.classify(&features)?;

    if results.is_empty() {
        tracing::warn!("no subjects trained for {}", settings.classifier);
    }
    write(
        cli,
        &ClassifyOutput {
            classifier: settings.classifier,
            best: results.minimum().ok(),
            ranked: results.ranked(),
        },
    )
}

pub fn kinds(cli: &Cli) -> anyhow::Result<()> {
    let kinds: Vec<KindInfo> = ClassifierKind::ALL
        .iter()
        .map(|k| KindInfo {
            name: k.as_str(),
            distance_based: *k != ClassifierKind::Random,
        })
        .collect();
    write(cli, &kinds)
}
