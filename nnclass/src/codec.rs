use std::collections::BTreeSet;
use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use crate::error::StorageError;
use crate::model::{KnownIdSet, Pipeline, SubjectModel, TrainingSet};

/// Schema version written into every blob.
pub const VERSION: u32 = 1;

const TRAINING_SET_MAGIC: [u8; 4] = *b"NNTS";
const KNOWN_IDS_MAGIC: [u8; 4] = *b"NNID";

/// A model that can be written to and read from a blob.
///
/// Blob layout, gzip-compressed, all integers little-endian:
///
/// ```text
/// [4B magic] [4B version=1]
/// [4B preprocessing id] [4B extraction id]
/// [4B record count]
/// records...
/// ```
///
/// Training set records are
/// `[4B subject i32] [1B present flag] (present: [4B len] [len x 8B f64])`;
/// known-id records are `[4B subject i32]`.
pub trait Persisted: Sized {
    const MAGIC: [u8; 4];

    /// An empty model for the pipeline, used when no blob exists yet.
    fn empty(pipeline: Pipeline) -> Self;

    fn pipeline(&self) -> Pipeline;

    fn record_count(&self) -> usize;

    fn write_records(&self, out: &mut Vec<u8>);

    fn read_records(r: &mut Payload<'_>, pipeline: Pipeline, count: usize)
    -> Result<Self, StorageError>;
}

impl Persisted for TrainingSet {
    const MAGIC: [u8; 4] = TRAINING_SET_MAGIC;

    fn empty(pipeline: Pipeline) -> Self {
        TrainingSet::new(pipeline)
    }

    fn pipeline(&self) -> Pipeline {
        TrainingSet::pipeline(self)
    }

    fn record_count(&self) -> usize {
        self.len()
    }

    fn write_records(&self, out: &mut Vec<u8>) {
        for s in self.subjects() {
            out.extend_from_slice(&s.subject_id.to_le_bytes());
            match &s.mean {
                None => out.push(0),
                Some(mean) => {
                    out.push(1);
                    out.extend_from_slice(&(mean.len() as u32).to_le_bytes());
                    for v in mean {
                        out.extend_from_slice(&v.to_le_bytes());
                    }
                }
            }
        }
    }

    fn read_records(
        r: &mut Payload<'_>,
        pipeline: Pipeline,
        count: usize,
    ) -> Result<Self, StorageError> {
        let mut subjects = Vec::with_capacity(count.min(r.remaining() / 5));
        let mut seen = BTreeSet::new();
        let mut dimension = None;
        for _ in 0..count {
            let subject_id = r.i32()?;
            if !seen.insert(subject_id) {
                return Err(StorageError::UnknownFormat(format!(
                    "subject {subject_id} appears more than once"
                )));
            }
            let mean = match r.u8()? {
                0 => None,
                1 => {
                    let len = r.u32()? as usize;
                    if len > r.remaining() / 8 {
                        return Err(StorageError::UnknownFormat(format!(
                            "subject {subject_id}: vector length {len} exceeds payload"
                        )));
                    }
                    let expected = *dimension.get_or_insert(len);
                    if expected != len {
                        return Err(StorageError::UnknownFormat(format!(
                            "subject {subject_id}: vector length {len} differs from {expected}"
                        )));
                    }
                    let mut mean = Vec::with_capacity(len);
                    for _ in 0..len {
                        mean.push(r.f64()?);
                    }
                    Some(mean)
                }
                flag => {
                    return Err(StorageError::UnknownFormat(format!(
                        "subject {subject_id}: invalid presence flag {flag}"
                    )));
                }
            };
            subjects.push(SubjectModel { subject_id, mean });
        }
        Ok(TrainingSet::from_parts(pipeline, subjects))
    }
}

impl Persisted for KnownIdSet {
    const MAGIC: [u8; 4] = KNOWN_IDS_MAGIC;

    fn empty(pipeline: Pipeline) -> Self {
        KnownIdSet::new(pipeline)
    }

    fn pipeline(&self) -> Pipeline {
        KnownIdSet::pipeline(self)
    }

    fn record_count(&self) -> usize {
        self.len()
    }

    fn write_records(&self, out: &mut Vec<u8>) {
        for id in self.iter() {
            out.extend_from_slice(&id.to_le_bytes());
        }
    }

    fn read_records(
        r: &mut Payload<'_>,
        pipeline: Pipeline,
        count: usize,
    ) -> Result<Self, StorageError> {
        let mut ids = BTreeSet::new();
        for _ in 0..count {
            let id = r.i32()?;
            if !ids.insert(id) {
                return Err(StorageError::UnknownFormat(format!(
                    "subject {id} appears more than once"
                )));
            }
        }
        Ok(KnownIdSet::from_parts(pipeline, ids))
    }
}

/// Serializes and gzip-compresses a model.
pub fn encode<M: Persisted>(model: &M) -> Result<Vec<u8>, StorageError> {
    let mut raw = Vec::with_capacity(20);
    raw.extend_from_slice(&M::MAGIC);
    raw.extend_from_slice(&VERSION.to_le_bytes());
    let pipeline = model.pipeline();
    raw.extend_from_slice(&pipeline.preprocessing.to_le_bytes());
    raw.extend_from_slice(&pipeline.extraction.to_le_bytes());
    raw.extend_from_slice(&(model.record_count() as u32).to_le_bytes());
    model.write_records(&mut raw);

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(&raw)
        .map_err(|e| StorageError::Compression(format!("gzip compress: {e}")))?;
    encoder
        .finish()
        .map_err(|e| StorageError::Compression(format!("gzip finish: {e}")))
}

/// Decompresses and deserializes a model blob.
///
/// Wrong magic, an unknown version, truncated records and trailing bytes
/// are all rejected; a damaged blob never decodes to an empty model.
/// So are repeated subject ids and training-set vectors of differing
/// lengths.
pub fn decode<M: Persisted>(blob: &[u8]) -> Result<M, StorageError> {
    let mut raw = Vec::new();
    GzDecoder::new(blob)
        .read_to_end(&mut raw)
        .map_err(|e| StorageError::Compression(format!("gzip decompress: {e}")))?;

    let mut r = Payload::new(&raw);

    let magic = r.take(4)?;
    if magic != M::MAGIC {
        return Err(StorageError::UnknownFormat(format!(
            "invalid magic {magic:?} (want {:?})",
            M::MAGIC
        )));
    }

    let version = r.u32()?;
    if version != VERSION {
        return Err(StorageError::UnknownFormat(format!(
            "unsupported version {version} (want {VERSION})"
        )));
    }

    let pipeline = Pipeline::new(r.u32()?, r.u32()?);
    let count = r.u32()? as usize;
    let model = M::read_records(&mut r, pipeline, count)?;

    if r.remaining() > 0 {
        return Err(StorageError::UnknownFormat(format!(
            "{} trailing bytes after {count} records",
            r.remaining()
        )));
    }
    Ok(model)
}

/// Cursor over a decompressed payload.
pub struct Payload<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Payload<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], StorageError> {
        if self.remaining() < n {
            return Err(StorageError::UnknownFormat(format!(
                "truncated payload: need {n} bytes at offset {}, have {}",
                self.pos,
                self.remaining()
            )));
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], StorageError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, StorageError> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u32(&mut self) -> Result<u32, StorageError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn i32(&mut self) -> Result<i32, StorageError> {
        Ok(i32::from_le_bytes(self.array()?))
    }

    pub fn f64(&mut self) -> Result<f64, StorageError> {
        Ok(f64::from_le_bytes(self.array()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_set() -> TrainingSet {
        let mut set = TrainingSet::new(Pipeline::new(2, 5));
        set.upsert(11, &[0.5, -1.25, 3.0]).unwrap();
        set.upsert(-4, &[1e-12, 0.0, f64::MAX]).unwrap();
        set.upsert(0, &[7.0, 8.0, 9.0]).unwrap();
        set
    }

    fn gzip(raw: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(raw).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn training_set_survives_encoding() {
        let set = sample_set();
        let blob = encode(&set).unwrap();
        let back: TrainingSet = decode(&blob).unwrap();
        assert_eq!(back, set);
        let ids: Vec<i32> = back.subjects().iter().map(|s| s.subject_id).collect();
        assert_eq!(ids, vec![11, -4, 0]);
    }

    #[test]
    fn known_ids_survive_encoding() {
        let mut ids = KnownIdSet::new(Pipeline::new(9, 9));
        ids.insert(3);
        ids.insert(1);
        let back: KnownIdSet = decode(&encode(&ids).unwrap()).unwrap();
        assert_eq!(back, ids);
    }

    #[test]
    fn missing_vector_is_preserved() {
        let set = TrainingSet::from_parts(
            Pipeline::default(),
            vec![SubjectModel {
                subject_id: 2,
                mean: None,
            }],
        );
        let back: TrainingSet = decode(&encode(&set).unwrap()).unwrap();
        assert_eq!(back.subjects()[0].mean, None);
    }

    #[test]
    fn rejects_wrong_container() {
        let ids = KnownIdSet::new(Pipeline::default());
        let blob = encode(&ids).unwrap();
        let err = decode::<TrainingSet>(&blob).unwrap_err();
        assert!(matches!(err, StorageError::UnknownFormat(_)), "got {err}");
    }

    #[test]
    fn rejects_unknown_version() {
        let mut raw = Vec::new();
        raw.extend_from_slice(b"NNTS");
        raw.extend_from_slice(&2u32.to_le_bytes());
        raw.extend_from_slice(&[0u8; 12]);
        let err = decode::<TrainingSet>(&gzip(&raw)).unwrap_err();
        assert!(err.to_string().contains("unsupported version 2"), "got {err}");
    }

    #[test]
    fn rejects_truncated_records() {
        let blob = encode(&sample_set()).unwrap();
        let mut raw = Vec::new();
        GzDecoder::new(blob.as_slice()).read_to_end(&mut raw).unwrap();
        raw.truncate(raw.len() - 3);
        let err = decode::<TrainingSet>(&gzip(&raw)).unwrap_err();
        assert!(matches!(err, StorageError::UnknownFormat(_)), "got {err}");
    }

    #[test]
    fn rejects_trailing_bytes() {
        let blob = encode(&KnownIdSet::new(Pipeline::default())).unwrap();
        let mut raw = Vec::new();
        GzDecoder::new(blob.as_slice()).read_to_end(&mut raw).unwrap();
        raw.push(0);
        assert!(decode::<KnownIdSet>(&gzip(&raw)).is_err());
    }

    fn training_payload(records: Vec<(i32, Vec<f64>)>) -> Vec<u8> {
        let mut raw = Vec::new();
        raw.extend_from_slice(b"NNTS");
        raw.extend_from_slice(&VERSION.to_le_bytes());
        raw.extend_from_slice(&[0u8; 8]);
        raw.extend_from_slice(&(records.len() as u32).to_le_bytes());
        for (id, mean) in records {
            raw.extend_from_slice(&id.to_le_bytes());
            raw.push(1);
            raw.extend_from_slice(&(mean.len() as u32).to_le_bytes());
            for v in mean {
                raw.extend_from_slice(&v.to_le_bytes());
            }
        }
        raw
    }

    #[test]
    fn rejects_repeated_subject() {
        let raw = training_payload(vec![(5, vec![1.0, 2.0]), (5, vec![3.0, 4.0])]);
        let err = decode::<TrainingSet>(&gzip(&raw)).unwrap_err();
        assert!(matches!(err, StorageError::UnknownFormat(_)), "got {err}");
        assert!(err.to_string().contains("subject 5"), "got {err}");

        let mut raw = Vec::new();
        raw.extend_from_slice(b"NNID");
        raw.extend_from_slice(&VERSION.to_le_bytes());
        raw.extend_from_slice(&[0u8; 8]);
        raw.extend_from_slice(&2u32.to_le_bytes());
        raw.extend_from_slice(&7i32.to_le_bytes());
        raw.extend_from_slice(&7i32.to_le_bytes());
        let err = decode::<KnownIdSet>(&gzip(&raw)).unwrap_err();
        assert!(matches!(err, StorageError::UnknownFormat(_)), "got {err}");
    }

    #[test]
    fn rejects_mixed_vector_lengths() {
        let raw = training_payload(vec![(1, vec![1.0, 2.0]), (2, vec![3.0])]);
        let err = decode::<TrainingSet>(&gzip(&raw)).unwrap_err();
        assert!(matches!(err, StorageError::UnknownFormat(_)), "got {err}");

        let raw = training_payload(vec![(1, vec![1.0, 2.0]), (2, vec![3.0, 4.0])]);
        let set: TrainingSet = decode(&gzip(&raw)).unwrap();
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn rejects_damaged_compression() {
        let blob = encode(&sample_set()).unwrap();
        assert!(decode::<TrainingSet>(&blob[..blob.len() / 2]).is_err());
        assert!(decode::<TrainingSet>(b"not gzip at all").is_err());
        assert!(decode::<TrainingSet>(&[]).is_err());
    }
}
