//! Persistent storage of analysis results
//!
//! Every run writes one store: a JSON document holding its finalized
//! histograms and performance curves, keyed by name, along with some metadata
//! about the run. Overlays later read these stores back.

use crate::{
    efficiency::EfficiencyCurve,
    histogram::{Hist1D, Hist2D},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};
use thiserror::Error;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

/// Problems encountered while building, reading or writing a store
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store file could not be accessed
    #[error("cannot access store {path}")]
    Io {
        /// Location of the store
        path: PathBuf,
        /// Underlying failure
        source: io::Error,
    },

    /// The store file is not a valid store
    #[error("store {path} is malformed")]
    Format {
        /// Location of the store
        path: PathBuf,
        /// Underlying failure
        source: serde_json::Error,
    },

    /// Two records were given the same name
    #[error("record {0} was written twice")]
    Duplicate(String),

    /// A histogram was stored before being finalized
    #[error("histogram {0} must be finalized before being stored")]
    NotFinalized(String),
}

/// One named result
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Record {
    /// One-dimensional histogram
    Hist1d(Hist1D),

    /// Two-dimensional histogram
    Hist2d(Hist2D),

    /// Ratio-of-counts curve
    Efficiency(EfficiencyCurve),
}
//
impl Record {
    /// Name under which the record is stored
    pub fn name(&self) -> &str {
        match self {
            Self::Hist1d(h) => &h.name,
            Self::Hist2d(h) => &h.name,
            Self::Efficiency(c) => &c.name,
        }
    }

    fn is_frozen(&self) -> bool {
        match self {
            Self::Hist1d(h) => h.is_frozen(),
            Self::Hist2d(h) => h.is_frozen(),
            Self::Efficiency(_) => true,
        }
    }
}
//
impl From<Hist1D> for Record {
    fn from(h: Hist1D) -> Self {
        Self::Hist1d(h)
    }
}
//
impl From<Hist2D> for Record {
    fn from(h: Hist2D) -> Self {
        Self::Hist2d(h)
    }
}
//
impl From<EfficiencyCurve> for Record {
    fn from(c: EfficiencyCurve) -> Self {
        Self::Efficiency(c)
    }
}

/// Information about the run which produced a store
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreMeta {
    /// Name of the analyzed sample
    pub sample: String,

    /// Creation time, RFC 3339
    pub created: String,

    /// Free-form run summary (event counts, verification figures...)
    pub notes: BTreeMap<String, String>,
}

/// Named records of one run
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputStore {
    meta: StoreMeta,
    records: BTreeMap<String, Record>,
}
//
impl OutputStore {
    /// Start an empty store for some sample
    pub fn new(sample: &str) -> Self {
        let created = OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_default();
        Self {
            meta: StoreMeta {
                sample: sample.to_owned(),
                created,
                notes: BTreeMap::new(),
            },
            records: BTreeMap::new(),
        }
    }

    /// Add a finalized record, refusing to overwrite an existing one
    pub fn insert(&mut self, record: impl Into<Record>) -> Result<(), StoreError> {
        let record = record.into();
        let name = record.name().to_owned();
        if !record.is_frozen() {
            return Err(StoreError::NotFinalized(name));
        }
        if self.records.contains_key(&name) {
            return Err(StoreError::Duplicate(name));
        }
        self.records.insert(name, record);
        Ok(())
    }

    /// Attach a note to the run metadata
    pub fn note(&mut self, key: &str, value: impl ToString) {
        self.meta.notes.insert(key.to_owned(), value.to_string());
    }

    /// Run metadata
    pub fn meta(&self) -> &StoreMeta {
        &self.meta
    }

    /// Look up a record by name
    pub fn get(&self, name: &str) -> Option<&Record> {
        self.records.get(name)
    }

    /// Iterate over records, by name order
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Truth that the store holds no record
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Write the store to disk, replacing any previous file at that location
    pub fn write(&self, path: &Path) -> Result<(), StoreError> {
        let io_error = |source| StoreError::Io {
            path: path.to_owned(),
            source,
        };
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(io_error)?;
        }
        let mut writer = BufWriter::new(File::create(path).map_err(io_error)?);
        serde_json::to_writer_pretty(&mut writer, self).map_err(|source| StoreError::Format {
            path: path.to_owned(),
            source,
        })?;
        writer.flush().map_err(io_error)
    }

    /// Read back a store written by a previous run
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let file = File::open(path).map_err(|source| StoreError::Io {
            path: path.to_owned(),
            source,
        })?;
        serde_json::from_reader(BufReader::new(file)).map_err(|source| StoreError::Format {
            path: path.to_owned(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        efficiency::RatioAccumulator,
        histogram::{Binning, Labels},
    };

    fn finished_hist(name: &str) -> Hist1D {
        let mut h = Hist1D::new(name, Labels::new("pT", "pT [GeV]", "Events"), Binning::new(4, 0., 4.));
        for x in [0.5, 1.5, 1.7, 9.] {
            h.fill(x);
        }
        h.finalize(true);
        h
    }

    #[test]
    fn records_are_written_once_and_only_when_final() {
        let mut store = OutputStore::new("frvz_vbf_500758");
        store.insert(finished_hist("dp_pt")).unwrap();
        assert!(matches!(
            store.insert(finished_hist("dp_pt")),
            Err(StoreError::Duplicate(name)) if name == "dp_pt"
        ));
        let open = Hist1D::new("dp_eta", Labels::default(), Binning::new(4, 0., 4.));
        assert!(matches!(
            store.insert(open),
            Err(StoreError::NotFinalized(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn stores_survive_a_round_trip_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("histograms_frvz.json");

        let mut store = OutputStore::new("frvz");
        store.insert(finished_hist("dp_pt")).unwrap();
        let mut acc = RatioAccumulator::new("efficiency_vs_pt", Labels::default(), Binning::new(2, 0., 2.));
        acc.fill(0.5, true);
        acc.fill(1.5, false);
        store.insert(acc.finalize().unwrap()).unwrap();
        store.note("events", 42);
        store.write(&path).unwrap();

        let reread = OutputStore::open(&path).unwrap();
        assert_eq!(reread, store);
        assert_eq!(reread.meta().notes["events"], "42");
        let Some(Record::Hist1d(h)) = reread.get("dp_pt") else {
            panic!("dp_pt should be a 1D histogram");
        };
        assert!(h.is_frozen());
        assert_eq!(h.counts(), &[1, 2, 0, 1]);
        assert!(matches!(reread.get("efficiency_vs_pt"), Some(Record::Efficiency(_))));
    }

    #[test]
    fn missing_or_malformed_stores_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert!(matches!(OutputStore::open(&missing), Err(StoreError::Io { .. })));
        let garbage = dir.path().join("garbage.json");
        fs::write(&garbage, "{ not a store").unwrap();
        assert!(matches!(OutputStore::open(&garbage), Err(StoreError::Format { .. })));
    }
}
