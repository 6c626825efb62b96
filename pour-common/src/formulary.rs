// pour-common/src/formulary.rs
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use tracing::{debug, warn};

use super::declaration::load_record;
use super::error::Result;
use super::model::{Checksum, FormulaRecord};

/// Same name and version declared with different checksums. Records whose
/// version cannot be determined are never compared with each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaConflict {
    pub name: String,
    pub version: String,
    pub checksums: Vec<Checksum>,
}

/// An append-only collection of formula records. Successive releases of one
/// package live side by side; nothing is replaced and no release is preferred.
#[derive(Debug, Default)]
pub struct Formulary {
    records: BTreeMap<String, Vec<FormulaRecord>>,
}

impl Formulary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record. Exact duplicates are dropped. Returns the conflict the
    /// record takes part in, if any; all records are kept either way.
    pub fn add(&mut self, record: FormulaRecord) -> Option<FormulaConflict> {
        let entries = self.records.entry(record.name().to_string()).or_default();
        if entries.contains(&record) {
            debug!("Formula '{}' already present, skipping duplicate.", record.display_id());
            return None;
        }

        let version = record.effective_version();
        entries.push(record);

        let conflict = conflict_for(entries, version.as_deref()?)?;
        warn!(
            "Formula '{}' version {} is declared with {} different checksums",
            conflict.name,
            conflict.version,
            conflict.checksums.len()
        );
        Some(conflict)
    }

    /// Loads every `.json`, `.toml` and `.rb` declaration in `dir`.
    pub fn load_dir(&mut self, dir: &Path) -> Result<Vec<FormulaConflict>> {
        let mut paths: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("json" | "toml" | "rb")
                )
            })
            .collect();
        paths.sort();

        let mut conflicts = Vec::new();
        for path in paths {
            let record = load_record(&path)?;
            if let Some(conflict) = self.add(record) {
                conflicts.push(conflict);
            }
        }
        debug!("Loaded {} formula names from {}", self.records.len(), dir.display());
        Ok(conflicts)
    }

    pub fn versions(&self, name: &str) -> &[FormulaRecord] {
        self.records.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Records for `name` whose effective version is `version`. More than one
    /// means the declarations conflict.
    pub fn get(&self, name: &str, version: &str) -> Vec<&FormulaRecord> {
        self.versions(name)
            .iter()
            .filter(|r| r.effective_version().as_deref() == Some(version))
            .collect()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.records.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every name+version pair carrying more than one checksum.
    pub fn conflicts(&self) -> Vec<FormulaConflict> {
        let mut out = Vec::new();
        for entries in self.records.values() {
            let versions: BTreeSet<String> =
                entries.iter().filter_map(|r| r.effective_version()).collect();
            for version in versions {
                if let Some(conflict) = conflict_for(entries, &version) {
                    out.push(conflict);
                }
            }
        }
        out
    }
}

fn conflict_for(entries: &[FormulaRecord], version: &str) -> Option<FormulaConflict> {
    let mut checksums: Vec<Checksum> = Vec::new();
    for record in entries
        .iter()
        .filter(|r| r.effective_version().as_deref() == Some(version))
    {
        if !checksums.contains(record.checksum()) {
            checksums.push(record.checksum().clone());
        }
    }
    if checksums.len() < 2 {
        return None;
    }
    Some(FormulaConflict {
        name: entries[0].name().to_string(),
        version: version.to_string(),
        checksums,
    })
}
