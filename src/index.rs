// 📚 Reference Index - registry names, aliases and bounded resolution
//
// Layout: one global scope + one scope per Bucket, each with three maps
// (combined / full / abbreviation). Full names are terminal entries;
// abbreviations and brief names are aliases pointing at the bucket's
// full-name map. Depth is ≤ 2 by construction, the hop budget enforces it.
//
// Built once, single-threaded; read-only (and shared via Arc) afterwards.

use crate::classifier::TypeClassifier;
use crate::config::{legal_suffix_pattern, MatchConfig};
use crate::entities::{Bucket, ReferenceEntry, ReferenceRow};
use crate::error::{MatchError, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::{debug, info};

/// Redirects followed before resolution is declared corrupt
pub const MAX_ALIAS_HOPS: usize = 3;

// ============================================================================
// MAP ADDRESSING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Bucket(Bucket),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NameKind {
    /// Full names + abbreviations + brief names
    Combined,
    Full,
    Abbreviation,
}

/// Address of one map in the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapRef {
    pub scope: Scope,
    pub kind: NameKind,
}

impl MapRef {
    pub fn global(kind: NameKind) -> Self {
        MapRef { scope: Scope::Global, kind }
    }

    pub fn bucket(bucket: Bucket, kind: NameKind) -> Self {
        MapRef { scope: Scope::Bucket(bucket), kind }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum IndexEntry {
    Terminal(ReferenceEntry),
    Alias { target: MapRef, key: String },
}

// ============================================================================
// NAME MAP (insertion ordered)
// ============================================================================

/// Key → entry map that iterates in first-insertion order, so similarity
/// tie-breaks are deterministic. Re-inserting a key replaces the entry in place.
#[derive(Debug, Clone, Default)]
pub struct NameMap {
    keys: Vec<String>,
    entries: HashMap<String, IndexEntry>,
}

impl NameMap {
    pub fn insert(&mut self, key: &str, entry: IndexEntry) {
        if !self.entries.contains_key(key) {
            self.keys.push(key.to_string());
        }
        self.entries.insert(key.to_string(), entry);
    }

    pub fn get(&self, key: &str) -> Option<&IndexEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &IndexEntry)> {
        self.keys
            .iter()
            .filter_map(move |k| self.entries.get(k).map(|e| (k.as_str(), e)))
    }
}

#[derive(Debug, Clone, Default)]
struct ScopeMaps {
    combined: NameMap,
    full: NameMap,
    abbreviation: NameMap,
}

impl ScopeMaps {
    fn get(&self, kind: NameKind) -> &NameMap {
        match kind {
            NameKind::Combined => &self.combined,
            NameKind::Full => &self.full,
            NameKind::Abbreviation => &self.abbreviation,
        }
    }

    fn get_mut(&mut self, kind: NameKind) -> &mut NameMap {
        match kind {
            NameKind::Combined => &mut self.combined,
            NameKind::Full => &mut self.full,
            NameKind::Abbreviation => &mut self.abbreviation,
        }
    }
}

// ============================================================================
// REFERENCE INDEX
// ============================================================================

#[derive(Debug, Clone)]
pub struct ReferenceIndex {
    global: ScopeMaps,
    buckets: [ScopeMaps; 7],
    row_count: usize,
    fingerprint: String,
}

impl Default for ReferenceIndex {
    fn default() -> Self {
        ReferenceIndex {
            global: ScopeMaps::default(),
            buckets: std::array::from_fn(|_| ScopeMaps::default()),
            row_count: 0,
            fingerprint: String::new(),
        }
    }
}

impl ReferenceIndex {
    /// Build from registry rows. Fails on the first row missing a full name
    /// or abbreviation, and on any alias that doesn't resolve.
    pub fn build(rows: &[ReferenceRow], config: &MatchConfig) -> Result<Self> {
        let classifier = TypeClassifier::from_config(config)?;
        let suffixes = legal_suffix_pattern(&config.legal_entity_suffixes)?;

        let mut index = ReferenceIndex::default();
        let mut hasher = Sha256::new();

        for (i, row) in rows.iter().enumerate() {
            let full_name = compact(&row.full_name);
            let abbreviation = compact(&row.abbreviation);
            if full_name.is_empty() {
                return Err(MatchError::Validation(format!(
                    "reference row {}: full name can't be empty",
                    i + 1
                )));
            }
            if abbreviation.is_empty() {
                return Err(MatchError::Validation(format!(
                    "reference row {} ({}): abbreviation can't be empty",
                    i + 1,
                    full_name
                )));
            }

            let brief_name = match &suffixes {
                Some(re) => re.split(&full_name).next().unwrap_or("").to_string(),
                None => full_name.clone(),
            };
            let bucket = classifier.bucket_for(&full_name);

            index.register(
                ReferenceEntry {
                    full_name: full_name.clone(),
                    business_type: row.business_type.trim().to_string(),
                    bucket,
                },
                &abbreviation,
                &brief_name,
            );

            hasher.update(format!("{}|{}|{}\n", full_name, abbreviation, row.business_type.trim()));
            debug!(full_name = full_name.as_str(), bucket = bucket.key(), "registered reference row");
        }

        index.row_count = rows.len();
        index.fingerprint = format!("{:x}", hasher.finalize());
        index.verify()?;

        info!(
            rows = index.row_count,
            names = index.global.combined.len(),
            fingerprint = index.fingerprint.as_str(),
            "reference index built"
        );
        Ok(index)
    }

    fn register(&mut self, entry: ReferenceEntry, abbreviation: &str, brief_name: &str) {
        let bucket = entry.bucket;
        let full_name = entry.full_name.clone();

        for map in [
            MapRef::bucket(bucket, NameKind::Full),
            MapRef::global(NameKind::Full),
            MapRef::bucket(bucket, NameKind::Combined),
            MapRef::global(NameKind::Combined),
        ] {
            self.maps_mut(map.scope)
                .get_mut(map.kind)
                .insert(&full_name, IndexEntry::Terminal(entry.clone()));
        }

        let target = MapRef::bucket(bucket, NameKind::Full);
        self.register_alias(bucket, abbreviation, target, &full_name);
        // No legal suffix: the brief name is the full name itself, already terminal
        if !brief_name.is_empty() && brief_name != abbreviation && brief_name != full_name {
            self.register_alias(bucket, brief_name, target, &full_name);
        }
    }

    fn register_alias(&mut self, bucket: Bucket, alias: &str, target: MapRef, full_name: &str) {
        for map in [
            MapRef::bucket(bucket, NameKind::Abbreviation),
            MapRef::global(NameKind::Abbreviation),
            MapRef::bucket(bucket, NameKind::Combined),
            MapRef::global(NameKind::Combined),
        ] {
            // The terminal already owns this key in the combined maps
            if map.kind == NameKind::Combined && alias == full_name {
                continue;
            }
            self.insert_alias(map, alias, target, full_name);
        }
    }

    /// Low-level alias insertion. `build` only produces alias → terminal;
    /// anything else is checked by `verify` / `resolve`.
    pub fn insert_alias(&mut self, map: MapRef, key: &str, target: MapRef, target_key: &str) {
        self.maps_mut(map.scope).get_mut(map.kind).insert(
            key,
            IndexEntry::Alias {
                target,
                key: target_key.to_string(),
            },
        );
    }

    fn maps(&self, scope: Scope) -> &ScopeMaps {
        match scope {
            Scope::Global => &self.global,
            Scope::Bucket(bucket) => &self.buckets[bucket.index()],
        }
    }

    fn maps_mut(&mut self, scope: Scope) -> &mut ScopeMaps {
        match scope {
            Scope::Global => &mut self.global,
            Scope::Bucket(bucket) => &mut self.buckets[bucket.index()],
        }
    }

    pub fn map(&self, map: MapRef) -> &NameMap {
        self.maps(map.scope).get(map.kind)
    }

    /// Follow aliases to a terminal entry. Absent key → None. Running out of
    /// hops is a data-integrity fault, never a loop.
    pub fn resolve(&self, map: MapRef, key: &str) -> Result<Option<ReferenceEntry>> {
        let mut current_map = map;
        let mut current_key: &str = key;
        let mut hops_left = MAX_ALIAS_HOPS;

        loop {
            match self.map(current_map).get(current_key) {
                None => return Ok(None),
                Some(IndexEntry::Terminal(entry)) => return Ok(Some(entry.clone())),
                Some(IndexEntry::Alias { target, key: next }) => {
                    if hops_left == 0 {
                        return Err(MatchError::DataIntegrity {
                            key: key.to_string(),
                            hops: MAX_ALIAS_HOPS,
                        });
                    }
                    hops_left -= 1;
                    current_map = *target;
                    current_key = next.as_str();
                }
            }
        }
    }

    /// Exact lookup across every registered name
    pub fn resolve_name(&self, name: &str) -> Result<Option<ReferenceEntry>> {
        self.resolve(MapRef::global(NameKind::Combined), name)
    }

    /// Resolve every alias once; the first broken chain is reported
    pub fn verify(&self) -> Result<()> {
        let scopes = std::iter::once(Scope::Global).chain(Bucket::ALL.iter().map(|b| Scope::Bucket(*b)));
        for scope in scopes {
            for kind in [NameKind::Combined, NameKind::Full, NameKind::Abbreviation] {
                let map = MapRef { scope, kind };
                for (key, entry) in self.map(map).iter() {
                    if let IndexEntry::Alias { .. } = entry {
                        self.resolve(map, key)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Registered organizations in a bucket
    pub fn len(&self, bucket: Bucket) -> usize {
        self.map(MapRef::bucket(bucket, NameKind::Full)).len()
    }

    pub fn is_empty(&self) -> bool {
        self.global.full.is_empty()
    }

    /// Terminal entries of a bucket, in registration order
    pub fn entries(&self, bucket: Bucket) -> Vec<ReferenceEntry> {
        self.map(MapRef::bucket(bucket, NameKind::Full))
            .iter()
            .filter_map(|(_, entry)| match entry {
                IndexEntry::Terminal(e) => Some(e.clone()),
                IndexEntry::Alias { .. } => None,
            })
            .collect()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    /// sha256 over the registered rows, in order
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }
}

fn compact(s: &str) -> String {
    s.split_whitespace().collect()
}

// ============================================================================
// TESTS
// ============================================================================
