use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::error::RuleError;
use crate::piece::PatternPiece;
use crate::wire::PieceSpec;

pub trait PatternRuleLookup {
    fn lookup(&self, sleeves: &str, neckline: &str, size: &str) -> Option<&SizePattern>;

    /// True when a rule exists for the combination, whatever its sizes.
    fn has_design(&self, sleeves: &str, neckline: &str) -> bool;
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SizePattern {
    pub pieces: Vec<PatternPiece>,
    /// Image type to storage path.
    pub assets: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternRule {
    pub id: String,
    pub sleeves: String,
    pub neckline: String,
    pub sizes: BTreeMap<String, SizePattern>,
}

impl PatternRule {
    pub fn size(&self, size: &str) -> Option<&SizePattern> {
        self.sizes.get(size)
    }
}

#[derive(Deserialize)]
struct RuleRecord {
    id: String,
    sleeves: String,
    neckline: String,
    #[serde(default)]
    assets: AssetRecord,
    #[serde(default)]
    pieces: BTreeMap<String, Vec<PieceSpec>>,
}

#[derive(Deserialize, Default)]
struct AssetRecord {
    #[serde(default)]
    pattern_images: BTreeMap<String, BTreeMap<String, String>>,
}

impl RuleRecord {
    fn into_rule(self) -> Result<PatternRule, RuleError> {
        let mut sizes: BTreeMap<String, SizePattern> = BTreeMap::new();

        for (size, specs) in self.pieces {
            let mut seen = HashSet::new();
            let mut pieces = Vec::with_capacity(specs.len());
            for spec in &specs {
                if !seen.insert(spec.piece_id.as_str()) {
                    return Err(RuleError::DuplicatePiece {
                        rule_id: self.id,
                        size,
                        piece_id: spec.piece_id.clone(),
                    });
                }
                let piece = spec.to_piece().map_err(|source| RuleError::Piece {
                    rule_id: self.id.clone(),
                    size: size.clone(),
                    source,
                })?;
                pieces.push(piece);
            }
            sizes.entry(size).or_default().pieces = pieces;
        }

        for (size, images) in self.assets.pattern_images {
            let assets = images
                .into_iter()
                .map(|(kind, path)| {
                    let stored = asset_path(&self.sleeves, &self.neckline, &kind, &path);
                    (kind, stored)
                })
                .collect();
            sizes.entry(size).or_default().assets = assets;
        }

        Ok(PatternRule {
            id: self.id,
            sleeves: self.sleeves,
            neckline: self.neckline,
            sizes,
        })
    }
}

pub fn asset_path(sleeves: &str, neckline: &str, kind: &str, path: &str) -> String {
    let filename = Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(path);
    format!("storage/pattern-images/{sleeves}/{neckline}/{kind}/{filename}")
}

#[derive(Debug, Clone, Default)]
pub struct RuleBook {
    rules: Vec<PatternRule>,
}

impl RuleBook {
    pub fn from_json(json: &str) -> Result<Self, RuleError> {
        let mut book = Self::default();
        book.import_json(json)?;
        Ok(book)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RuleError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Imports every rule of a JSON array. A rule whose id is already known
    /// replaces the old one. Nothing is imported if any rule is invalid.
    pub fn import_json(&mut self, json: &str) -> Result<usize, RuleError> {
        let records: Vec<RuleRecord> = serde_json::from_str(json)?;
        let rules = records
            .into_iter()
            .map(RuleRecord::into_rule)
            .collect::<Result<Vec<_>, _>>()?;
        let count = rules.len();
        for rule in rules {
            self.upsert(rule);
        }
        info!(imported = count, total = self.rules.len(), "pattern rules imported");
        Ok(count)
    }

    pub fn upsert(&mut self, rule: PatternRule) {
        match self.rules.iter_mut().find(|r| r.id == rule.id) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    pub fn get(&self, id: &str) -> Option<&PatternRule> {
        self.rules.iter().find(|r| r.id == id)
    }

    pub fn find_rule(&self, sleeves: &str, neckline: &str) -> Option<&PatternRule> {
        self.rules
            .iter()
            .find(|r| r.sleeves == sleeves && r.neckline == neckline)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl PatternRuleLookup for RuleBook {
    fn lookup(&self, sleeves: &str, neckline: &str, size: &str) -> Option<&SizePattern> {
        self.find_rule(sleeves, neckline)?.size(size)
    }

    fn has_design(&self, sleeves: &str, neckline: &str) -> bool {
        self.find_rule(sleeves, neckline).is_some()
    }
}
