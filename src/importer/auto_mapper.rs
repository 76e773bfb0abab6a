// ==========================================
// Product Feed Import - auto-mapping heuristic
// ==========================================
// Proposes source -> target pairs from field names alone.
// Advisory: the result pre-fills the mapping editor and is never
// applied to a saved feed.
//
// Scoring (names lowercased, non-alphanumerics dropped):
//   exact alias match          -> 1.0
//   alias contained in field   -> 0.5 + 0.4 * alias_len / field_len
// Pairs are assigned best-first; each source and each target is used once.
// ==========================================

use crate::config::alias_table::AliasTable;
use crate::domain::target_schema::TargetField;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;

/// Shortest alias allowed to match by containment.
const MIN_CONTAINED_ALIAS_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingSuggestion {
    pub source_field: String,
    pub target_field: TargetField,
    pub confidence: f64,
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

struct Candidate {
    source_idx: usize,
    target: TargetField,
    alias_rank: usize,
    score: f64,
}

pub struct AutoMapper<'a> {
    aliases: &'a AliasTable,
}

impl<'a> AutoMapper<'a> {
    pub fn new(aliases: &'a AliasTable) -> Self {
        Self { aliases }
    }

    /// Best alias score of `field` for `target`, with the alias position.
    fn score(&self, field: &str, target: TargetField) -> Option<(f64, usize)> {
        let mut best: Option<(f64, usize)> = None;
        for (rank, alias) in self.aliases.aliases(target).iter().enumerate() {
            let alias = normalize_name(alias);
            if alias.is_empty() {
                continue;
            }
            let score = if field == alias {
                1.0
            } else if alias.chars().count() >= MIN_CONTAINED_ALIAS_LEN && field.contains(&alias) {
                0.5 + 0.4 * alias.chars().count() as f64 / field.chars().count() as f64
            } else {
                continue;
            };
            if best.map_or(true, |(s, _)| score > s) {
                best = Some((score, rank));
            }
        }
        best
    }

    pub fn suggest(&self, fields: &[String]) -> Vec<MappingSuggestion> {
        let mut candidates = Vec::new();
        for (source_idx, field) in fields.iter().enumerate() {
            let normalized = normalize_name(field);
            if normalized.is_empty() {
                continue;
            }
            for (target, _) in self.aliases.iter() {
                if let Some((score, alias_rank)) = self.score(&normalized, target) {
                    candidates.push(Candidate {
                        source_idx,
                        target,
                        alias_rank,
                        score,
                    });
                }
            }
        }

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.alias_rank.cmp(&b.alias_rank))
                .then(a.target.cmp(&b.target))
                .then(a.source_idx.cmp(&b.source_idx))
        });

        let mut used_sources = HashSet::new();
        let mut used_targets = HashSet::new();
        let mut chosen: Vec<(usize, MappingSuggestion)> = Vec::new();
        for c in candidates {
            if used_sources.contains(&c.source_idx) || used_targets.contains(&c.target) {
                continue;
            }
            used_sources.insert(c.source_idx);
            used_targets.insert(c.target);
            chosen.push((
                c.source_idx,
                MappingSuggestion {
                    source_field: fields[c.source_idx].clone(),
                    target_field: c.target,
                    confidence: (c.score * 100.0).round() / 100.0,
                },
            ));
        }

        chosen.sort_by_key(|(idx, _)| *idx);
        chosen.into_iter().map(|(_, s)| s).collect()
    }
}
