//! Rule-based matching of branded ingredients against an INCI query.
//!
//! A branded ingredient matches when its full constituent set is present
//! in the query (subset match; no partial credit). Confidence combines a
//! proximity score, which rewards constituents listed close together in
//! the original label order, with a rarity discount for blends
//! explainable by ubiquitous fillers. Also detects cross-brand conflicts
//! and computes the graph-density confidence multiplier.

use std::collections::{BTreeSet, HashMap, HashSet};

use incimatch_model::{CatalogEntry, Conflict, ScoredMatch, StoreSnapshot};
use incimatch_normalize::{normalize, NormalizedQuery};

/// Ubiquitous fillers that make a match less informative.
const GENERIC_INGREDIENTS: [&str; 6] =
    ["water", "aqua", "glycerin", "fragrance", "alcohol", "phenoxyethanol"];

/// Proximity fallback when fewer than two constituent positions are known.
const LOW_INFORMATION_PROXIMITY: f64 = 0.6;

/// Rarity discount applied on overlap with `GENERIC_INGREDIENTS`.
const GENERIC_RARITY_FACTOR: f64 = 0.85;

/// Output of rule matching for one query.
#[derive(Debug, Clone, Default)]
pub struct RuleMatchOutcome {
    pub matched: Vec<ScoredMatch>,
    pub conflicts: Vec<Conflict>,
    /// Query ingredients not covered by any matched blend, in query order
    pub unmatched: Vec<String>,
}

/// Project a store snapshot into the matcher-facing catalog, resolving
/// ingredient and supplier references. Dangling references are dropped.
pub fn build_catalog(snapshot: &StoreSnapshot) -> Vec<CatalogEntry> {
    let ingredients: HashMap<&str, &str> = snapshot
        .ingredients
        .iter()
        .map(|record| (record.id.as_str(), record.inci_name.as_str()))
        .collect();
    let suppliers: HashMap<&str, &str> = snapshot
        .suppliers
        .iter()
        .map(|record| (record.id.as_str(), record.name.as_str()))
        .collect();

    snapshot
        .branded
        .iter()
        .map(|record| {
            let display: Vec<String> = record
                .inci_ids
                .iter()
                .filter_map(|id| ingredients.get(id.as_str()))
                .map(|name| (*name).to_string())
                .collect();
            let normalized = display.iter().map(|name| normalize(name)).collect();

            CatalogEntry {
                branded_id: record.id.clone(),
                product_name: record.name.clone(),
                supplier_name: record
                    .supplier_id
                    .as_deref()
                    .and_then(|id| suppliers.get(id))
                    .map(|name| (*name).to_string()),
                ingredient_names: normalized,
                ingredient_display: display,
                description: record.description.clone(),
                document_ids: record.document_ids.clone(),
            }
        })
        .collect()
}

/// Match a normalized query against the catalog.
///
/// The conflict index covers the full catalog independent of which
/// blends match, so an ambiguous ingredient is flagged even when only
/// one of its blends is fully present. Blends with an empty constituent
/// set never match.
pub fn match_query(query: &NormalizedQuery, catalog: &[CatalogEntry]) -> RuleMatchOutcome {
    let mut containing: HashMap<&str, BTreeSet<&str>> = HashMap::new();
    for entry in catalog {
        for name in &entry.ingredient_names {
            containing
                .entry(name.as_str())
                .or_default()
                .insert(entry.product_name.as_str());
        }
    }

    let mut matched = Vec::new();
    let mut covered: HashSet<&str> = HashSet::new();

    for entry in catalog {
        let names: HashSet<&str> = entry.ingredient_names.iter().map(String::as_str).collect();
        if names.is_empty() || !names.iter().all(|name| query.contains(name)) {
            continue;
        }

        let proximity = proximity_score(query, &entry.ingredient_names);
        let rarity = rarity_factor(&names);
        let confidence = round3(proximity * rarity);

        covered.extend(names.iter().copied());
        matched.push(ScoredMatch {
            branded_id: entry.branded_id.clone(),
            product_name: entry.product_name.clone(),
            supplier: entry.supplier_name.clone(),
            matched_inci: entry.ingredient_display.clone(),
            confidence,
            description: entry.description.clone(),
            document_ids: entry.document_ids.clone(),
        });
    }

    let mut conflicts = Vec::new();
    for (key, display) in query.keys().iter().zip(query.display()) {
        if let Some(products) = containing.get(key.as_str()) {
            if products.len() > 1 {
                conflicts.push(Conflict {
                    inci_name: display.clone(),
                    possible_brands: products.iter().map(|name| (*name).to_string()).collect(),
                    context: Some("Ingredient used in multiple branded complexes".to_string()),
                });
            }
        }
    }

    let unmatched = query
        .keys()
        .iter()
        .zip(query.display())
        .filter(|(key, _)| !covered.contains(key.as_str()))
        .map(|(_, display)| display.clone())
        .collect();

    RuleMatchOutcome {
        matched,
        conflicts,
        unmatched,
    }
}

/// Score how close a blend's constituents sit within the query order.
///
/// With fewer than two known positions there is nothing to measure and a
/// fixed low-information default applies. Otherwise the positional
/// spread is scaled by the query length: constituents listed together
/// (INCI lists order by concentration) score higher.
fn proximity_score(query: &NormalizedQuery, ingredient_names: &[String]) -> f64 {
    let positions: Vec<usize> = ingredient_names
        .iter()
        .filter_map(|name| query.position(name))
        .collect();
    if positions.len() < 2 {
        return LOW_INFORMATION_PROXIMITY;
    }
    let min = positions.iter().copied().min().unwrap_or(0);
    let max = positions.iter().copied().max().unwrap_or(0);
    round3(1.0 - (max - min) as f64 / query.len() as f64)
}

fn rarity_factor(names: &HashSet<&str>) -> f64 {
    if GENERIC_INGREDIENTS.iter().any(|generic| names.contains(generic)) {
        GENERIC_RARITY_FACTOR
    } else {
        1.0
    }
}

/// Graph-density confidence multiplier in [0.7, 1.0].
///
/// Builds an undirected clique over each matched blend's constituents,
/// unioned over all matches, with the query's ingredients as the vertex
/// set; edge density maps linearly onto the multiplier range.
/// Ingredients that co-occur across many matched blends reinforce each
/// other's plausibility.
pub fn density_multiplier(query: &NormalizedQuery, matched: &[ScoredMatch]) -> f64 {
    let vertices = query.len();
    if vertices < 2 {
        return 0.7;
    }

    let mut edges: HashSet<(String, String)> = HashSet::new();
    for scored in matched {
        let keys: Vec<String> = scored.matched_inci.iter().map(|name| normalize(name)).collect();
        for i in 0..keys.len() {
            for j in (i + 1)..keys.len() {
                if keys[i] == keys[j] {
                    continue;
                }
                let pair = if keys[i] < keys[j] {
                    (keys[i].clone(), keys[j].clone())
                } else {
                    (keys[j].clone(), keys[i].clone())
                };
                edges.insert(pair);
            }
        }
    }

    let possible = vertices * (vertices - 1) / 2;
    let density = edges.len() as f64 / possible as f64;
    round3((0.7 + 0.3 * density).clamp(0.7, 1.0))
}

/// Combine per-match confidences and the density multiplier into one
/// bounded overall score. An empty match list aggregates to 0.
pub fn aggregate_confidence(matched: &[ScoredMatch], graph_multiplier: f64) -> f64 {
    let total: f64 = matched.iter().map(|scored| scored.confidence).sum();
    let mean = total / matched.len().max(1) as f64;
    round3((mean * graph_multiplier).min(1.0))
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}
