//! Core domain model for incimatch branded-ingredient analysis.
//!
//! This crate defines the fundamental types used throughout the system:
//! - Store records: `IngredientRecord`, `BrandedRecord`, `SupplierRecord`, `CategoryRecord`
//! - `StoreSnapshot`: a point-in-time read of all source collections
//! - `CatalogEntry`: the matcher-facing projection of a branded ingredient
//! - Analysis output: `ScoredMatch`, `Conflict`, `AnalyzeResponse`
//! - Prediction output: `FeatureVector`, `Prediction`, `PredictResponse`

use serde::{Deserialize, Serialize};

/// An INCI ingredient record from the document store.
///
/// Field aliases accept the raw document shapes produced by the data
/// pipeline, so partially-cleaned records still map onto this struct.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngredientRecord {
    /// Store id
    #[serde(alias = "_id")]
    pub id: String,

    /// Canonical display name
    #[serde(default, alias = "inciName")]
    pub inci_name: String,

    /// Pre-normalized name, if the pipeline produced one
    #[serde(default, alias = "inciName_normalized", skip_serializing_if = "Option::is_none")]
    pub inci_name_normalized: Option<String>,
}

/// A branded ingredient record: a supplier's proprietary blend declared
/// as a fixed set of INCI references.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandedRecord {
    /// Store id
    #[serde(alias = "_id")]
    pub id: String,

    /// Product display name
    #[serde(default, alias = "ingredient_name")]
    pub name: String,

    /// INCI string as printed on the supplier's documentation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_inci_name: Option<String>,

    /// Constituent ingredient references
    #[serde(default)]
    pub inci_ids: Vec<String>,

    /// Supplier reference, if known
    #[serde(default, alias = "SupplierId", skip_serializing_if = "Option::is_none")]
    pub supplier_id: Option<String>,

    /// Functional category references
    #[serde(default)]
    pub functional_category_ids: Vec<String>,

    /// Chemical class references
    #[serde(default, alias = "chemical_class_id")]
    pub chemical_class_ids: Vec<String>,

    /// Free-text description
    #[serde(default)]
    pub description: String,

    /// Attached document references (TDS, brochures)
    #[serde(default, alias = "documents_id")]
    pub document_ids: Vec<String>,
}

impl BrandedRecord {
    /// Create a minimal record for testing.
    pub fn new(id: impl Into<String>, name: impl Into<String>, inci_ids: Vec<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            inci_ids,
            ..Self::default()
        }
    }
}

/// A supplier record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SupplierRecord {
    #[serde(alias = "_id")]
    pub id: String,

    #[serde(default, alias = "supplierName")]
    pub name: String,
}

/// A functional-category or chemical-class record. Categories form a
/// tree through `parent_id`; a category has zero or one parent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryRecord {
    #[serde(alias = "_id")]
    pub id: String,

    #[serde(default, alias = "functionalName", alias = "chemicalClassName")]
    pub name: String,

    /// Depth in the category tree
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,

    /// Parent category, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// A point-in-time read of all five source collections, consumed by the
/// knowledge-graph build.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub ingredients: Vec<IngredientRecord>,
    pub branded: Vec<BrandedRecord>,
    pub suppliers: Vec<SupplierRecord>,
    pub functional_categories: Vec<CategoryRecord>,
    pub chemical_classes: Vec<CategoryRecord>,
}

/// Matcher-facing projection of a branded ingredient: the record joined
/// with its resolved ingredient and supplier names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub branded_id: String,
    pub product_name: String,

    /// Supplier display name, if the record resolves to one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier_name: Option<String>,

    /// Constituent ingredient names, normalized form
    pub ingredient_names: Vec<String>,

    /// Constituent ingredient names as displayed
    pub ingredient_display: Vec<String>,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub document_ids: Vec<String>,
}

/// A branded ingredient matched against a query, with its confidence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredMatch {
    pub branded_id: String,
    pub product_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,

    /// The query ingredients this blend accounts for
    pub matched_inci: Vec<String>,

    /// Match confidence in [0.0, 1.0]
    pub confidence: f64,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub document_ids: Vec<String>,
}

/// An ingredient name that could belong to more than one branded blend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub inci_name: String,

    /// All branded products that contain this ingredient
    pub possible_brands: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Response for the `analyze` operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub matched: Vec<ScoredMatch>,

    #[serde(default)]
    pub unmatched: Vec<String>,

    #[serde(default)]
    pub conflicts: Vec<Conflict>,

    /// Aggregate confidence in [0.0, 1.0]
    #[serde(default)]
    pub overall_confidence: f64,

    #[serde(default)]
    pub processing_time_seconds: f64,
}

/// Structural features for a (query, branded candidate) pair.
///
/// Fixed shape: always fully populated, zero when no edges exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// |query ingredients ∩ candidate's constituent ingredients|
    pub overlap_count: u32,

    /// Candidate's total constituent ingredient count
    pub branded_inci_total: u32,

    /// Outgoing supplier-edge count
    pub supplier_degree: u32,

    /// Outgoing functional-category-edge count
    pub func_degree: u32,

    /// Outgoing chemical-class-edge count
    pub chem_degree: u32,
}

impl FeatureVector {
    /// Fixed-order numeric form consumed by external scorers.
    pub fn as_array(&self) -> [f64; 5] {
        [
            f64::from(self.overlap_count),
            f64::from(self.branded_inci_total),
            f64::from(self.supplier_degree),
            f64::from(self.func_degree),
            f64::from(self.chem_degree),
        ]
    }
}

/// A ranked branded candidate from the prediction path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub branded_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub score: f64,

    pub features: FeatureVector,
}

/// Response for the `predict` operation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredictResponse {
    #[serde(default)]
    pub predictions: Vec<Prediction>,

    /// Query ingredients that resolved to known INCI entries
    #[serde(default)]
    pub matched_inci: Vec<String>,

    /// Raw inputs that resolved to nothing
    #[serde(default)]
    pub unmatched: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branded_record_defaults_from_partial_json() {
        let json = r#"{"_id": "b1", "ingredient_name": "Hydrasoft Complex"}"#;
        let record: BrandedRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "b1");
        assert_eq!(record.name, "Hydrasoft Complex");
        assert!(record.inci_ids.is_empty());
        assert!(record.supplier_id.is_none());
        assert_eq!(record.description, "");
    }

    #[test]
    fn test_ingredient_record_aliases() {
        let json = r#"{"_id": "i1", "inciName": "Glycerin", "inciName_normalized": "glycerin"}"#;
        let record: IngredientRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.inci_name, "Glycerin");
        assert_eq!(record.inci_name_normalized.as_deref(), Some("glycerin"));
    }

    #[test]
    fn test_category_record_name_aliases() {
        let func: CategoryRecord =
            serde_json::from_str(r#"{"_id": "f1", "functionalName": "Humectant", "level": 1}"#)
                .unwrap();
        assert_eq!(func.name, "Humectant");

        let chem: CategoryRecord =
            serde_json::from_str(r#"{"_id": "c1", "chemicalClassName": "Polyol"}"#).unwrap();
        assert_eq!(chem.name, "Polyol");
        assert!(chem.parent_id.is_none());
    }

    #[test]
    fn test_feature_vector_as_array_order() {
        let features = FeatureVector {
            overlap_count: 2,
            branded_inci_total: 3,
            supplier_degree: 1,
            func_degree: 4,
            chem_degree: 0,
        };
        assert_eq!(features.as_array(), [2.0, 3.0, 1.0, 4.0, 0.0]);
    }

    #[test]
    fn test_analyze_response_serialization() {
        let response = AnalyzeResponse {
            matched: vec![ScoredMatch {
                branded_id: "b1".to_string(),
                product_name: "Hydrasoft Complex".to_string(),
                supplier: Some("Acme Actives".to_string()),
                matched_inci: vec!["Aqua".to_string(), "Glycerin".to_string()],
                confidence: 0.567,
                description: String::new(),
                document_ids: Vec::new(),
            }],
            unmatched: vec!["Phenoxyethanol".to_string()],
            conflicts: Vec::new(),
            overall_confidence: 0.482,
            processing_time_seconds: 0.004,
        };
        let json = serde_json::to_string(&response).unwrap();
        let parsed: AnalyzeResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.matched.len(), 1);
        assert_eq!(parsed.matched[0].confidence, 0.567);
        assert_eq!(parsed.unmatched, vec!["Phenoxyethanol"]);
    }
}
