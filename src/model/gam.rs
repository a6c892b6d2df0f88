//! Additive model loaded from a JSON model description
//!
//! The JSON layout follows the exported EBM format: `featureNames` and
//! `featureTypes` list the main effects, `features` holds the bin edges /
//! labels and additive scores for main effects and interaction terms.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use super::{
    AdditiveModel, BinAxis, Feature, FeatureId, FeatureValue, InteractionTerm, LocalExplanation,
    ModelKind,
};
use crate::error::{CoachError, Result};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawModel {
    feature_names: Vec<String>,
    feature_types: Vec<String>,
    features: Vec<RawFeature>,
    intercept: f64,
    is_classifier: bool,
    /// feature name -> (encoded level -> level name)
    #[serde(default)]
    label_encoder: HashMap<String, HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawFeature {
    name: String,
    #[serde(rename = "type")]
    feature_type: String,
    additive: serde_json::Value,
    #[serde(default)]
    bin_edge: Vec<f64>,
    #[serde(default)]
    bin_label: Vec<serde_json::Value>,
    #[serde(default)]
    name1: Option<String>,
    #[serde(default)]
    name2: Option<String>,
    #[serde(default)]
    bin_label1: Vec<serde_json::Value>,
    #[serde(default)]
    bin_label2: Vec<serde_json::Value>,
}

/// A generalized additive model with binned main effects and pairwise
/// interaction terms.
#[derive(Debug, Clone)]
pub struct Gam {
    features: Vec<Feature>,
    intercept: f64,
    kind: ModelKind,
}

impl Gam {
    /// Build a model from features, validating the layout.
    ///
    /// Main effects must precede interaction terms, score vectors must match
    /// their axes, and interaction constituents must be main effects.
    pub fn new(features: Vec<Feature>, intercept: f64, kind: ModelKind) -> Result<Self> {
        let main_count = features.iter().filter(|f| !f.is_interaction()).count();

        for (i, feature) in features.iter().enumerate() {
            match feature.interaction_term() {
                None => {
                    if i >= main_count {
                        return Err(CoachError::InvalidModel(format!(
                            "Main effect '{}' listed after an interaction term",
                            feature.name
                        )));
                    }
                    if let Some((axis, scores)) = feature.main_effect() {
                        if axis.is_empty() || axis.len() != scores.len() {
                            return Err(CoachError::InvalidModel(format!(
                                "Feature '{}' has {} bins but {} scores",
                                feature.name,
                                axis.len(),
                                scores.len()
                            )));
                        }
                        if let BinAxis::Continuous(starts) = axis {
                            if starts.windows(2).any(|w| w[0] >= w[1]) {
                                return Err(CoachError::InvalidModel(format!(
                                    "Bin edges of '{}' are not strictly increasing",
                                    feature.name
                                )));
                            }
                        }
                    }
                }
                Some(term) => {
                    for id in [term.first, term.second] {
                        if id.0 >= main_count {
                            return Err(CoachError::InvalidModel(format!(
                                "Interaction '{}' refers to feature {} which is not a main effect",
                                feature.name, id
                            )));
                        }
                    }
                    if term.scores.len() != term.first_axis.len()
                        || term
                            .scores
                            .iter()
                            .any(|row| row.len() != term.second_axis.len())
                    {
                        return Err(CoachError::InvalidModel(format!(
                            "Interaction '{}' score table does not match its bin axes",
                            feature.name
                        )));
                    }
                }
            }
        }

        Ok(Self {
            features,
            intercept,
            kind,
        })
    }

    /// Parse a model from its JSON description
    pub fn from_json_str(json: &str) -> Result<Self> {
        let raw: RawModel = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Load a model from a JSON file
    pub fn from_path(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    fn from_raw(raw: RawModel) -> Result<Self> {
        if raw.feature_names.len() != raw.feature_types.len() {
            return Err(CoachError::InvalidModel(
                "featureNames and featureTypes have different lengths".to_string(),
            ));
        }

        let by_name: HashMap<&str, &RawFeature> = raw
            .features
            .iter()
            .map(|f| (f.name.as_str(), f))
            .collect();

        let mut features = Vec::with_capacity(raw.features.len());

        for (name, ftype) in raw.feature_names.iter().zip(&raw.feature_types) {
            let data = by_name.get(name.as_str()).ok_or_else(|| {
                CoachError::InvalidModel(format!("No feature data for '{}'", name))
            })?;
            let scores: Vec<f64> = serde_json::from_value(data.additive.clone())?;

            let feature = match ftype.as_str() {
                "continuous" => Feature::continuous(name.clone(), drop_max_edge(&data.bin_edge), scores),
                "categorical" => Feature::categorical(
                    name.clone(),
                    decode_levels(&data.bin_label, raw.label_encoder.get(name)),
                    scores,
                ),
                other => {
                    return Err(CoachError::InvalidModel(format!(
                        "Unknown feature type '{}' for '{}'",
                        other, name
                    )))
                }
            };
            features.push(feature);
        }

        for data in raw.features.iter().filter(|f| f.feature_type == "interaction") {
            let (name1, name2) = match (&data.name1, &data.name2) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    return Err(CoachError::InvalidModel(format!(
                        "Interaction '{}' is missing its constituent names",
                        data.name
                    )))
                }
            };

            let lookup = |n: &str| -> Result<FeatureId> {
                raw.feature_names
                    .iter()
                    .position(|f| f == n)
                    .map(FeatureId)
                    .ok_or_else(|| {
                        CoachError::InvalidModel(format!(
                            "Interaction '{}' refers to unknown feature '{}'",
                            data.name, n
                        ))
                    })
            };
            let first = lookup(name1)?;
            let second = lookup(name2)?;

            let axis_for = |id: FeatureId, labels: &[serde_json::Value], n: &str| -> Result<BinAxis> {
                if raw.feature_types[id.0] == "categorical" {
                    Ok(BinAxis::Categorical(decode_levels(labels, raw.label_encoder.get(n))))
                } else {
                    let edges: Vec<f64> = labels
                        .iter()
                        .map(|v| {
                            v.as_f64().ok_or_else(|| {
                                CoachError::InvalidModel(format!(
                                    "Non-numeric bin edge in interaction '{}'",
                                    data.name
                                ))
                            })
                        })
                        .collect::<Result<_>>()?;
                    Ok(BinAxis::Continuous(drop_max_edge(&edges)))
                }
            };

            let scores: Vec<Vec<f64>> = serde_json::from_value(data.additive.clone())?;
            let term = InteractionTerm {
                first,
                second,
                first_axis: axis_for(first, &data.bin_label1, name1)?,
                second_axis: axis_for(second, &data.bin_label2, name2)?,
                scores,
            };
            features.push(Feature::interaction(data.name.clone(), term));
        }

        let kind = if raw.is_classifier {
            ModelKind::Classifier
        } else {
            ModelKind::Regressor
        };

        Self::new(features, raw.intercept, kind)
    }
}

/// Continuous edge lists end with the max value, which is not a bin start
fn drop_max_edge(edges: &[f64]) -> Vec<f64> {
    match edges.split_last() {
        Some((_, starts)) if !starts.is_empty() => starts.to_vec(),
        _ => edges.to_vec(),
    }
}

fn decode_levels(
    labels: &[serde_json::Value],
    encoder: Option<&HashMap<String, String>>,
) -> Vec<String> {
    labels
        .iter()
        .map(|v| {
            let key = match v {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            encoder
                .and_then(|e| e.get(&key))
                .cloned()
                .unwrap_or(key)
        })
        .collect()
}

impl AdditiveModel for Gam {
    fn features(&self) -> &[Feature] {
        &self.features
    }

    fn intercept(&self) -> f64 {
        self.intercept
    }

    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn explain_local(&self, row: &[FeatureValue]) -> LocalExplanation {
        let contributions = self
            .features
            .iter()
            .enumerate()
            .map(|(i, feature)| match feature.interaction_term() {
                None => row.get(i).map(|v| feature.score_of(v)).unwrap_or(0.0),
                Some(term) => match (row.get(term.first.0), row.get(term.second.0)) {
                    (Some(a), Some(b)) => term.score_for(a, b),
                    _ => 0.0,
                },
            })
            .collect();

        LocalExplanation {
            intercept: self.intercept,
            contributions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MODEL_JSON: &str = r#"{
        "featureNames": ["income", "home"],
        "featureTypes": ["continuous", "categorical"],
        "intercept": -0.5,
        "isClassifier": true,
        "labelEncoder": {"home": {"1": "RENT", "2": "OWN"}},
        "features": [
            {"name": "income", "type": "continuous", "additive": [-1.0, 0.0, 1.0],
             "binEdge": [0.0, 10.0, 20.0, 100.0]},
            {"name": "home", "type": "categorical", "additive": [-0.2, 0.3],
             "binLabel": [1, 2]},
            {"name": "income x home", "type": "interaction", "name1": "income", "name2": "home",
             "additive": [[0.1, -0.1], [0.0, 0.2]],
             "binLabel1": [0.0, 15.0, 100.0], "binLabel2": [1, 2]}
        ]
    }"#;

    #[test]
    fn test_parse_model() {
        let gam = Gam::from_json_str(MODEL_JSON).unwrap();
        assert_eq!(gam.features().len(), 3);
        assert_eq!(gam.kind(), ModelKind::Classifier);
        assert_eq!(gam.main_feature_count(), 2);

        let (axis, _) = gam.features()[0].main_effect().unwrap();
        assert_eq!(axis, &BinAxis::Continuous(vec![0.0, 10.0, 20.0]));

        let (axis, _) = gam.features()[1].main_effect().unwrap();
        assert_eq!(
            axis,
            &BinAxis::Categorical(vec!["RENT".to_string(), "OWN".to_string()])
        );

        let term = gam.features()[2].interaction_term().unwrap();
        assert_eq!(term.first, FeatureId(0));
        assert_eq!(term.second, FeatureId(1));
        assert_eq!(term.first_axis, BinAxis::Continuous(vec![0.0, 15.0]));
    }

    #[test]
    fn test_explain_and_predict() {
        let gam = Gam::from_json_str(MODEL_JSON).unwrap();
        let row = vec![FeatureValue::Number(12.0), FeatureValue::Level("OWN".into())];
        let explanation = gam.explain_local(&row);

        assert_eq!(explanation.contributions, vec![0.0, 0.3, -0.1]);
        assert!((gam.predict_score(&row) - (-0.3)).abs() < 1e-12);
        assert_eq!(gam.predict(&row), 0.0);

        let row = vec![FeatureValue::Number(50.0), FeatureValue::Level("OWN".into())];
        assert_eq!(gam.predict(&row), 1.0);
    }

    #[test]
    fn test_unknown_interaction_feature() {
        let json = MODEL_JSON.replace("\"name2\": \"home\"", "\"name2\": \"zip\"");
        let err = Gam::from_json_str(&json).unwrap_err();
        assert!(matches!(err, CoachError::InvalidModel(_)));
    }

    #[test]
    fn test_score_length_mismatch() {
        let features = vec![Feature::continuous("x", vec![0.0, 1.0], vec![0.5])];
        let err = Gam::new(features, 0.0, ModelKind::Regressor).unwrap_err();
        assert!(err.to_string().contains("2 bins but 1 scores"));
    }
}
