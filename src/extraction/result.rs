//! Structured extraction payload and its shape validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// One of the five insight fields a value framework is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightField {
    CurrentChallenges,
    Impact,
    IdealFutureState,
    EverydayMetrics,
    CoreRequirements,
}

impl InsightField {
    pub const ALL: [InsightField; 5] = [
        InsightField::CurrentChallenges,
        InsightField::Impact,
        InsightField::IdealFutureState,
        InsightField::EverydayMetrics,
        InsightField::CoreRequirements,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            InsightField::CurrentChallenges => "current_challenges",
            InsightField::Impact => "impact",
            InsightField::IdealFutureState => "ideal_future_state",
            InsightField::EverydayMetrics => "everyday_metrics",
            InsightField::CoreRequirements => "core_requirements",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

/// An extraction payload that failed shape or range checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid extraction result: {0}")]
pub struct InvariantViolation(pub String);

/// Validated output of one extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub current_challenges: String,
    pub impact: String,
    pub ideal_future_state: String,
    pub everyday_metrics: String,
    pub core_requirements: String,
    pub confidence_score: f64,
    pub evidence: BTreeMap<InsightField, Vec<String>>,
}

impl ExtractionResult {
    pub fn field(&self, field: InsightField) -> &str {
        match field {
            InsightField::CurrentChallenges => &self.current_challenges,
            InsightField::Impact => &self.impact,
            InsightField::IdealFutureState => &self.ideal_future_state,
            InsightField::EverydayMetrics => &self.everyday_metrics,
            InsightField::CoreRequirements => &self.core_requirements,
        }
    }

    /// Validates an adapter payload. Nothing is coerced: a missing field, a
    /// non-string value, an out-of-range score or an evidence map whose key
    /// set differs from the five fields is rejected.
    pub fn from_value(value: &Value) -> Result<Self, InvariantViolation> {
        let object = value
            .as_object()
            .ok_or_else(|| InvariantViolation("payload is not a JSON object".to_string()))?;

        let mut texts = BTreeMap::new();
        for field in InsightField::ALL {
            let text = match object.get(field.as_str()) {
                Some(Value::String(s)) => s.clone(),
                Some(other) => {
                    return Err(InvariantViolation(format!(
                        "field '{}' must be a string, got {}",
                        field.as_str(),
                        json_type_name(other)
                    )))
                }
                None => {
                    return Err(InvariantViolation(format!(
                        "missing field '{}'",
                        field.as_str()
                    )))
                }
            };
            texts.insert(field, text);
        }

        let confidence_score = object
            .get("confidence_score")
            .and_then(Value::as_f64)
            .ok_or_else(|| {
                InvariantViolation("confidence_score is missing or not a number".to_string())
            })?;
        if !confidence_score.is_finite() || !(0.0..=1.0).contains(&confidence_score) {
            return Err(InvariantViolation(format!(
                "confidence_score {} is outside [0, 1]",
                confidence_score
            )));
        }

        let evidence = Self::parse_evidence(object.get("evidence"))?;

        let mut take = |field: InsightField| texts.remove(&field).unwrap_or_default();
        Ok(ExtractionResult {
            current_challenges: take(InsightField::CurrentChallenges),
            impact: take(InsightField::Impact),
            ideal_future_state: take(InsightField::IdealFutureState),
            everyday_metrics: take(InsightField::EverydayMetrics),
            core_requirements: take(InsightField::CoreRequirements),
            confidence_score,
            evidence,
        })
    }

    fn parse_evidence(
        value: Option<&Value>,
    ) -> Result<BTreeMap<InsightField, Vec<String>>, InvariantViolation> {
        let object = value
            .and_then(Value::as_object)
            .ok_or_else(|| InvariantViolation("evidence is missing or not an object".to_string()))?;

        let mut evidence = BTreeMap::new();
        for (key, quotes) in object {
            let field = InsightField::from_str(key).ok_or_else(|| {
                InvariantViolation(format!("evidence has unknown field '{}'", key))
            })?;
            let quotes = quotes
                .as_array()
                .ok_or_else(|| {
                    InvariantViolation(format!("evidence for '{}' is not a list", key))
                })?
                .iter()
                .map(|q| {
                    q.as_str().map(str::to_string).ok_or_else(|| {
                        InvariantViolation(format!("evidence for '{}' contains a non-string", key))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            evidence.insert(field, quotes);
        }

        if let Some(missing) = InsightField::ALL
            .iter()
            .find(|f| !evidence.contains_key(*f))
        {
            return Err(InvariantViolation(format!(
                "evidence is missing field '{}'",
                missing.as_str()
            )));
        }
        Ok(evidence)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
