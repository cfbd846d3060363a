//! Comparative growth report produced for one analysis run.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::CoreError;

/// Sections every report must carry, as JSON objects.
const REQUIRED_SECTIONS: [&str; 4] = [
    "posting_analysis",
    "content_analysis",
    "topic_analysis",
    "structure_analysis",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    /// `current_state`, `peer_state`, `gap_impact`, `expected_result`,
    /// `measurement` and anything else the model adds.
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(deserialize_with = "crate::profile::lenient_f64")]
    pub growth_score: Option<f64>,
    #[serde(default)]
    pub growth_score_explanation: Option<String>,
    pub posting_analysis: Map<String, Value>,
    pub content_analysis: Map<String, Value>,
    pub topic_analysis: Map<String, Value>,
    pub structure_analysis: Map<String, Value>,
    pub insights: Vec<Insight>,
    #[serde(default)]
    pub quick_wins: Vec<String>,
    #[serde(default)]
    pub peer_standout_tactics: Vec<String>,
    #[serde(flatten)]
    pub extensions: Map<String, Value>,
}

impl Report {
    /// Validates a model response as a complete report.
    ///
    /// Structurally valid but incomplete responses are rejected rather than
    /// filled in with defaults.
    ///
    /// # Errors
    ///
    /// - [`CoreError::MissingReportSection`] if `growth_score`, `insights` or
    ///   an analysis section is absent or null.
    /// - [`CoreError::EmptyInsights`] if `insights` is an empty list.
    /// - [`CoreError::GrowthScoreOutOfRange`] if the score is outside 0..=10.
    /// - [`CoreError::Shape`] if a present field has the wrong type.
    pub fn from_value(value: Value) -> Result<Self, CoreError> {
        let Value::Object(ref object) = value else {
            return Err(CoreError::MissingReportSection("growth_score"));
        };
        for key in ["growth_score"]
            .into_iter()
            .chain(REQUIRED_SECTIONS)
            .chain(["insights"])
        {
            if object.get(key).is_none_or(Value::is_null) {
                return Err(CoreError::MissingReportSection(key));
            }
        }

        let report: Self = serde_json::from_value(value)?;
        let score = report
            .growth_score
            .ok_or(CoreError::MissingReportSection("growth_score"))?;
        if !(0.0..=10.0).contains(&score) {
            return Err(CoreError::GrowthScoreOutOfRange(score));
        }
        if report.insights.is_empty() {
            return Err(CoreError::EmptyInsights);
        }
        Ok(report)
    }

    /// The validated growth score.
    #[must_use]
    pub fn score(&self) -> f64 {
        self.growth_score.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn complete_report() -> Value {
        json!({
            "growth_score": 6.5,
            "growth_score_explanation": "trails peers",
            "posting_analysis": {"gap": "posts less"},
            "content_analysis": {"gap": "fewer visuals"},
            "topic_analysis": {"gap": "narrow"},
            "structure_analysis": {"gap": "no hooks"},
            "insights": [{
                "title": "Post more",
                "category": "posting_pattern",
                "priority": "critical",
                "current_state": "7/week",
                "peer_state": "18/week",
                "action": "post 15x per week"
            }],
            "quick_wins": ["add an image"],
            "benchmark_period": "30d"
        })
    }

    #[test]
    fn accepts_complete_report_and_keeps_extras() {
        let report = Report::from_value(complete_report()).unwrap();
        assert!((report.score() - 6.5).abs() < f64::EPSILON);
        assert_eq!(report.insights.len(), 1);
        assert_eq!(report.insights[0].priority.as_deref(), Some("critical"));
        assert_eq!(report.insights[0].details["peer_state"], json!("18/week"));
        assert_eq!(report.quick_wins, vec!["add an image".to_string()]);
        assert_eq!(report.extensions["benchmark_period"], json!("30d"));
    }

    #[test]
    fn rejects_each_missing_section() {
        for key in [
            "growth_score",
            "posting_analysis",
            "content_analysis",
            "topic_analysis",
            "structure_analysis",
            "insights",
        ] {
            let mut value = complete_report();
            value.as_object_mut().unwrap().remove(key);
            let result = Report::from_value(value);
            assert!(
                matches!(result, Err(CoreError::MissingReportSection(k)) if k == key),
                "{key}: {result:?}"
            );
        }
    }

    #[test]
    fn rejects_empty_insights() {
        let mut value = complete_report();
        value["insights"] = json!([]);
        assert!(matches!(
            Report::from_value(value),
            Err(CoreError::EmptyInsights)
        ));
    }

    #[test]
    fn rejects_out_of_range_score() {
        let mut value = complete_report();
        value["growth_score"] = json!(11);
        assert!(matches!(
            Report::from_value(value),
            Err(CoreError::GrowthScoreOutOfRange(_))
        ));
    }

    #[test]
    fn rejects_non_object_section() {
        let mut value = complete_report();
        value["topic_analysis"] = json!("narrow focus");
        assert!(matches!(Report::from_value(value), Err(CoreError::Shape(_))));
    }

    #[test]
    fn rejects_non_object_payload() {
        assert!(Report::from_value(json!([1, 2])).is_err());
    }
}
