//! Structured outputs of the six pipeline stages.
//!
//! Field names serialize in camelCase to match the wire contract consumed by
//! dashboards and other clients.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentType {
    HighCommercial,
    Informational,
    Navigational,
    Comparison,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompetitorDensity {
    Low,
    Medium,
    High,
}

/// Stage 1: search-intent analysis of a keyword.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentScore {
    pub keyword: String,
    pub intent_type: IntentType,
    /// Expected in 1..=10; enforced by the intent gate rather than the parser.
    pub urgency_score: f64,
    pub estimated_case_value: String,
    pub practice_area: String,
    pub jurisdiction: String,
    pub recommended_angle: String,
    pub competitor_density: CompetitorDensity,
}

/// Value of a single landing-page compliance flag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FlagStatus {
    Pass,
    Fail,
    Review,
}

/// Stage 2: one landing-page copy variant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandingVariant {
    pub id: String,
    pub headline: String,
    pub subheadline: String,
    pub body_points: Vec<String>,
    pub cta: String,
    pub compliance_check: BTreeMap<String, FlagStatus>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadTier {
    HighValue,
    MediumValue,
    LowValue,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadUrgency {
    Immediate,
    ThisWeek,
    Exploring,
}

/// Stage 3: lead qualification framework.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualifiedLead {
    pub id: String,
    /// 0..=100
    pub score: f64,
    pub tier: LeadTier,
    pub estimated_case_value: String,
    pub pre_qual_questions: Vec<String>,
    pub urgency: LeadUrgency,
    pub recommended_action: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectionHandler {
    pub objection: String,
    pub response: String,
}

/// Stage 4: intake conversion script.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionScript {
    pub opening: String,
    pub pain_points: Vec<String>,
    pub value_proposition: String,
    pub objection_handlers: Vec<ObjectionHandler>,
    pub closing_cta: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpMessage {
    pub day: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub body: String,
    pub cta: String,
}

/// Stage 5: nurture sequence for one channel.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowUpSequence {
    pub channel: Channel,
    pub messages: Vec<FollowUpMessage>,
}

/// Stage 6: revenue analytics. Also the run-level aggregate `stats`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueReport {
    pub period: String,
    pub total_leads: u64,
    pub qualified_leads: u64,
    pub conversion_rate: f64,
    pub cost_per_lead: f64,
    pub cost_per_case: f64,
    pub roi_multiple: f64,
    pub recommendations: Vec<String>,
}

impl RevenueReport {
    /// Zero-valued report held by a run until the analyzer stage completes.
    pub fn empty() -> Self {
        Self {
            period: "Current pipeline".into(),
            total_leads: 0,
            qualified_leads: 0,
            conversion_rate: 0.0,
            cost_per_lead: 0.0,
            cost_per_case: 0.0,
            roi_multiple: 0.0,
            recommendations: Vec::new(),
        }
    }
}

impl Default for RevenueReport {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn intent_score_reads_camel_case() {
        let score: IntentScore = serde_json::from_value(json!({
            "keyword": "truck accident lawyer dallas",
            "intentType": "high_commercial",
            "urgencyScore": 8,
            "estimatedCaseValue": "$100,000-$500,000",
            "practiceArea": "Truck Accident",
            "jurisdiction": "Texas",
            "recommendedAngle": "Fast response after a crash",
            "competitorDensity": "high"
        }))
        .unwrap();
        assert_eq!(score.intent_type, IntentType::HighCommercial);
        assert_eq!(score.urgency_score, 8.0);
        assert_eq!(score.competitor_density, CompetitorDensity::High);
    }

    #[test]
    fn unknown_intent_type_rejected() {
        let result: Result<IntentScore, _> = serde_json::from_value(json!({
            "keyword": "k",
            "intentType": "transactional",
            "urgencyScore": 5,
            "estimatedCaseValue": "$1",
            "practiceArea": "p",
            "jurisdiction": "j",
            "recommendedAngle": "a",
            "competitorDensity": "low"
        }));
        assert!(result.is_err());
    }

    #[test]
    fn landing_flags_accept_unrecognized_names() {
        let variant: LandingVariant = serde_json::from_value(json!({
            "id": "v1",
            "headline": "h",
            "subheadline": "s",
            "bodyPoints": ["a", "b"],
            "cta": "c",
            "complianceCheck": {
                "noGuarantees": "PASS",
                "stateBarRule": "REVIEW"
            }
        }))
        .unwrap();
        assert_eq!(variant.compliance_check["stateBarRule"], FlagStatus::Review);
    }

    #[test]
    fn sms_message_omits_subject() {
        let msg = FollowUpMessage {
            day: 1,
            subject: None,
            body: "Reply YES to schedule a call.".into(),
            cta: "Reply YES".into(),
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert!(value.get("subject").is_none());
    }

    #[test]
    fn empty_report_is_zero_valued() {
        let report = RevenueReport::empty();
        assert_eq!(report.total_leads, 0);
        assert_eq!(report.roi_multiple, 0.0);
        assert!(report.recommendations.is_empty());
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["costPerCase"], 0.0);
    }
}
