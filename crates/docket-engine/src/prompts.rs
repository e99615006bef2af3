//! Prompt templates, one per agent. Each is a pure function of upstream outputs.

use serde::Serialize;

use docket_core::input::PipelineInput;
use docket_core::outputs::{ConversionScript, IntentScore, LandingVariant, QualifiedLead};

/// Entries beyond this are left out of the analyzer prompt.
pub const HISTORY_PROMPT_LIMIT: usize = 10;

/// One analyzed lead, the revenue analyzer's unit of input.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub intent_score: IntentScore,
    pub qualified_lead: QualifiedLead,
    pub timestamp: String,
}

fn pretty<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

pub fn intent_scorer(input: &PipelineInput) -> String {
    format!(
        r#"You are a legal marketing analyst specializing in search intent and case valuation.

Analyze this keyword for a law firm:
- Keyword: "{keyword}"
- Jurisdiction: {jurisdiction}
- Practice Area: {practice_area}

Your task:
1. Classify the search intent (high_commercial, informational, navigational, or comparison)
2. Score urgency from 1-10 (10 = immediate legal need, 1 = researching)
3. Estimate the typical case value range for this keyword in this jurisdiction
4. Identify the specific legal practice area
5. Recommend the best marketing angle
6. Assess competitor density in search results

Consider state bar advertising rules, local damage caps, statutes of limitations,
common settlement ranges and regional competition.

Return a JSON object with these exact fields:
{{
  "keyword": string,
  "intentType": "high_commercial" | "informational" | "navigational" | "comparison",
  "urgencyScore": number (1-10),
  "estimatedCaseValue": string (e.g., "$50,000-$150,000"),
  "practiceArea": string,
  "jurisdiction": string,
  "recommendedAngle": string,
  "competitorDensity": "low" | "medium" | "high"
}}"#,
        keyword = input.keyword,
        jurisdiction = input.jurisdiction,
        practice_area = input.practice_area,
    )
}

pub fn landing_generator(intent: &IntentScore) -> String {
    format!(
        r#"You are a legal marketing copywriter specializing in compliant, high-converting landing pages.

Based on this intent analysis:
{analysis}

Create a landing page variant that:
1. Addresses the urgency level ({urgency}/10)
2. Speaks to {case_value} case value expectations
3. Uses "{angle}" as the primary angle
4. Complies with {jurisdiction} bar advertising rules

Requirements:
- NO guarantees of specific outcomes or dollar amounts
- NO comparison to other lawyers without factual basis
- Include required disclaimers (attorney advertising, past results)
- Avoid "best", "expert" or "specialist" unless certified
- Respect TCPA for any phone CTAs

Return a JSON object:
{{
  "id": string (uuid),
  "headline": string (max 10 words),
  "subheadline": string (max 20 words),
  "bodyPoints": string[] (3-5 points),
  "cta": string,
  "complianceCheck": {{
    "noGuarantees": "PASS" | "FAIL" | "REVIEW",
    "disclaimersPresent": "PASS" | "FAIL" | "REVIEW",
    "noMisleadingClaims": "PASS" | "FAIL" | "REVIEW",
    "attorneyAdvertising": "PASS" | "FAIL" | "REVIEW",
    "tcpaCompliant": "PASS" | "FAIL" | "REVIEW"
  }}
}}"#,
        analysis = pretty(intent),
        urgency = intent.urgency_score,
        case_value = intent.estimated_case_value,
        angle = intent.recommended_angle,
        jurisdiction = intent.jurisdiction,
    )
}

pub fn lead_qualifier(intent: &IntentScore, landing: &LandingVariant) -> String {
    format!(
        r#"You are a legal intake specialist with expertise in lead qualification and case valuation.

Context:
- Original search: {keyword}
- Practice area: {practice_area}
- Case value range: {case_value}
- Landing page CTA: {cta}
- Urgency level: {urgency}/10

Design a lead qualification framework that scores leads 0-100, segments them into
tiers (high_value, medium_value, low_value) and asks pre-qualification questions
covering statute of limitations, injury severity, liability, insurance coverage and
prior attorney consultation. Consider {jurisdiction} damage caps, comparative
negligence and limitation periods.

Return a JSON object:
{{
  "id": string (uuid),
  "score": number (0-100),
  "tier": "high_value" | "medium_value" | "low_value",
  "estimatedCaseValue": string,
  "preQualQuestions": string[] (5-7 yes/no questions),
  "urgency": "immediate" | "this_week" | "exploring",
  "recommendedAction": string
}}"#,
        keyword = intent.keyword,
        practice_area = intent.practice_area,
        case_value = intent.estimated_case_value,
        cta = landing.cta,
        urgency = intent.urgency_score,
        jurisdiction = intent.jurisdiction,
    )
}

pub fn conversion_script(intent: &IntentScore, lead: &QualifiedLead) -> String {
    format!(
        r#"You are a legal intake conversion specialist creating scripts for law firm intake teams.

Lead context:
- Practice area: {practice_area}
- Lead tier: {tier}
- Urgency: {urgency}
- Case value: {case_value}
- Jurisdiction: {jurisdiction}

Write a script that builds trust immediately, addresses common concerns for
{practice_area} cases, highlights the firm's record without guarantees and handles
objections about cost, time and uncertainty. No pressure tactics. Intake staff are
not attorneys and must not give legal advice. Be clear about contingency fees.

Return a JSON object:
{{
  "opening": string (max 30 words),
  "painPoints": string[] (3-4 points),
  "valueProposition": string (max 50 words),
  "objectionHandlers": [{{ "objection": string, "response": string }}] (at least 5),
  "closingCta": string (max 25 words)
}}"#,
        practice_area = intent.practice_area,
        tier = enum_name(&lead.tier),
        urgency = enum_name(&lead.urgency),
        case_value = lead.estimated_case_value,
        jurisdiction = intent.jurisdiction,
    )
}

pub fn follow_up_sequence(
    intent: &IntentScore,
    lead: &QualifiedLead,
    script: &ConversionScript,
) -> String {
    format!(
        r#"You are a legal marketing automation specialist designing follow-up sequences.

Context:
- Practice area: {practice_area}
- Lead urgency: {urgency}
- Initial CTA: {closing_cta}
- Jurisdiction: {jurisdiction}

Design a 7-day follow-up sequence that nurtures leads who did not convert, educates,
addresses statute of limitations urgency appropriately and complies with CAN-SPAM
and TCPA. Include unsubscribe options, identify as attorney advertising and never
text without prior express written consent.

Return a JSON object:
{{
  "channel": "email" | "sms",
  "messages": [
    {{
      "day": number (0-7),
      "subject": string (email only, max 50 chars),
      "body": string (email: max 150 words, SMS: max 160 chars),
      "cta": string (max 6 words)
    }}
  ]
}}

For SMS include at most 3 messages (days 1, 3, 7). For email include 5 messages (days 0, 1, 3, 5, 7)."#,
        practice_area = intent.practice_area,
        urgency = enum_name(&lead.urgency),
        closing_cta = script.closing_cta,
        jurisdiction = intent.jurisdiction,
    )
}

pub fn revenue_analyzer(history: &[HistoryEntry]) -> String {
    let window = &history[..history.len().min(HISTORY_PROMPT_LIMIT)];
    format!(
        r#"You are a legal marketing analytics expert specializing in ROI optimization.

Analyze this pipeline performance data:
{data}

Report lead quality by practice area, conversion by urgency tier, cost per lead and
per signed case, and the ROI multiple based on estimated case values. Assume
contingency fees of 33-40%.

Return a JSON object:
{{
  "period": string (e.g., "Last 30 days"),
  "totalLeads": number,
  "qualifiedLeads": number,
  "conversionRate": number,
  "costPerLead": number,
  "costPerCase": number,
  "roiMultiple": number,
  "recommendations": string[] (3-5 actionable items)
}}"#,
        data = pretty(window),
    )
}

/// Wire name of a unit enum, e.g. `high_value`.
fn enum_name<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        _ => String::new(),
    }
}
