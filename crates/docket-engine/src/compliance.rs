//! Quality gates evaluated between stages.
//!
//! Both gates are pure: same input, same result, no I/O, no failure path.
//! The orchestrator treats `passed == false` as fatal for the run.

use serde::Serialize;

use docket_core::outputs::{FlagStatus, IntentScore, LandingVariant};

/// Outcome of one gate evaluation. Never persisted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ComplianceCheckResult {
    pub passed: bool,
    pub warnings: Vec<String>,
    pub violations: Vec<String>,
    pub recommendations: Vec<String>,
}

impl ComplianceCheckResult {
    fn from_findings(
        warnings: Vec<String>,
        violations: Vec<String>,
        recommendations: Vec<String>,
    ) -> Self {
        Self {
            passed: violations.is_empty(),
            warnings,
            violations,
            recommendations,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gate {
    Intent,
    Landing,
}

impl Gate {
    pub fn name(self) -> &'static str {
        match self {
            Self::Intent => "Intent",
            Self::Landing => "Landing",
        }
    }
}

impl std::fmt::Display for Gate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

const URGENCY_MIN: f64 = 1.0;
const URGENCY_MAX: f64 = 10.0;
const CURRENCY_MARKERS: [&str; 4] = ["$", "€", "£", "USD"];

/// Gate after the intent scorer.
pub fn check_intent(score: &IntentScore) -> ComplianceCheckResult {
    let mut warnings = Vec::new();
    let mut violations = Vec::new();
    let mut recommendations = Vec::new();

    // NaN fails the range check as well.
    if !(URGENCY_MIN..=URGENCY_MAX).contains(&score.urgency_score) {
        violations.push(format!(
            "Urgency score out of bounds: {} (must be between {} and {})",
            score.urgency_score, URGENCY_MIN, URGENCY_MAX
        ));
    }

    if !CURRENCY_MARKERS
        .iter()
        .any(|marker| score.estimated_case_value.contains(marker))
    {
        warnings.push("Case value should include dollar sign".to_string());
        recommendations.push("Express case value as a currency range, e.g. \"$50,000-$150,000\"".to_string());
    }

    if score.jurisdiction.trim().is_empty() {
        violations.push("Jurisdiction is required".to_string());
    }

    ComplianceCheckResult::from_findings(warnings, violations, recommendations)
}

/// Flags checked for FAIL, with the violation each one raises.
pub const LANDING_FLAG_RULES: [(&str, &str); 5] = [
    ("noGuarantees", "Landing page contains guarantees"),
    ("disclaimersPresent", "Required disclaimers missing"),
    ("noMisleadingClaims", "Contains misleading claims"),
    ("attorneyAdvertising", "Missing attorney advertising disclosure"),
    ("tcpaCompliant", "TCPA compliance issue"),
];

/// Gate after the landing generator.
///
/// FAIL on one of the five known flags is a violation. REVIEW on any flag,
/// known or not, is only a warning. FAIL on an unknown flag is ignored.
///
/// Warnings list the known flags in rule order, then unknown flags sorted by
/// name; the backend's own key order is not kept.
pub fn check_landing(variant: &LandingVariant) -> ComplianceCheckResult {
    let checks = &variant.compliance_check;
    let mut warnings = Vec::new();
    let mut recommendations = Vec::new();

    let violations: Vec<String> = LANDING_FLAG_RULES
        .iter()
        .filter(|(flag, _)| checks.get(*flag) == Some(&FlagStatus::Fail))
        .map(|(_, message)| message.to_string())
        .collect();

    let known = LANDING_FLAG_RULES.iter().map(|(flag, _)| *flag);
    let unknown = checks
        .keys()
        .map(String::as_str)
        .filter(|key| !LANDING_FLAG_RULES.iter().any(|(flag, _)| flag == key));
    for key in known.chain(unknown) {
        if checks.get(key) == Some(&FlagStatus::Review) {
            warnings.push(format!("{key} needs manual review"));
            recommendations.push(format!("Have counsel sign off on {key} before publishing"));
        }
    }

    ComplianceCheckResult::from_findings(warnings, violations, recommendations)
}
