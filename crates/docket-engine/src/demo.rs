//! Non-generative fallback used when no backend credential is configured.
//!
//! Produces structurally valid runs from canned outputs. Never calls the
//! backend and never evaluates the compliance gates.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use docket_core::ids::{LeadId, RunId, VariantId};
use docket_core::input::PipelineInput;
use docket_core::outputs::RevenueReport;
use docket_core::run::{Agent, PipelineRun, RunStatus, Stage, StageStatus, DEFAULT_FIRM_ID};

pub const DEMO_RUN_ID: &str = "demo-run-001";

/// Gap between synthetic stage timestamps.
const STAGE_SPACING_SECS: i64 = 30;
/// 2024-06-03T15:00:00Z
const SNAPSHOT_STARTED_AT: i64 = 1_717_426_800;
const TOKEN_USAGE: [u32; 7] = [245, 412, 189, 356, 298, 174, 203];

/// Fill `run` with the canned sequence after a short fixed delay.
pub async fn run_demo(run: &mut PipelineRun, input: &PipelineInput, delay: Duration) {
    tokio::time::sleep(delay).await;

    let finished = Utc::now();
    let start = finished - chrono::Duration::seconds(STAGE_SPACING_SECS * Agent::SEQUENCE.len() as i64);
    let report = demo_report();
    // Synthetic stages span the run, so the run is back-dated to the first one.
    run.started_at = start;
    run.stages = canned_stages(
        input,
        start,
        VariantId::new().to_string(),
        LeadId::new().to_string(),
        &report,
    );
    run.complete(report);
}

/// Deterministic canned run for display and testing. Side-effect free.
pub fn demo_snapshot() -> PipelineRun {
    let started_at = DateTime::from_timestamp(SNAPSHOT_STARTED_AT, 0).unwrap_or_default();
    let input = PipelineInput::new("car accident lawyer", "California", "Car Accident");
    let report = snapshot_report();

    let mut run = PipelineRun::with_id(
        RunId::from_raw(DEMO_RUN_ID),
        Some(DEFAULT_FIRM_ID),
        started_at,
    );
    run.stages = canned_stages(&input, started_at, "variant-a".into(), "lead-001".into(), &report);
    run.status = RunStatus::Completed;
    run.completed_at = run.stages.last().and_then(|s| s.completed_at);
    run.stats = report;
    run
}

fn demo_report() -> RevenueReport {
    RevenueReport {
        period: "Demo pipeline".into(),
        total_leads: 150,
        qualified_leads: 95,
        conversion_rate: 0.16,
        cost_per_lead: 85.0,
        cost_per_case: 450.0,
        roi_multiple: 10.5,
        recommendations: vec![
            "Shift budget toward high-urgency keywords".into(),
            "Follow up with high-value leads by SMS within 24 hours".into(),
        ],
    }
}

fn snapshot_report() -> RevenueReport {
    RevenueReport {
        period: "Last 30 days".into(),
        total_leads: 247,
        qualified_leads: 164,
        conversion_rate: 0.18,
        cost_per_lead: 85.5,
        cost_per_case: 475.0,
        roi_multiple: 12.4,
        recommendations: vec![
            "Variant A outperformed Variant B by 23%".into(),
            "High-value leads respond best to SMS follow-ups".into(),
            "Peak conversion times: Tue-Thu 2-4 PM".into(),
        ],
    }
}

fn canned_stages(
    input: &PipelineInput,
    start: DateTime<Utc>,
    variant_id: String,
    lead_id: String,
    report: &RevenueReport,
) -> Vec<Stage> {
    let intent = json!({
        "keyword": input.keyword,
        "intentType": "high_commercial",
        "urgencyScore": 8,
        "estimatedCaseValue": "$75,000-$250,000",
        "practiceArea": input.practice_area,
        "jurisdiction": input.jurisdiction,
        "recommendedAngle": "Immediate legal help when it matters most",
        "competitorDensity": "high"
    });
    let landing = json!({
        "id": variant_id,
        "headline": "Injured? Get Your Free Case Review Today",
        "subheadline": "No Fees Unless We Win Your Case - Speak to an Attorney Now",
        "bodyPoints": [
            "Available 24/7 for free consultations",
            "No upfront costs - we only get paid if you win",
            "Experienced trial attorneys on your side",
            "Attorney advertising. Prior results do not guarantee a similar outcome."
        ],
        "cta": "Get Your Free Case Review",
        "complianceCheck": {
            "noGuarantees": "PASS",
            "disclaimersPresent": "PASS",
            "noMisleadingClaims": "PASS",
            "attorneyAdvertising": "PASS",
            "tcpaCompliant": "PASS"
        }
    });
    let lead = json!({
        "id": lead_id,
        "score": 85,
        "tier": "high_value",
        "estimatedCaseValue": "$150,000-$250,000",
        "preQualQuestions": [
            "Were you injured in the incident?",
            "Did you seek medical treatment?",
            "Did the incident happen less than 2 years ago?",
            "Was another party at fault?",
            "Have you spoken with another attorney about this matter?"
        ],
        "urgency": "immediate",
        "recommendedAction": "Schedule immediate consultation"
    });
    let script = json!({
        "opening": "Thank you for reaching out. I'm sorry you're dealing with this, and I'm here to help you understand your options.",
        "painPoints": [
            "Dealing with insurance companies",
            "Medical bills piling up",
            "Lost wages from missing work",
            "Uncertainty about what the claim is worth"
        ],
        "valueProposition": "We handle the paperwork and negotiations so you can focus on recovery, and you pay nothing unless we recover compensation for you.",
        "objectionHandlers": [
            {"objection": "I can't afford a lawyer", "response": "We work on contingency, so there are no fees unless we win. The consultation is free."},
            {"objection": "I need to think about it", "response": "Of course. Keep in mind that evidence and witness memories fade, and deadlines apply to every claim."},
            {"objection": "The insurance company already made an offer", "response": "An attorney can review the offer with you before you sign anything. Early offers are often low."},
            {"objection": "I'm not sure I have a case", "response": "That's exactly what the free review is for. An attorney will look at the facts and tell you honestly."},
            {"objection": "This will take too long", "response": "Every case is different. We'll explain the usual timeline and keep you updated at each step."}
        ],
        "closingCta": "Can we schedule a free consultation this week to review your case?"
    });
    let email = json!({
        "channel": "email",
        "messages": [
            {"day": 0, "subject": "Your Case - Next Steps", "body": "Thanks for contacting us. Here's what happens next and what to gather before your consultation.", "cta": "Schedule Free Consultation"},
            {"day": 1, "subject": "What to Do After an Injury", "body": "A short checklist for protecting your claim in the first days after an injury.", "cta": "Read the Checklist"},
            {"day": 3, "subject": "Deadlines Apply to Your Claim", "body": "Statutes of limitations limit how long you have to file. Here's how they work.", "cta": "Protect Your Rights"},
            {"day": 5, "subject": "How Contingency Fees Work", "body": "You pay nothing up front. Here's exactly how our fee works. Reply STOP to unsubscribe.", "cta": "Ask Us Anything"},
            {"day": 7, "subject": "We're Here When You're Ready", "body": "If you still have questions about your case, we're happy to talk. Attorney advertising.", "cta": "Book a Call"}
        ]
    });
    let sms = json!({
        "channel": "sms",
        "messages": [
            {"day": 1, "body": "Hi, it's the intake team. Any questions about your case? Reply YES to schedule a call. Reply STOP to opt out.", "cta": "Reply YES"},
            {"day": 3, "body": "Reminder: filing deadlines apply to injury claims. Want a free review? Reply YES. STOP to opt out.", "cta": "Reply YES"},
            {"day": 7, "body": "Still thinking it over? Our free case review takes 15 minutes. Reply YES to book. STOP to opt out.", "cta": "Book Now"}
        ]
    });
    let revenue = json!(report);
    let history = json!({
        "history": [{"intentScore": intent, "qualifiedLead": lead, "timestamp": start.to_rfc3339()}]
    });

    let steps: [(Agent, Value, Value); 7] = [
        (Agent::IntentScorer, json!(input), intent.clone()),
        (Agent::LandingGenerator, json!({"intentScore": intent}), landing.clone()),
        (
            Agent::LeadQualifier,
            json!({"intentScore": intent, "landingVariant": landing}),
            lead.clone(),
        ),
        (
            Agent::ConversionScript,
            json!({"intentScore": intent, "qualifiedLead": lead}),
            script.clone(),
        ),
        (
            Agent::FollowUpEmail,
            json!({"intentScore": intent, "qualifiedLead": lead, "conversionScript": script}),
            email,
        ),
        (
            Agent::FollowUpSms,
            json!({"intentScore": intent, "qualifiedLead": lead, "conversionScript": script}),
            sms,
        ),
        (Agent::RevenueAnalyzer, history, revenue),
    ];

    steps
        .into_iter()
        .zip(TOKEN_USAGE)
        .enumerate()
        .map(|(i, ((agent, input, output), tokens))| {
            let offset = STAGE_SPACING_SECS * i as i64;
            Stage {
                agent,
                status: StageStatus::Completed,
                input,
                output: Some(output),
                started_at: Some(start + chrono::Duration::seconds(offset)),
                completed_at: Some(start + chrono::Duration::seconds(offset + STAGE_SPACING_SECS)),
                token_usage: Some(tokens),
                attempts: None,
                latency_ms: None,
                error: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_core::outputs::{
        Channel, ConversionScript, FollowUpSequence, IntentScore, LandingVariant, QualifiedLead,
    };

    fn output<T: serde::de::DeserializeOwned>(run: &PipelineRun, agent: Agent) -> T {
        let stage = run.stage(agent).unwrap();
        serde_json::from_value(stage.output.clone().unwrap()).unwrap()
    }

    #[test]
    fn snapshot_is_deterministic() {
        let a = serde_json::to_value(demo_snapshot()).unwrap();
        let b = serde_json::to_value(demo_snapshot()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a["id"], DEMO_RUN_ID);
        assert_eq!(a["firmId"], "demo-firm");
        assert_eq!(a["status"], "completed");
        assert_eq!(a["stats"]["totalLeads"], 247);
        assert_eq!(a["stats"]["roiMultiple"], 12.4);
    }

    #[test]
    fn snapshot_has_every_stage_in_order() {
        let run = demo_snapshot();
        let agents: Vec<Agent> = run.stages.iter().map(|s| s.agent).collect();
        assert_eq!(agents, Agent::SEQUENCE.to_vec());
        assert!(run.stages.iter().all(|s| s.status == StageStatus::Completed));

        for pair in run.stages.windows(2) {
            assert_eq!(pair[0].completed_at, pair[1].started_at);
        }
        assert_eq!(run.completed_at, run.stages[6].completed_at);
        assert_eq!(
            run.completed_at.unwrap() - run.started_at,
            chrono::Duration::seconds(210)
        );
    }

    #[test]
    fn canned_outputs_match_schemas() {
        let run = demo_snapshot();
        let intent: IntentScore = output(&run, Agent::IntentScorer);
        assert_eq!(intent.keyword, "car accident lawyer");
        let landing: LandingVariant = output(&run, Agent::LandingGenerator);
        assert_eq!(landing.compliance_check.len(), 5);
        let _: QualifiedLead = output(&run, Agent::LeadQualifier);
        let script: ConversionScript = output(&run, Agent::ConversionScript);
        assert!(script.objection_handlers.len() >= 5);
        let email: FollowUpSequence = output(&run, Agent::FollowUpEmail);
        assert_eq!(email.channel, Channel::Email);
        assert_eq!(email.messages.len(), 5);
        let sms: FollowUpSequence = output(&run, Agent::FollowUpSms);
        assert_eq!(sms.channel, Channel::Sms);
        assert!(sms.messages.iter().all(|m| m.subject.is_none()));
        let report: RevenueReport = output(&run, Agent::RevenueAnalyzer);
        assert_eq!(report, run.stats);
    }

    #[test]
    fn canned_outputs_pass_gates() {
        let run = demo_snapshot();
        let intent: IntentScore = output(&run, Agent::IntentScorer);
        let landing: LandingVariant = output(&run, Agent::LandingGenerator);
        assert!(crate::compliance::check_intent(&intent).passed);
        assert!(crate::compliance::check_landing(&landing).passed);
    }

    #[tokio::test(start_paused = true)]
    async fn demo_run_waits_then_completes() {
        let input = PipelineInput::new("estate planning attorney", "Oregon", "Estate Planning");
        let mut run = PipelineRun::new(Some("firm-9"));
        let started = tokio::time::Instant::now();

        run_demo(&mut run, &input, Duration::from_millis(500)).await;

        assert!(started.elapsed() >= Duration::from_millis(500));
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.firm_id, "firm-9");
        assert_eq!(run.stages.len(), 7);
        assert_eq!(run.stats.period, "Demo pipeline");
        let intent: IntentScore = output(&run, Agent::IntentScorer);
        assert_eq!(intent.practice_area, "Estate Planning");
        assert_eq!(intent.jurisdiction, "Oregon");
    }

    #[tokio::test]
    async fn demo_run_times_enclose_stage_times() {
        let input = PipelineInput::new("dui attorney", "Nevada", "DUI/DWI");
        let mut run = PipelineRun::new(None);

        run_demo(&mut run, &input, Duration::from_millis(1)).await;

        let first = &run.stages[0];
        let last = &run.stages[6];
        assert!(first.started_at.unwrap() >= run.started_at);
        assert!(run.completed_at.unwrap() >= last.completed_at.unwrap());
        assert!(run.completed_at.unwrap() - run.started_at >= chrono::Duration::seconds(210));
    }
}
