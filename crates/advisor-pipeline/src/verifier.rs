use advisor_ai::LlmProvider;
use advisor_core::{
    CandidateCourse, InvalidReason, StudentContext, VerificationOutcome, VerifiedCandidate,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

const PREREQUISITE_PROMPT: &str = r#"You are checking course prerequisites for a student.

The student has completed these courses:
{completed}

For each course below, decide whether the student satisfies its prerequisites based on the listed prerequisite text.

{courses}

Reply with exactly one line per course, in this format:
CODE: PREREQUISITE_MET
or
CODE: PREREQUISITE_MISSING: <what is missing>

Do not include any other text."#;

/// Checks candidates against the hard eligibility rules and, for survivors,
/// the soft prerequisite rule.
///
/// Hard rules run per candidate in a fixed order (cheapest first) and
/// short-circuit on the first failure: completion, seats, schedule conflict.
/// The prerequisite rule is a single batched reasoning call that fails open.
pub struct ConstraintVerifier {
    provider: Arc<dyn LlmProvider>,
    timeout: Duration,
}

impl ConstraintVerifier {
    pub fn new(provider: Arc<dyn LlmProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    #[instrument(skip(self, context, candidates), fields(candidates = candidates.len()))]
    pub async fn verify(
        &self,
        context: &StudentContext,
        candidates: Vec<CandidateCourse>,
    ) -> Vec<VerifiedCandidate> {
        let mut verified = apply_hard_rules(context, candidates);
        self.apply_prerequisite_rule(context, &mut verified).await;

        let valid = verified.iter().filter(|v| v.outcome.is_valid()).count();
        debug!(valid, total = verified.len(), "verification complete");
        verified
    }

    /// Batched soft rule over the candidates that passed the hard rules.
    /// A call or parse failure leaves every affected course at its prior
    /// outcome.
    async fn apply_prerequisite_rule(
        &self,
        context: &StudentContext,
        verified: &mut [VerifiedCandidate],
    ) {
        let survivors: Vec<&VerifiedCandidate> = verified
            .iter()
            .filter(|v| v.outcome.is_valid() && !v.course.prerequisites.trim().is_empty())
            .collect();

        if survivors.is_empty() {
            return;
        }

        let mut completed: Vec<&str> = context
            .completed_course_codes
            .iter()
            .map(String::as_str)
            .collect();
        completed.sort();
        let completed = if completed.is_empty() {
            "(none)".to_string()
        } else {
            completed
                .iter()
                .map(|c| format!("- {c}"))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let courses = survivors
            .iter()
            .map(|v| format!("{}: {}", v.course.course_code, v.course.prerequisites.trim()))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = PREREQUISITE_PROMPT
            .replace("{completed}", &completed)
            .replace("{courses}", &courses);

        let reply = match tokio::time::timeout(self.timeout, self.provider.generate(&prompt)).await
        {
            Ok(Ok(response)) => response.content,
            Ok(Err(e)) => {
                warn!("prerequisite check failed: {e} - leaving candidates as-is");
                return;
            }
            Err(_) => {
                warn!("prerequisite check timed out - leaving candidates as-is");
                return;
            }
        };

        let missing = parse_prerequisite_reply(&reply);
        for candidate in verified.iter_mut() {
            if !candidate.outcome.is_valid() {
                continue;
            }
            if let Some(detail) = missing.get(candidate.course.course_code.as_str()) {
                candidate.outcome = VerificationOutcome::Invalid(InvalidReason::PrerequisiteMissing {
                    detail: detail.clone(),
                });
            }
        }
    }
}

/// Hard rule evaluation, short-circuiting per candidate in fixed order.
///
/// The schedule check keeps a running map of the schedules of courses already
/// marked valid in this same pass, so a later course can conflict with an
/// earlier one but not vice versa.
fn apply_hard_rules(
    context: &StudentContext,
    candidates: Vec<CandidateCourse>,
) -> Vec<VerifiedCandidate> {
    let mut accepted_schedules: Vec<(String, Schedulable)> = Vec::new();
    let mut verified = Vec::with_capacity(candidates.len());

    for course in candidates {
        let outcome = if context.has_completed(&course.course_code) {
            VerificationOutcome::Invalid(InvalidReason::AlreadyCompleted)
        } else if seats_exhausted(course.availability.available_seats.as_deref()) {
            VerificationOutcome::Invalid(InvalidReason::NoSeats)
        } else if let Some(conflicting) = first_conflict(&course, &accepted_schedules) {
            VerificationOutcome::Invalid(InvalidReason::ScheduleConflict { with: conflicting })
        } else {
            if let Some(schedulable) = Schedulable::of(&course) {
                accepted_schedules.push((course.course_code.clone(), schedulable));
            }
            VerificationOutcome::Valid
        };

        verified.push(VerifiedCandidate { course, outcome });
    }

    verified
}

/// A seat count blocks only when it parses as the integer zero; absent or
/// non-numeric values pass (never block on uncertain data).
fn seats_exhausted(available_seats: Option<&str>) -> bool {
    matches!(
        available_seats.and_then(|s| s.trim().parse::<i64>().ok()),
        Some(0)
    )
}

#[derive(Debug, Clone)]
struct Schedulable {
    days: String,
    time: String,
}

impl Schedulable {
    /// A course participates in conflict checking only when both days and
    /// time are present; unknown schedules cannot conflict.
    fn of(course: &CandidateCourse) -> Option<Self> {
        let days = course.schedule.days.as_deref()?.trim();
        let time = course.schedule.time.as_deref()?.trim();
        if days.is_empty() || time.is_empty() {
            return None;
        }
        Some(Self {
            days: days.to_string(),
            time: time.to_string(),
        })
    }
}

fn first_conflict(
    course: &CandidateCourse,
    accepted: &[(String, Schedulable)],
) -> Option<String> {
    let candidate = Schedulable::of(course)?;

    for (code, earlier) in accepted {
        if schedules_conflict(&candidate, earlier) {
            return Some(code.clone());
        }
    }
    None
}

/// Two schedules conflict iff they share at least one day character and
/// their time ranges overlap. An unparseable time string on either side is
/// treated conservatively as a conflict.
fn schedules_conflict(a: &Schedulable, b: &Schedulable) -> bool {
    let share_day = a
        .days
        .chars()
        .filter(|c| !c.is_whitespace())
        .any(|c| b.days.contains(c));
    if !share_day {
        return false;
    }

    match (parse_time_range(&a.time), parse_time_range(&b.time)) {
        (Some((start_a, end_a)), Some((start_b, end_b))) => {
            start_a <= end_b && end_a >= start_b
        }
        // Present but unparseable: cannot prove the times apart.
        _ => true,
    }
}

/// Parses "10:00-11:50" (or "10-12") into minutes-since-midnight bounds.
fn parse_time_range(time: &str) -> Option<(u32, u32)> {
    let (start, end) = time.split_once('-')?;
    Some((parse_clock(start)?, parse_clock(end)?))
}

fn parse_clock(value: &str) -> Option<u32> {
    let value = value.trim();
    let (hours, minutes) = match value.split_once(':') {
        Some((h, m)) => (h.trim(), m.trim()),
        None => (value, "0"),
    };

    let hours: u32 = hours.parse().ok()?;
    let minutes: u32 = minutes.parse().ok()?;
    if hours >= 24 || minutes >= 60 {
        return None;
    }
    Some(hours * 60 + minutes)
}

/// Parses the batched reply into a map of course code to missing-prereq
/// detail. Lines that fail to parse are ignored; unknown codes are harmless.
fn parse_prerequisite_reply(reply: &str) -> HashMap<String, String> {
    let mut missing = HashMap::new();

    for line in reply.lines() {
        let line = line.trim();
        let Some((code, rest)) = line.split_once(':') else {
            continue;
        };
        let code = code.trim();
        let rest = rest.trim();

        if rest.starts_with("PREREQUISITE_MISSING") {
            let detail = rest
                .split_once(':')
                .map(|(_, detail)| detail.trim())
                .filter(|d| !d.is_empty())
                .unwrap_or("prerequisite not satisfied");
            missing.insert(code.to_string(), detail.to_string());
        }
    }

    missing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedLlm;
    use advisor_core::{Availability, Schedule};

    fn course(code: &str, seats: Option<&str>, days: Option<&str>, time: Option<&str>) -> CandidateCourse {
        CandidateCourse {
            course_code: code.to_string(),
            course_name: format!("{code} name"),
            credit_hours: Some("4".to_string()),
            description: "desc".to_string(),
            prerequisites: String::new(),
            instructor: "Staff".to_string(),
            schedule: Schedule {
                days: days.map(str::to_string),
                time: time.map(str::to_string),
            },
            location: "101 Hall".to_string(),
            availability: Availability {
                available_seats: seats.map(str::to_string),
                total_seats: Some("30".to_string()),
            },
        }
    }

    fn context_with_completed(codes: &[&str]) -> StudentContext {
        StudentContext {
            completed_course_codes: codes.iter().map(|c| c.to_string()).collect(),
            declared_programs: Vec::new(),
        }
    }

    fn verifier(llm: ScriptedLlm) -> ConstraintVerifier {
        ConstraintVerifier::new(Arc::new(llm), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn completed_course_is_invalid_regardless_of_seats_and_schedule() {
        let context = context_with_completed(&["CS 210"]);
        // Zero seats and a conflicting schedule must not mask the completion
        // check; it runs first.
        let candidates = vec![course("CS 210", Some("0"), Some("MWF"), Some("10:00-11:50"))];

        let verified = verifier(ScriptedLlm::replies(["unused"]))
            .verify(&context, candidates)
            .await;

        assert_eq!(
            verified[0].outcome,
            VerificationOutcome::Invalid(InvalidReason::AlreadyCompleted)
        );
    }

    #[tokio::test]
    async fn zero_seats_excludes_but_uncertain_values_pass() {
        let context = context_with_completed(&[]);
        let candidates = vec![
            course("CS 211", Some("0"), None, None),
            course("CS 212", Some(""), None, None),
            course("CS 213", Some("N/A"), None, None),
            course("CS 214", None, None, None),
        ];

        let verified = verifier(ScriptedLlm::replies(["unused"]))
            .verify(&context, candidates)
            .await;

        assert_eq!(
            verified[0].outcome,
            VerificationOutcome::Invalid(InvalidReason::NoSeats)
        );
        for v in &verified[1..] {
            assert!(v.outcome.is_valid(), "{} should pass", v.course.course_code);
        }
    }

    #[tokio::test]
    async fn schedule_conflict_is_order_dependent() {
        let context = context_with_completed(&[]);
        let a = course("CS 301", Some("5"), Some("MWF"), Some("10:00-11:50"));
        let b = course("CS 302", Some("5"), Some("MW"), Some("11:00-12:00"));

        let verified = verifier(ScriptedLlm::replies(["unused"]))
            .verify(&context, vec![a.clone(), b.clone()])
            .await;
        assert!(verified[0].outcome.is_valid());
        assert_eq!(
            verified[1].outcome,
            VerificationOutcome::Invalid(InvalidReason::ScheduleConflict {
                with: "CS 301".to_string()
            })
        );

        // Reversed order flags the other course.
        let verified = verifier(ScriptedLlm::replies(["unused"]))
            .verify(&context, vec![b, a])
            .await;
        assert!(verified[0].outcome.is_valid());
        assert_eq!(
            verified[1].outcome,
            VerificationOutcome::Invalid(InvalidReason::ScheduleConflict {
                with: "CS 302".to_string()
            })
        );
    }

    #[tokio::test]
    async fn disjoint_days_do_not_conflict() {
        let context = context_with_completed(&[]);
        let candidates = vec![
            course("CS 301", Some("5"), Some("MWF"), Some("10:00-11:50")),
            course("CS 302", Some("5"), Some("TR"), Some("10:00-11:50")),
        ];

        let verified = verifier(ScriptedLlm::replies(["unused"]))
            .verify(&context, candidates)
            .await;
        assert!(verified.iter().all(|v| v.outcome.is_valid()));
    }

    #[tokio::test]
    async fn unparseable_time_is_a_conflict_but_missing_schedule_is_not() {
        let context = context_with_completed(&[]);
        let candidates = vec![
            course("CS 301", Some("5"), Some("MWF"), Some("10:00-11:50")),
            course("CS 302", Some("5"), Some("MW"), Some("TBA")),
            course("CS 303", Some("5"), None, None),
        ];

        let verified = verifier(ScriptedLlm::replies(["unused"]))
            .verify(&context, candidates)
            .await;

        assert!(verified[0].outcome.is_valid());
        assert_eq!(
            verified[1].outcome,
            VerificationOutcome::Invalid(InvalidReason::ScheduleConflict {
                with: "CS 301".to_string()
            })
        );
        assert!(verified[2].outcome.is_valid());
    }

    #[tokio::test]
    async fn prerequisite_reply_marks_missing_courses() {
        let context = context_with_completed(&["CS 210"]);
        let mut a = course("CS 211", Some("5"), None, None);
        a.prerequisites = "CS 210".to_string();
        let mut b = course("CS 330", Some("5"), None, None);
        b.prerequisites = "CS 211 and MATH 231".to_string();

        let reply = "CS 211: PREREQUISITE_MET\nCS 330: PREREQUISITE_MISSING: needs CS 211";
        let verified = verifier(ScriptedLlm::replies([reply]))
            .verify(&context, vec![a, b])
            .await;

        assert!(verified[0].outcome.is_valid());
        assert_eq!(
            verified[1].outcome,
            VerificationOutcome::Invalid(InvalidReason::PrerequisiteMissing {
                detail: "needs CS 211".to_string()
            })
        );
    }

    #[tokio::test]
    async fn prerequisite_call_failure_fails_open() {
        let context = context_with_completed(&[]);
        let mut a = course("CS 330", Some("5"), None, None);
        a.prerequisites = "CS 211".to_string();

        let verified = verifier(ScriptedLlm::failing("model down"))
            .verify(&context, vec![a])
            .await;

        assert!(verified[0].outcome.is_valid());
    }

    #[tokio::test]
    async fn hard_rule_outcomes_survive_prerequisite_stage() {
        let context = context_with_completed(&["CS 210"]);
        let mut completed = course("CS 210", Some("5"), None, None);
        completed.prerequisites = "none".to_string();

        // Even a reply claiming the course is fine cannot resurrect a hard
        // failure.
        let reply = "CS 210: PREREQUISITE_MET";
        let verified = verifier(ScriptedLlm::replies([reply]))
            .verify(&context, vec![completed])
            .await;

        assert_eq!(
            verified[0].outcome,
            VerificationOutcome::Invalid(InvalidReason::AlreadyCompleted)
        );
    }

    #[test]
    fn garbled_reply_lines_are_ignored() {
        let reply = "nonsense\nCS 330: PREREQUISITE_MISSING: needs CS 211\nCS 4: huh";
        let missing = parse_prerequisite_reply(reply);
        assert_eq!(missing.len(), 1);
        assert_eq!(missing["CS 330"], "needs CS 211");
    }

    #[test]
    fn missing_without_detail_gets_default_text() {
        let missing = parse_prerequisite_reply("CS 330: PREREQUISITE_MISSING:");
        assert_eq!(missing["CS 330"], "prerequisite not satisfied");
        let missing = parse_prerequisite_reply("CS 331: PREREQUISITE_MISSING");
        assert_eq!(missing["CS 331"], "prerequisite not satisfied");
    }

    #[test]
    fn clock_parsing_handles_hours_and_minutes() {
        assert_eq!(parse_time_range("10:00-11:50"), Some((600, 710)));
        assert_eq!(parse_time_range("10-12"), Some((600, 720)));
        assert_eq!(parse_time_range("TBA"), None);
        assert_eq!(parse_time_range("25:00-26:00"), None);
    }
}
