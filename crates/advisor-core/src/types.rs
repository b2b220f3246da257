use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub type StudentId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgramType {
    Major,
    Minor,
}

impl std::fmt::Display for ProgramType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProgramType::Major => write!(f, "major"),
            ProgramType::Minor => write!(f, "minor"),
        }
    }
}

/// One entry in a program's ordered requirement list: either a concrete
/// course code or a "choose N of these" alternative group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequirementItem {
    Code(String),
    Alternative {
        requirement_name: String,
        courses_needed: u32,
        options: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramRequirement {
    pub program_name: String,
    pub program_type: ProgramType,
    pub required_courses: Vec<RequirementItem>,
}

/// Immutable per-request snapshot of a student's academic record.
///
/// Built fresh for every request; completed courses can change between calls,
/// so this is never cached across requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StudentContext {
    pub completed_course_codes: HashSet<String>,
    pub declared_programs: Vec<ProgramRequirement>,
}

impl StudentContext {
    pub fn has_completed(&self, course_code: &str) -> bool {
        self.completed_course_codes.contains(course_code)
    }

    /// Textual rendering of the student's progress, embedded in reasoning
    /// prompts. Alternative groups are flattened as "need K of {options}".
    pub fn render_progress(&self) -> String {
        let mut lines = Vec::new();

        lines.push("The student has the following academic programs:".to_string());
        for program in &self.declared_programs {
            lines.push(format!(
                "- {}: {}",
                capitalize(&program.program_type.to_string()),
                program.program_name
            ));
        }

        lines.push("\nThey have completed these courses:".to_string());
        let mut completed: Vec<&String> = self.completed_course_codes.iter().collect();
        completed.sort();
        for code in completed {
            lines.push(format!("- {}", code));
        }

        for program in &self.declared_programs {
            lines.push(format!(
                "\nThe required courses for their {} {} include:",
                program.program_name, program.program_type
            ));
            for item in &program.required_courses {
                match item {
                    RequirementItem::Code(code) => lines.push(format!("- {}", code)),
                    RequirementItem::Alternative {
                        requirement_name,
                        courses_needed,
                        options,
                    } => {
                        lines.push(format!(
                            "- {} (Need {} course(s)):",
                            requirement_name, courses_needed
                        ));
                        for option in options {
                            lines.push(format!("  * {}", option));
                        }
                    }
                }
            }
        }

        lines.push(
            "\nRecommend which classes they should take next term to stay on track.".to_string(),
        );

        lines.join("\n")
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Ordered set of independent retrieval queries derived from one student
/// query. Always holds between 1 and 5 entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPlan {
    pub queries: Vec<String>,
}

impl SearchPlan {
    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }
}

/// Raw document returned by the semantic index. No metadata field is
/// guaranteed to be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CourseDocument {
    pub content: String,
    pub metadata: HashMap<String, String>,
}

impl CourseDocument {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    pub days: Option<String>,
    pub time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Availability {
    pub available_seats: Option<String>,
    pub total_seats: Option<String>,
}

/// A course document returned by the semantic index as potentially relevant
/// to a query, lifted into a typed record. Produced fresh per retrieval and
/// never mutated in place; verification and ranking work on copies.
///
/// Seat counts stay as raw strings because the index guarantees nothing about
/// them; the verifier parses at point of use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateCourse {
    pub course_code: String,
    pub course_name: String,
    pub credit_hours: Option<String>,
    pub description: String,
    pub prerequisites: String,
    pub instructor: String,
    pub schedule: Schedule,
    pub location: String,
    pub availability: Availability,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvalidReason {
    AlreadyCompleted,
    NoSeats,
    ScheduleConflict { with: String },
    PrerequisiteMissing { detail: String },
}

impl std::fmt::Display for InvalidReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidReason::AlreadyCompleted => write!(f, "ALREADY_COMPLETED"),
            InvalidReason::NoSeats => write!(f, "NO_SEATS"),
            InvalidReason::ScheduleConflict { with } => {
                write!(f, "SCHEDULE_CONFLICT(with={})", with)
            }
            InvalidReason::PrerequisiteMissing { detail } => {
                write!(f, "PREREQUISITE_MISSING({})", detail)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VerificationOutcome {
    Valid,
    Invalid(InvalidReason),
}

impl VerificationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationOutcome::Valid)
    }
}

/// A candidate annotated with its eligibility outcome. The full set (valid
/// and invalid) is preserved so callers can audit exclusions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifiedCandidate {
    pub course: CandidateCourse,
    pub outcome: VerificationOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }

    /// Lenient parse for model output; anything unrecognized is Medium.
    pub fn parse_lenient(s: &str) -> Self {
        let normalized = s.trim().to_ascii_lowercase();
        if normalized.contains("high") {
            Priority::High
        } else if normalized.contains("low") {
            Priority::Low
        } else {
            Priority::Medium
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "High"),
            Priority::Medium => write!(f, "Medium"),
            Priority::Low => write!(f, "Low"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub course: CandidateCourse,
    pub is_recommended: bool,
    pub reason: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    CourseRecommendations,
    GeneralResponse,
}

/// The single result shape surfaced to callers. Always well-formed, even in
/// total pipeline failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationResult {
    pub kind: ResultKind,
    pub message: String,
    pub course_data: Vec<Recommendation>,
}

impl RecommendationResult {
    pub fn general(message: impl Into<String>) -> Self {
        Self {
            kind: ResultKind::GeneralResponse,
            message: message.into(),
            course_data: Vec::new(),
        }
    }

    pub fn courses(message: impl Into<String>, course_data: Vec<Recommendation>) -> Self {
        Self {
            kind: ResultKind::CourseRecommendations,
            message: message.into(),
            course_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirement_item_round_trips_bare_codes_and_groups() {
        let json = r#"["CS 210", {"requirement_name": "Science Elective", "courses_needed": 2, "options": ["PHYS 201", "CH 221"]}]"#;
        let items: Vec<RequirementItem> = serde_json::from_str(json).unwrap();

        assert_eq!(items[0], RequirementItem::Code("CS 210".to_string()));
        match &items[1] {
            RequirementItem::Alternative {
                requirement_name,
                courses_needed,
                options,
            } => {
                assert_eq!(requirement_name, "Science Elective");
                assert_eq!(*courses_needed, 2);
                assert_eq!(options.len(), 2);
            }
            other => panic!("expected alternative group, got {:?}", other),
        }

        let round_tripped = serde_json::to_string(&items).unwrap();
        let reparsed: Vec<RequirementItem> = serde_json::from_str(&round_tripped).unwrap();
        assert_eq!(items, reparsed);
    }

    #[test]
    fn render_progress_flattens_alternative_groups() {
        let context = StudentContext {
            completed_course_codes: ["CS 210".to_string()].into_iter().collect(),
            declared_programs: vec![ProgramRequirement {
                program_name: "Computer Science".to_string(),
                program_type: ProgramType::Major,
                required_courses: vec![
                    RequirementItem::Code("CS 211".to_string()),
                    RequirementItem::Alternative {
                        requirement_name: "Math Sequence".to_string(),
                        courses_needed: 1,
                        options: vec!["MATH 251".to_string(), "MATH 261".to_string()],
                    },
                ],
            }],
        };

        let rendered = context.render_progress();
        assert!(rendered.contains("Major: Computer Science"));
        assert!(rendered.contains("- CS 210"));
        assert!(rendered.contains("Math Sequence (Need 1 course(s)):"));
        assert!(rendered.contains("  * MATH 251"));
        assert!(rendered.contains("next term"));
    }

    #[test]
    fn priority_parse_is_lenient() {
        assert_eq!(Priority::parse_lenient("High"), Priority::High);
        assert_eq!(Priority::parse_lenient(" low "), Priority::Low);
        assert_eq!(Priority::parse_lenient("HIGH priority"), Priority::High);
        assert_eq!(Priority::parse_lenient("whatever"), Priority::Medium);
        assert_eq!(Priority::parse_lenient(""), Priority::Medium);
    }

    #[test]
    fn priority_rank_orders_high_first() {
        assert!(Priority::High.rank() < Priority::Medium.rank());
        assert!(Priority::Medium.rank() < Priority::Low.rank());
    }
}
