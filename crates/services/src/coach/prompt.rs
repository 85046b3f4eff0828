use std::borrow::Cow;

use coach_core::model::{ChatTurn, Metadata, ProblemEntry};

/// Characters of the problem body included in the coaching context.
pub const BODY_CHAR_LIMIT: usize = 2000;

const ELLIPSIS: &str = "...";

const COACHING_APPROACH: &[&str] = &[
    "# Coaching Approach",
    "- Ask guiding questions to help the learner think through the problem",
    "- Provide hints without giving away the full solution",
    "- Encourage the learner to explain their reasoning",
    "- If they're truly stuck, suggest they look at the step hints",
    "- Be concise and friendly",
    "",
    "Remember: The goal is learning, not just solving. Guide, don't tell.",
];

/// First `BODY_CHAR_LIMIT` characters of `body`, with `...` appended if cut.
#[must_use]
pub fn truncate_body(body: &str) -> Cow<'_, str> {
    match body.char_indices().nth(BODY_CHAR_LIMIT) {
        Some((cut, _)) => Cow::Owned(format!("{}{ELLIPSIS}", &body[..cut])),
        None => Cow::Borrowed(body),
    }
}

/// System context for a coaching turn, rebuilt from the problem every time.
#[must_use]
pub fn build_system_prompt(problem: &ProblemEntry) -> String {
    let metadata = problem.metadata();
    let mut lines: Vec<Cow<'_, str>> = vec![
        "# Role".into(),
        "You are an expert technical coach helping a learner work through a system design/incident problem.".into(),
        "".into(),
        "# Current Problem".into(),
        format!("**Problem**: {}", metadata.name()).into(),
    ];

    for (key, label) in [
        (Metadata::CATEGORY, "Category"),
        (Metadata::DIFFICULTY, "Difficulty"),
        (Metadata::TIME, "Time"),
    ] {
        if let Some(value) = metadata.get(key) {
            lines.push(format!("**{label}**: {value}").into());
        }
    }

    let concepts = metadata.concepts();
    if !concepts.is_empty() {
        lines.push(format!("**Concepts**: {}", concepts.join(", ")).into());
    }

    lines.push("".into());
    lines.push("# Problem Description".into());
    lines.push(truncate_body(problem.body()));
    lines.push("".into());
    lines.extend(COACHING_APPROACH.iter().map(|line| Cow::Borrowed(*line)));

    lines.join("\n")
}

/// The full message list sent to the provider: system context, then every turn so far.
#[must_use]
pub fn build_messages(problem: &ProblemEntry, transcript: &[ChatTurn]) -> Vec<ChatTurn> {
    let mut messages = Vec::with_capacity(transcript.len() + 1);
    messages.push(ChatTurn::system(build_system_prompt(problem)));
    messages.extend_from_slice(transcript);
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use coach_core::model::{ChatRole, MetadataValue, ProblemDocument, ProblemFiles, ProblemId};
    use std::path::PathBuf;

    fn problem(body: &str) -> ProblemEntry {
        let metadata = Metadata::new()
            .with("name", MetadataValue::Text("Rate Limiter".into()))
            .with("category", MetadataValue::Text("system-design".into()))
            .with("difficulty", MetadataValue::Text("medium".into()))
            .with(
                "concepts",
                MetadataValue::List(vec!["token bucket".into(), "redis".into()]),
            );
        ProblemEntry::new(
            ProblemId::new("systems/rate-limiter").unwrap(),
            "systems",
            ProblemDocument {
                metadata,
                body: body.to_string(),
            },
            ProblemFiles {
                directory: PathBuf::from("systems/rate-limiter"),
                hint_files: Vec::new(),
                solution_file: PathBuf::from("systems/rate-limiter/solution.md"),
                lab_dir: None,
            },
        )
    }

    #[test]
    fn short_body_is_untouched() {
        assert_eq!(truncate_body("short"), "short");
        let exact = "x".repeat(BODY_CHAR_LIMIT);
        assert_eq!(truncate_body(&exact), exact.as_str());
    }

    #[test]
    fn long_body_is_cut_with_ellipsis() {
        let long = "é".repeat(BODY_CHAR_LIMIT + 5);
        let cut = truncate_body(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), BODY_CHAR_LIMIT + 3);
    }

    #[test]
    fn prompt_contains_metadata_and_policy() {
        let prompt = build_system_prompt(&problem("Design a limiter."));
        assert!(prompt.contains("**Problem**: Rate Limiter"));
        assert!(prompt.contains("**Category**: system-design"));
        assert!(prompt.contains("**Difficulty**: medium"));
        assert!(!prompt.contains("**Time**"));
        assert!(prompt.contains("**Concepts**: token bucket, redis"));
        assert!(prompt.contains("Design a limiter."));
        assert!(prompt.contains("Provide hints without giving away the full solution"));
    }

    #[test]
    fn messages_lead_with_system_context() {
        let transcript = vec![ChatTurn::user("hi"), ChatTurn::assistant("hello")];
        let messages = build_messages(&problem("body"), &transcript);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].role, ChatRole::System);
        assert_eq!(&messages[1..], transcript.as_slice());
    }
}
