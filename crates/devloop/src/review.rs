//! Review Gate: the human decision point for an issue In Review.
//!
//! Input arrives through a [`DecisionSource`], so tests drive the gate with
//! [`ScriptedDecisions`] and the CLI with [`TerminalDecisions`]. Accepted
//! inputs (case-insensitive):
//!
//! | Input | Decision |
//! |---|---|
//! | `a`, `approve` | approve |
//! | `r`, `reject [feedback]` | reject; feedback is asked for when missing |
//! | `d`, `diff` | show the working-tree diff |
//! | `s`, `skip` | skip |
//!
//! Anything else is reported and asked again; the gate never guesses.

use crate::domain::Issue;
use crate::error::{Error, Result};
use crate::vcs::VersionControl;
use async_trait::async_trait;
use colored::Colorize;
use std::collections::VecDeque;
use std::fmt::Write as _;
use std::io::Write as _;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

const DECISION_PROMPT: &str = "[a]pprove, [r]eject <feedback>, [d]iff, [s]kip: ";
const FEEDBACK_PROMPT: &str = "Feedback (required): ";

/// One parsed reviewer input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Accept the work.
    Approve,
    /// Send it back to the agent. The feedback may still be empty here.
    Reject(String),
    /// Show the diff.
    Diff,
    /// Abandon this attempt.
    Skip,
}

/// What the gate concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Mark Done.
    Approve,
    /// Rework with this non-empty feedback.
    Reject(String),
    /// Discard and return to Ready.
    Skip,
}

/// Parse one line of reviewer input. `None` means unrecognized.
pub fn parse_decision(input: &str) -> Option<Decision> {
    let input = input.trim();
    let (word, rest) = input
        .split_once(char::is_whitespace)
        .map_or((input, ""), |(w, r)| (w, r.trim()));

    match word.to_ascii_lowercase().as_str() {
        "a" | "approve" if rest.is_empty() => Some(Decision::Approve),
        "r" | "reject" => Some(Decision::Reject(rest.to_string())),
        "d" | "diff" if rest.is_empty() => Some(Decision::Diff),
        "s" | "skip" if rest.is_empty() => Some(Decision::Skip),
        _ => None,
    }
}

/// Where reviewer input comes from.
#[async_trait]
pub trait DecisionSource: Send {
    /// Show `prompt` and read one line. `None` means the input is closed.
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>>;

    /// Show information to the reviewer.
    fn present(&mut self, text: &str);
}

/// Reads decisions from standard input.
#[derive(Debug)]
pub struct TerminalDecisions {
    lines: Lines<BufReader<Stdin>>,
}

impl TerminalDecisions {
    /// Read from this process's stdin.
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

impl Default for TerminalDecisions {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DecisionSource for TerminalDecisions {
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        eprint!("{}", prompt.bold());
        std::io::stderr().flush()?;
        Ok(self.lines.next_line().await?)
    }

    fn present(&mut self, text: &str) {
        println!("{text}");
    }
}

/// Replays a fixed list of inputs, then reports closed input.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDecisions {
    inputs: VecDeque<String>,
    presented: Vec<String>,
    prompts: Vec<String>,
}

impl ScriptedDecisions {
    /// Replay `inputs` in order.
    pub fn new<I, S>(inputs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inputs: inputs.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Everything presented so far.
    pub fn presented(&self) -> &[String] {
        &self.presented
    }

    /// Every prompt shown so far.
    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    /// Inputs not consumed yet.
    pub fn remaining(&self) -> usize {
        self.inputs.len()
    }
}

#[async_trait]
impl DecisionSource for ScriptedDecisions {
    async fn read_line(&mut self, prompt: &str) -> Result<Option<String>> {
        self.prompts.push(prompt.to_string());
        Ok(self.inputs.pop_front())
    }

    fn present(&mut self, text: &str) {
        self.presented.push(text.to_string());
    }
}

/// What the reviewer sees before deciding.
pub fn review_summary(issue: &Issue, satisfied: &[usize], agent_summary: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", format!("{}: {} is ready for review", issue.id, issue.title).bold());

    if !issue.acceptance_criteria.is_empty() {
        out.push_str("\nAcceptance criteria (as reported by the agent):\n");
        for (index, criterion) in issue.acceptance_criteria.iter().enumerate() {
            let met = criterion.satisfied || satisfied.contains(&index);
            let mark = if met { "[x]".green() } else { "[ ]".dimmed() };
            let _ = writeln!(out, "  {mark} {}. {}", index + 1, criterion.text);
        }
    }

    let agent_summary = agent_summary.trim();
    if !agent_summary.is_empty() {
        let _ = writeln!(out, "\nAgent summary:\n{agent_summary}");
    }
    out
}

/// Asks a [`DecisionSource`] until it produces a verdict.
pub struct ReviewGate<'a> {
    decisions: &'a mut dyn DecisionSource,
    vcs: &'a dyn VersionControl,
}

impl<'a> ReviewGate<'a> {
    /// A gate reading from `decisions` and diffing through `vcs`.
    pub fn new(decisions: &'a mut dyn DecisionSource, vcs: &'a dyn VersionControl) -> Self {
        Self { decisions, vcs }
    }

    /// Show information to the reviewer.
    pub fn present(&mut self, text: &str) {
        self.decisions.present(text);
    }

    /// Loop until approve, a reject with feedback, or skip.
    ///
    /// # Errors
    ///
    /// `Error::Interrupted` if the input closes before a verdict.
    pub async fn decide(&mut self) -> Result<Verdict> {
        loop {
            let Some(line) = self.decisions.read_line(DECISION_PROMPT).await? else {
                return Err(Error::Interrupted);
            };

            match parse_decision(&line) {
                Some(Decision::Approve) => return Ok(Verdict::Approve),
                Some(Decision::Skip) => return Ok(Verdict::Skip),
                Some(Decision::Reject(feedback)) => {
                    return self.require_feedback(feedback).await.map(Verdict::Reject);
                }
                Some(Decision::Diff) => self.show_diff(),
                None if line.trim().is_empty() => {}
                None => self.decisions.present(&format!(
                    "Unrecognized input '{}'. Expected approve, reject <feedback>, diff or skip.",
                    line.trim()
                )),
            }
        }
    }

    async fn require_feedback(&mut self, mut feedback: String) -> Result<String> {
        while feedback.trim().is_empty() {
            match self.decisions.read_line(FEEDBACK_PROMPT).await? {
                Some(line) => feedback = line,
                None => return Err(Error::Interrupted),
            }
        }
        Ok(feedback.trim().to_string())
    }

    fn show_diff(&mut self) {
        match self.vcs.diff() {
            Ok(diff) if diff.trim().is_empty() => self.decisions.present("(no uncommitted changes)"),
            Ok(diff) => self.decisions.present(&diff),
            Err(e) => {
                tracing::warn!(error = %e, "Diff unavailable");
                self.decisions.present(&format!("Diff unavailable: {e}"));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vcs::NoVersionControl;
    use rstest::rstest;

    #[rstest]
    #[case("a", Some(Decision::Approve))]
    #[case("  APPROVE ", Some(Decision::Approve))]
    #[case("r", Some(Decision::Reject(String::new())))]
    #[case("reject fix validation", Some(Decision::Reject("fix validation".to_string())))]
    #[case("R  handle empty input ", Some(Decision::Reject("handle empty input".to_string())))]
    #[case("d", Some(Decision::Diff))]
    #[case("Diff", Some(Decision::Diff))]
    #[case("s", Some(Decision::Skip))]
    #[case("skip", Some(Decision::Skip))]
    #[case("yes", None)]
    #[case("approve everything", None)]
    #[case("", None)]
    fn test_parse_decision(#[case] input: &str, #[case] expected: Option<Decision>) {
        assert_eq!(parse_decision(input), expected);
    }

    #[tokio::test]
    async fn test_unrecognized_input_reprompts() {
        let mut decisions = ScriptedDecisions::new(["maybe", "a"]);
        let vcs = NoVersionControl;
        let verdict = ReviewGate::new(&mut decisions, &vcs).decide().await.unwrap();

        assert_eq!(verdict, Verdict::Approve);
        assert_eq!(decisions.prompts().len(), 2);
        assert!(decisions.presented()[0].contains("Unrecognized input 'maybe'"));
    }

    #[tokio::test]
    async fn test_reject_without_feedback_asks_until_given() {
        let mut decisions = ScriptedDecisions::new(["r", "", "   ", "fix validation"]);
        let vcs = NoVersionControl;
        let verdict = ReviewGate::new(&mut decisions, &vcs).decide().await.unwrap();

        assert_eq!(verdict, Verdict::Reject("fix validation".to_string()));
        assert_eq!(
            decisions.prompts(),
            [DECISION_PROMPT, FEEDBACK_PROMPT, FEEDBACK_PROMPT, FEEDBACK_PROMPT]
        );
    }

    #[tokio::test]
    async fn test_diff_then_skip() {
        let mut decisions = ScriptedDecisions::new(["d", "s"]);
        let vcs = NoVersionControl;
        let verdict = ReviewGate::new(&mut decisions, &vcs).decide().await.unwrap();

        assert_eq!(verdict, Verdict::Skip);
        assert_eq!(decisions.presented(), ["(no uncommitted changes)"]);
    }

    #[tokio::test]
    async fn test_closed_input_is_interruption() {
        let mut decisions = ScriptedDecisions::new(["d"]);
        let vcs = NoVersionControl;
        let err = ReviewGate::new(&mut decisions, &vcs).decide().await.unwrap_err();
        assert!(matches!(err, Error::Interrupted));

        let mut decisions = ScriptedDecisions::new(["reject"]);
        let err = ReviewGate::new(&mut decisions, &vcs).decide().await.unwrap_err();
        assert!(matches!(err, Error::Interrupted));
    }

    #[test]
    fn test_review_summary_marks_reported_criteria() {
        colored::control::set_override(false);
        let backlog = crate::domain::Backlog::parse(
            "Spec: s.md\n\n---\n\n### ISSUE-1: Login\n**Status:** In Review\n\n- [ ] Form\n- [ ] Errors shown\n",
        )
        .unwrap();
        let summary = review_summary(&backlog.issues()[0], &[1], "Added the form.");

        assert!(summary.starts_with("ISSUE-1: Login is ready for review"));
        assert!(summary.contains("[ ] 1. Form"));
        assert!(summary.contains("[x] 2. Errors shown"));
        assert!(summary.ends_with("Agent summary:\nAdded the form.\n"));
    }
}
