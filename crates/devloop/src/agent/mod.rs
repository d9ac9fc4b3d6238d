//! Implementation agent collaborator.
//!
//! The loop hands the agent an issue (raw block, parent spec, optional review
//! feedback) and waits for it to finish changing the project. The bundled
//! [`CommandAgent`] runs an external CLI, feeding the prompt on stdin and
//! reading `stream-json` events from stdout.

mod signals;
mod stream;

pub use signals::{Signals, parse_signals};

use crate::domain::IssueId;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::process::Stdio;
use stream::{ContentBlock, StreamEvent, describe_tool_use};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::Command;

/// What the agent is asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentRequest {
    /// Issue to implement.
    pub issue_id: IssueId,
    /// Issue title.
    pub title: String,
    /// The raw issue block.
    pub detail: String,
    /// Path of the parent spec, as written on the `Spec:` line.
    pub spec_ref: String,
    /// Contents of the parent spec, when it could be read.
    pub spec_text: Option<String>,
    /// Reviewer feedback from a rejection.
    pub feedback: Option<String>,
}

/// What came back from one agent run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentReport {
    /// Zero-based indices of criteria the agent reports satisfied.
    pub satisfied_criteria: Vec<usize>,
    /// Notes the agent asked to record.
    pub dev_notes: Option<String>,
    /// Final summary text.
    pub summary: String,
    /// Process exit code, when there was a process.
    pub exit_code: Option<i32>,
}

impl AgentReport {
    /// Build a report from the agent's full output text.
    pub fn from_output(output: &str, exit_code: Option<i32>) -> Self {
        let Signals {
            satisfied_criteria,
            dev_notes,
        } = parse_signals(output);
        Self {
            satisfied_criteria,
            dev_notes,
            summary: output.trim().to_string(),
            exit_code,
        }
    }
}

/// Something that implements issues.
///
/// A call blocks the loop until the agent is done.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Implement (or rework) one issue.
    ///
    /// # Errors
    ///
    /// `Error::Agent` if the agent could not be run at all. An agent that ran
    /// and failed still produces a report.
    async fn implement(&self, request: &AgentRequest) -> Result<AgentReport>;
}

/// Render the prompt for a request.
pub fn build_prompt(request: &AgentRequest) -> String {
    let mut prompt = String::new();
    let _ = writeln!(
        prompt,
        "Implement {}: {}. Make the changes in this repository; do not commit.\n",
        request.issue_id, request.title
    );
    let _ = writeln!(prompt, "## Issue\n\n{}\n", request.detail.trim_end());

    match &request.spec_text {
        Some(spec) => {
            let _ = writeln!(prompt, "## Parent spec ({})\n\n{}\n", request.spec_ref, spec.trim_end());
        }
        None => {
            let _ = writeln!(prompt, "## Parent spec\n\nSee {}.\n", request.spec_ref);
        }
    }

    if let Some(feedback) = &request.feedback {
        let _ = writeln!(
            prompt,
            "## Review feedback\n\nA reviewer rejected the previous attempt:\n\n{}\n",
            feedback.trim()
        );
    }

    prompt.push_str(
        "## Reporting\n\n\
         For each acceptance criterion you have satisfied, output \
         <criterion-met>N</criterion-met> where N is its 1-based position in the list.\n\
         Put anything the next developer should know in <dev-notes>...</dev-notes>.\n",
    );
    prompt
}

/// Runs an external agent CLI.
#[derive(Debug, Clone)]
pub struct CommandAgent {
    command: String,
    args: Vec<String>,
    workdir: PathBuf,
}

impl CommandAgent {
    /// An agent that runs `command args...` in `workdir`.
    pub fn new(command: impl Into<String>, args: Vec<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            args,
            workdir: workdir.into(),
        }
    }
}

#[async_trait]
impl Agent for CommandAgent {
    async fn implement(&self, request: &AgentRequest) -> Result<AgentReport> {
        let prompt = build_prompt(request);
        tracing::info!(
            issue = %request.issue_id,
            command = %self.command,
            rework = request.feedback.is_some(),
            "Starting agent"
        );

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .current_dir(&self.workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::Agent(format!("failed to spawn '{}': {e}", self.command)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(prompt.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Agent("agent stdout was not captured".to_string()))?;
        let mut lines = BufReader::new(stdout).lines();

        let mut text = String::new();
        let mut final_result: Option<String> = None;
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<StreamEvent>(&line) {
                Ok(StreamEvent::Assistant { message }) => {
                    for block in message.content {
                        match block {
                            ContentBlock::ToolUse { name, input } => {
                                tracing::info!("  {}", describe_tool_use(&name, &input));
                            }
                            ContentBlock::Text { text: t } => {
                                text.push_str(&t);
                                text.push('\n');
                            }
                            ContentBlock::Other => {}
                        }
                    }
                }
                Ok(StreamEvent::Result { result, is_error }) => {
                    if is_error {
                        tracing::warn!(issue = %request.issue_id, "Agent reported an error");
                    }
                    final_result = result;
                }
                Ok(StreamEvent::User {} | StreamEvent::System {}) => {}
                // Event types this build does not model.
                Err(_) if line.trim_start().starts_with('{') => {}
                Err(_) => {
                    text.push_str(&line);
                    text.push('\n');
                }
            }
        }

        let status = child.wait().await?;
        let exit_code = status.code();
        if !status.success() {
            tracing::warn!(issue = %request.issue_id, ?exit_code, "Agent exited unsuccessfully");
        }

        // Signals may appear in any text block, the summary only in the result.
        let mut output = text;
        if let Some(result) = &final_result {
            output.push_str(result);
        }
        let mut report = AgentReport::from_output(&output, exit_code);
        if let Some(result) = final_result {
            report.summary = result.trim().to_string();
        }

        tracing::info!(
            issue = %request.issue_id,
            criteria = report.satisfied_criteria.len(),
            "Agent finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(feedback: Option<&str>) -> AgentRequest {
        AgentRequest {
            issue_id: IssueId::from_ordinal(4),
            title: "Retry uploads".to_string(),
            detail: "### ISSUE-4: Retry uploads\n**Status:** In Progress\n- [ ] Retries 3 times\n".to_string(),
            spec_ref: "specs/uploads.md".to_string(),
            spec_text: Some("# Uploads\n".to_string()),
            feedback: feedback.map(str::to_string),
        }
    }

    #[test]
    fn test_prompt_contains_issue_spec_and_signals() {
        let prompt = build_prompt(&request(None));
        assert!(prompt.starts_with("Implement ISSUE-4: Retry uploads."));
        assert!(prompt.contains("- [ ] Retries 3 times"));
        assert!(prompt.contains("## Parent spec (specs/uploads.md)\n\n# Uploads"));
        assert!(prompt.contains("<criterion-met>N</criterion-met>"));
        assert!(!prompt.contains("Review feedback"));
    }

    #[test]
    fn test_prompt_includes_feedback() {
        let prompt = build_prompt(&request(Some("fix validation")));
        assert!(prompt.contains("## Review feedback"));
        assert!(prompt.contains("fix validation"));
    }

    #[test]
    fn test_report_from_output() {
        let report = AgentReport::from_output(
            "Done.\n<criterion-met>1</criterion-met>\n<dev-notes>Backoff is exponential</dev-notes>\n",
            Some(0),
        );
        assert_eq!(report.satisfied_criteria, vec![0]);
        assert_eq!(report.dev_notes.as_deref(), Some("Backoff is exponential"));
        assert_eq!(report.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_missing_command_is_agent_error() {
        let agent = CommandAgent::new("devloop-no-such-agent", Vec::new(), ".");
        let err = agent.implement(&request(None)).await.unwrap_err();
        assert!(matches!(err, Error::Agent(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_plain_text_agent_output() {
        let agent = CommandAgent::new(
            "sh",
            vec![
                "-c".to_string(),
                "cat > /dev/null; echo 'ok <criterion-met>1</criterion-met>'".to_string(),
            ],
            ".",
        );
        let report = agent.implement(&request(None)).await.unwrap();
        assert_eq!(report.satisfied_criteria, vec![0]);
        assert_eq!(report.exit_code, Some(0));
    }
}
