//! Replay a recorded request log through a fresh guardrail store.
//!
//! Input is JSON lines, one request each; blank lines are skipped. The store
//! runs on a [`ManualClock`] set to each request's `at_ms`, so a replay is
//! deterministic.

use anyhow::{bail, Context};
use ko_core::mode::WorkspaceMode;
use ko_core::policy::{GuardedAction, GuardrailSettings};
use ko_guard::{GuardErrorKind, GuardRequest, GuardrailStore, ManualClock};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::sync::Arc;

#[derive(Debug, Clone, Deserialize)]
pub struct ReplayEvent {
    pub at_ms: u64,
    pub user_id: String,
    pub action: GuardedAction,
    #[serde(default)]
    pub mode: WorkspaceMode,
    pub char_cost: u64,
    pub fingerprint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayDecision {
    pub line: usize,
    pub at_ms: u64,
    pub user_id: String,
    pub action: GuardedAction,
    pub admitted: bool,
    pub kind: Option<GuardErrorKind>,
    pub message: Option<String>,
    pub retry_after_ms: Option<u64>,
    /// Counts of the window live at `at_ms`, zero if none.
    pub request_count: u32,
    pub char_count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub total: usize,
    pub admitted: usize,
    pub rejected: usize,
}

pub fn replay<R: BufRead, W: Write>(
    input: R,
    mut out: W,
    settings: &GuardrailSettings,
) -> anyhow::Result<ReplaySummary> {
    let clock = Arc::new(ManualClock::new(0));
    let store = GuardrailStore::new(clock.clone());
    let mut summary = ReplaySummary::default();
    let mut last_at: Option<u64> = None;

    for (idx, line) in input.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.with_context(|| format!("failed to read line {line_no}"))?;
        if line.trim().is_empty() {
            continue;
        }

        let event: ReplayEvent = serde_json::from_str(&line)
            .with_context(|| format!("invalid request on line {line_no}"))?;
        if let Some(prev) = last_at {
            if event.at_ms < prev {
                bail!("line {line_no}: at_ms {} is earlier than {prev}", event.at_ms);
            }
        }
        last_at = Some(event.at_ms);
        clock.set(event.at_ms);

        let policy = settings.policy(event.action);
        let req = GuardRequest {
            user_id: &event.user_id,
            action: event.action.as_str(),
            char_cost: event.char_cost,
            fingerprint: &event.fingerprint,
            config: policy.config_for(event.mode),
            dedupe_ms: policy.dedupe_ms,
        };

        let result = store.admit(&req);
        let window = store.window(&event.user_id, event.action.as_str())?;
        // an expired window counts as empty; the next admission starts afresh
        let (request_count, char_count) = window
            .filter(|w| event.at_ms.saturating_sub(w.window_start_ms) < req.config.window_ms)
            .map(|w| (w.request_count, w.char_count))
            .unwrap_or_default();

        let decision = match result {
            Ok(_) => ReplayDecision {
                line: line_no,
                at_ms: event.at_ms,
                user_id: event.user_id,
                action: event.action,
                admitted: true,
                kind: None,
                message: None,
                retry_after_ms: None,
                request_count,
                char_count,
            },
            Err(err) => ReplayDecision {
                line: line_no,
                at_ms: event.at_ms,
                user_id: event.user_id,
                action: event.action,
                admitted: false,
                kind: Some(err.kind()),
                message: Some(err.to_string()),
                retry_after_ms: err.retry_after_ms(),
                request_count,
                char_count,
            },
        };

        summary.total += 1;
        if decision.admitted {
            summary.admitted += 1;
        } else {
            summary.rejected += 1;
        }

        serde_json::to_writer(&mut out, &decision)?;
        writeln!(out)?;
    }

    out.flush()?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn run(input: &str) -> anyhow::Result<(ReplaySummary, Vec<ReplayDecision>)> {
        let mut out = Vec::new();
        let summary = replay(Cursor::new(input), &mut out, &GuardrailSettings::default())?;
        let decisions = String::from_utf8(out)?
            .lines()
            .map(serde_json::from_str)
            .collect::<Result<Vec<ReplayDecision>, _>>()?;
        Ok((summary, decisions))
    }

    #[test]
    fn request_cap_and_window_reset() {
        let mut input = String::new();
        for (i, at) in [0u64, 1_000, 1_000, 5_000, 60_000].iter().enumerate() {
            input.push_str(&format!(
                r#"{{"at_ms": {at}, "user_id": "u1", "action": "semanticSearch", "char_cost": 10, "fingerprint": "q{i}"}}"#
            ));
            input.push('\n');
        }
        let settings = GuardrailSettings::from_json(
            r#"{"semantic_search": {"user": {"window_ms": 60000, "max_requests": 3}}}"#,
        )
        .unwrap();

        let mut out = Vec::new();
        let summary = replay(Cursor::new(input), &mut out, &settings).unwrap();
        let decisions: Vec<ReplayDecision> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(summary, ReplaySummary { total: 5, admitted: 4, rejected: 1 });
        let admitted: Vec<bool> = decisions.iter().map(|d| d.admitted).collect();
        assert_eq!(admitted, vec![true, true, true, false, true]);

        let rejected = &decisions[3];
        assert_eq!(rejected.kind, Some(GuardErrorKind::RateLimited));
        assert_eq!(rejected.retry_after_ms, Some(55_000));
        assert_eq!(rejected.request_count, 3);
        assert_eq!(
            rejected.message.as_deref(),
            Some("Rate limit reached for semanticSearch. Please wait and retry.")
        );

        assert_eq!((decisions[4].request_count, decisions[4].char_count), (1, 10));
    }

    #[test]
    fn duplicate_fingerprint_is_reported() {
        let input = r#"
{"at_ms": 0, "user_id": "u1", "action": "enrichNote", "char_cost": 100, "fingerprint": "n1"}
{"at_ms": 500, "user_id": "u1", "action": "enrichNote", "char_cost": 100, "fingerprint": "n1"}
"#;
        let (summary, decisions) = run(input).unwrap();
        assert_eq!(summary.rejected, 1);

        let dup = &decisions[1];
        assert_eq!(dup.line, 3);
        assert_eq!(dup.kind, Some(GuardErrorKind::DuplicateInFlight));
        assert_eq!(dup.retry_after_ms, Some(44_500));
        assert_eq!((dup.request_count, dup.char_count), (1, 100));
    }

    #[test]
    fn demo_mode_ceilings_apply() {
        let input = r#"{"at_ms": 0, "user_id": "demo", "action": "enrichNote", "mode": "demo", "char_cost": 9000, "fingerprint": "n1"}"#;
        let (_, decisions) = run(input).unwrap();
        assert_eq!(decisions[0].kind, Some(GuardErrorKind::RequestTooLarge));
        assert_eq!(decisions[0].retry_after_ms, None);
        assert_eq!(decisions[0].request_count, 0);
    }

    #[test]
    fn rejection_after_window_expiry_reports_empty_counts() {
        let input = r#"{"at_ms": 0, "user_id": "u1", "action": "semanticSearch", "char_cost": 10, "fingerprint": "a"}
{"at_ms": 600000, "user_id": "u1", "action": "semanticSearch", "char_cost": 900, "fingerprint": "b"}"#;
        let (_, decisions) = run(input).unwrap();
        assert_eq!((decisions[0].request_count, decisions[0].char_count), (1, 10));

        let late = &decisions[1];
        assert_eq!(late.kind, Some(GuardErrorKind::RequestTooLarge));
        assert_eq!((late.request_count, late.char_count), (0, 0));
    }

    #[test]
    fn timestamps_must_not_go_backwards() {
        let input = r#"{"at_ms": 10, "user_id": "u1", "action": "enrichNote", "char_cost": 1, "fingerprint": "a"}
{"at_ms": 5, "user_id": "u1", "action": "enrichNote", "char_cost": 1, "fingerprint": "b"}"#;
        let err = run(input).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn malformed_line_names_its_number() {
        let err = run("{\"at_ms\": 0}\n").unwrap_err();
        assert_eq!(err.to_string(), "invalid request on line 1");
    }
}
