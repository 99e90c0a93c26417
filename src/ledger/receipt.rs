//! Markdown run receipt.

use std::fmt::Write;

use crate::domain::{Artifact, RunRecord};

fn doc_line(out: &mut String, label: &str, artifact: Option<&Artifact>, doc_id: Option<&String>) {
    let _ = match (artifact, doc_id) {
        (Some(a), Some(id)) => writeln!(out, "**{}:** {} (sha256 {})", label, id, a.short_digest()),
        (Some(a), None) => writeln!(out, "**{}:** not persisted (sha256 {})", label, a.short_digest()),
        (None, _) => writeln!(out, "**{}:** none", label),
    };
}

/// Render a human-readable receipt for a run
pub fn render_receipt(run: &RunRecord) -> String {
    let ctx = &run.context;
    let mut out = String::new();

    let _ = writeln!(out, "# Run Receipt: {}\n", run.id);
    let _ = writeln!(out, "**Kind:** {}", ctx.kind);
    let _ = writeln!(out, "**Goal:** {}", ctx.goal);
    if !ctx.domain.is_empty() {
        let _ = writeln!(out, "**Domain:** {}", ctx.domain);
    }
    let _ = writeln!(out, "**Subject:** {}", ctx.subject);
    match &ctx.intent {
        Some(intent) => {
            let _ = writeln!(out, "**Intent:** {}", intent);
        }
        None => {
            let _ = writeln!(out, "**Intent:** unavailable (run proceeded without it)");
        }
    }
    let _ = writeln!(out, "**Focus Area:** {}", ctx.focus_area);
    let _ = writeln!(out, "**Next Steps:** {}", ctx.next_steps);
    if let Some(prev) = &ctx.previous_run {
        let _ = writeln!(out, "**Previous Run:** {}", prev);
    }
    let _ = writeln!(out, "**Iterations:** {} of {}", run.iterations.len(), ctx.iteration_budget);
    let _ = writeln!(out, "**Started:** {}", run.started_at.to_rfc3339());
    if let Some(ended) = run.ended_at {
        let _ = writeln!(out, "**Ended:** {}", ended.to_rfc3339());
    }
    if let Some(secs) = run.duration_secs() {
        let _ = writeln!(out, "**Duration:** {:.2} seconds", secs);
    }
    let _ = writeln!(out, "**Status:** {:?}", run.status());
    if let Some(reason) = &run.aborted {
        let _ = writeln!(out, "**Abort Reason:** {}", reason);
    }
    out.push('\n');

    if let Some(finals) = &run.final_artifacts {
        let docs = &finals.documents;
        let _ = writeln!(out, "## Final Artifacts\n");
        doc_line(&mut out, "Initial", Some(&finals.initial), docs.get("initial"));
        doc_line(&mut out, "Best", Some(&finals.best), docs.get("best"));
        doc_line(&mut out, "Good Enough", finals.good_enough.as_ref(), docs.get("good_enough"));
        if let Some(index) = finals.good_enough_iteration {
            let _ = writeln!(out, "**Good Enough From Iteration:** {}", index);
        }
        doc_line(
            &mut out,
            "Final Aggregate",
            finals.final_aggregate.as_ref(),
            docs.get("final_aggregate"),
        );
        if !finals.failures.is_empty() {
            let _ = writeln!(out, "\n### Run-level Failures\n");
            for f in &finals.failures {
                let _ = writeln!(out, "- {} ({}): {}", f.stage, f.kind, f.message);
            }
        }
        out.push('\n');
    }

    let _ = writeln!(out, "## Iteration Details\n");
    for it in &run.iterations {
        let _ = writeln!(out, "### Iteration {}\n", it.index);
        let verdict = match &it.verdict {
            Some(v) if v.meets_requirements => "meets requirements",
            Some(_) => "does not meet requirements",
            None => "no verdict",
        };
        let _ = writeln!(out, "- **Verdict:** {}", verdict);
        let _ = writeln!(out, "- **Refined:** {}", if it.refined { "yes" } else { "no" });
        let _ = writeln!(out, "- **Suggestions:** {}", it.suggestions.len());
        for (name, id) in &it.documents {
            let _ = writeln!(out, "- **{}:** {}", name, id);
        }
        for f in &it.failures {
            let _ = writeln!(out, "- **Failed {}** ({}): {}", f.stage, f.kind, f.message);
        }
        let _ = writeln!(out, "- **Duration:** {:.2} seconds\n", it.duration_ms as f64 / 1000.0);
    }

    if let Some(steering) = &run.steering {
        let _ = writeln!(out, "## Steering\n");
        let _ = writeln!(out, "**Next Steps:** {}", steering.next_steps);
        if let Some(focus) = &steering.focus_area {
            let _ = writeln!(out, "**Next Focus Area:** {}", focus);
        }
        let _ = writeln!(out, "**Terminal:** {}", steering.terminal);
        for f in &steering.failures {
            let _ = writeln!(out, "- **Failed {}** ({}): {}", f.stage, f.kind, f.message);
        }
    }

    out
}
