use std::io::Write;

use council_stream::{Stage, StageObserver, StageState, StreamEvent};

/// One progress line for an applied event, or `None` for events with
/// nothing to show.
pub fn describe(event: &StreamEvent) -> Option<String> {
    let line = match event {
        StreamEvent::Stage1Start => format!("{}: collecting individual responses", Stage::One),
        StreamEvent::Stage1Response { model, response } => {
            format!("  {model} answered ({} chars)", response.chars().count())
        }
        StreamEvent::Stage2Start => format!("{}: peer review", Stage::Two),
        StreamEvent::Stage2Review {
            reviewer, target, ..
        } => format!("  {reviewer} reviewed {target}"),
        StreamEvent::Stage3Start => format!("{}: chairman synthesis", Stage::Three),
        StreamEvent::Stage3Response { model, .. } => format!("  {model} wrote the final answer"),
        StreamEvent::Error { message } => format!("error: {message}"),
        StreamEvent::Done => "done".to_string(),
        StreamEvent::Unknown => return None,
    };
    Some(line)
}

/// Prints live progress to a writer (stderr in the binary).
pub struct ProgressPrinter<W> {
    out: W,
    council: Vec<String>,
}

impl<W: Write> ProgressPrinter<W> {
    pub fn new(out: W, council: Vec<String>) -> Self {
        Self { out, council }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> StageObserver for ProgressPrinter<W> {
    fn on_event(&mut self, event: &StreamEvent, state: &StageState) {
        let Some(line) = describe(event) else {
            return;
        };
        let _ = writeln!(self.out, "{line}");
        if matches!(event, StreamEvent::Stage1Response { .. }) && !self.council.is_empty() {
            let pending = state.pending_stage1(&self.council);
            if !pending.is_empty() {
                let _ = writeln!(self.out, "  waiting on: {}", pending.join(", "));
            }
        }
    }
}

/// Human-readable summary printed after the stream ends.
pub fn summary(state: &StageState) -> String {
    let mut out = String::new();
    if let Some(answer) = state.stage3() {
        out.push_str(&format!("Final answer ({}):\n{}\n", answer.model, answer.response));
    } else if !state.stage1().is_empty() {
        out.push_str("No final answer. Individual responses:\n");
        for (model, response) in state.stage1() {
            out.push_str(&format!("\n[{model}]\n{response}\n"));
        }
    }
    if let Some(detail) = state.error_detail() {
        out.push_str(&format!("Failed: {detail}\n"));
    }
    out
}
