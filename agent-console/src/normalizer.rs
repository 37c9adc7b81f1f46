//! Event stream normalizer
//!
//! Folds the completion stream of one agent invocation into the answer text,
//! the ordered citation list, and the raw trace bucket. Events are consumed
//! in arrival order in a single pass.

use shared_types::{
    Citation, RawTraceBucket, StreamEvent, TraceFragment, TracePart, TracePhase,
    GUARDRAIL_TRACE_KEY,
};

/// Phase keys recognised on the wire, in the order they are inspected.
const WIRE_PHASE_KEYS: [&str; 4] = [
    GUARDRAIL_TRACE_KEY,
    "preProcessingTrace",
    "orchestrationTrace",
    "postProcessingTrace",
];

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("Chunk {index} is not valid UTF-8: {source}")]
    InvalidUtf8 {
        index: usize,
        #[source]
        source: std::string::FromUtf8Error,
    },
}

/// Fully drained result of one invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvocationOutput {
    pub output_text: String,
    pub citations: Vec<Citation>,
    pub trace: RawTraceBucket,
}

/// Incremental normalizer. State is scoped to one invocation.
#[derive(Debug, Default)]
pub struct StreamNormalizer {
    output: InvocationOutput,
    chunks_seen: usize,
    guardrail_seen: bool,
}

impl StreamNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: StreamEvent) -> Result<(), NormalizeError> {
        match event {
            StreamEvent::Chunk(part) => {
                let index = self.chunks_seen;
                self.chunks_seen += 1;
                let text = String::from_utf8(part.bytes)
                    .map_err(|source| NormalizeError::InvalidUtf8 { index, source })?;
                self.output.output_text.push_str(&text);
                if let Some(attribution) = part.attribution {
                    self.output.citations.extend(attribution.citations);
                }
            }
            StreamEvent::Trace(part) => self.push_trace(part),
        }
        Ok(())
    }

    fn push_trace(&mut self, mut part: TracePart) {
        for key in WIRE_PHASE_KEYS {
            let Some(fragment) = part.trace.remove(key) else {
                continue;
            };
            let phase = self.resolve_phase(key);
            self.output.trace.push(phase, TraceFragment(fragment));
        }
    }

    fn resolve_phase(&mut self, key: &str) -> TracePhase {
        match key {
            GUARDRAIL_TRACE_KEY if !self.guardrail_seen => {
                self.guardrail_seen = true;
                TracePhase::PreGuardrail
            }
            GUARDRAIL_TRACE_KEY => TracePhase::PostGuardrail,
            "preProcessingTrace" => TracePhase::PreProcessing,
            "orchestrationTrace" => TracePhase::Orchestration,
            _ => TracePhase::PostProcessing,
        }
    }

    pub fn finish(self) -> InvocationOutput {
        tracing::debug!(
            chunks = self.chunks_seen,
            citations = self.output.citations.len(),
            trace_fragments = self.output.trace.fragment_count(),
            "Completion stream drained"
        );
        self.output
    }
}

/// Normalize a complete event sequence. A malformed chunk aborts the whole
/// invocation; nothing partial is returned.
pub fn normalize<I>(events: I) -> Result<InvocationOutput, NormalizeError>
where
    I: IntoIterator<Item = StreamEvent>,
{
    let mut normalizer = StreamNormalizer::new();
    for event in events {
        normalizer.push(event)?;
    }
    Ok(normalizer.finish())
}
