use std::collections::HashMap;

use serde_json::Value;
use shared_types::{RawTraceBucket, TraceFragment, TracePhase, TraceSection, TraceStep, TraceView};

use super::classify::{step_key, StepKey};

/// A display section and the phases it shows, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionLayout {
    pub title: String,
    pub phases: Vec<TracePhase>,
}

impl SectionLayout {
    pub fn new(title: impl Into<String>, phases: &[TracePhase]) -> Self {
        Self {
            title: title.into(),
            phases: phases.to_vec(),
        }
    }
}

/// Display grouping of the trace panel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceLayout {
    pub sections: Vec<SectionLayout>,
}

impl Default for TraceLayout {
    /// Pre-Processing, Orchestration and Post-Processing, guardrails on the outside.
    fn default() -> Self {
        Self {
            sections: vec![
                SectionLayout::new(
                    "Pre-Processing",
                    &[TracePhase::PreGuardrail, TracePhase::PreProcessing],
                ),
                SectionLayout::new("Orchestration", &[TracePhase::Orchestration]),
                SectionLayout::new(
                    "Post-Processing",
                    &[TracePhase::PostProcessing, TracePhase::PostGuardrail],
                ),
            ],
        }
    }
}

struct PendingStep {
    trace_id: Option<String>,
    fragments: Vec<Value>,
}

/// Group one phase's fragments into steps, in first-seen order of their key.
fn group_phase(phase: TracePhase, fragments: &[TraceFragment]) -> Vec<PendingStep> {
    let mut steps: Vec<PendingStep> = Vec::new();
    let mut index_by_id: HashMap<Option<String>, usize> = HashMap::new();

    for fragment in fragments {
        match step_key(phase, fragment) {
            StepKey::Shared(trace_id) => match index_by_id.get(&trace_id) {
                Some(&index) => steps[index].fragments.push(fragment.0.clone()),
                None => {
                    index_by_id.insert(trace_id.clone(), steps.len());
                    steps.push(PendingStep {
                        trace_id,
                        fragments: vec![fragment.0.clone()],
                    });
                }
            },
            StepKey::Singleton(trace_id) => {
                let mut wrapped = serde_json::Map::new();
                wrapped.insert(phase.key().to_string(), fragment.0.clone());
                steps.push(PendingStep {
                    trace_id,
                    fragments: vec![Value::Object(wrapped)],
                });
            }
            StepKey::Unrecognized => {
                tracing::debug!(%phase, "Dropping trace fragment with no recognised sub-type");
            }
        }
    }

    steps
}

/// Build the trace panel. Step numbers start at 1 and keep counting across
/// sections. A section whose phases are all absent is kept, with no steps.
pub fn group_trace(bucket: &RawTraceBucket, layout: &TraceLayout) -> TraceView {
    let mut next_number: u32 = 1;
    let mut sections = Vec::with_capacity(layout.sections.len());

    for section in &layout.sections {
        let mut steps = Vec::new();
        for &phase in &section.phases {
            let Some(fragments) = bucket.get(phase) else {
                continue;
            };
            for pending in group_phase(phase, fragments) {
                steps.push(TraceStep {
                    number: next_number,
                    phase,
                    trace_id: pending.trace_id,
                    fragments: pending.fragments,
                });
                next_number += 1;
            }
        }
        sections.push(TraceSection {
            title: section.title.clone(),
            steps,
        });
    }

    TraceView { sections }
}
