use shared_types::{TraceFragment, TracePhase};

/// Info sub-type members a phase fragment may carry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoSubType {
    InvocationInput,
    ModelInvocationInput,
    ModelInvocationOutput,
    Observation,
    Rationale,
}

impl InfoSubType {
    pub fn key(self) -> &'static str {
        match self {
            InfoSubType::InvocationInput => "invocationInput",
            InfoSubType::ModelInvocationInput => "modelInvocationInput",
            InfoSubType::ModelInvocationOutput => "modelInvocationOutput",
            InfoSubType::Observation => "observation",
            InfoSubType::Rationale => "rationale",
        }
    }
}

const PRE_PROCESSING_SUB_TYPES: &[InfoSubType] = &[
    InfoSubType::ModelInvocationInput,
    InfoSubType::ModelInvocationOutput,
];

const ORCHESTRATION_SUB_TYPES: &[InfoSubType] = &[
    InfoSubType::InvocationInput,
    InfoSubType::ModelInvocationInput,
    InfoSubType::ModelInvocationOutput,
    InfoSubType::Observation,
    InfoSubType::Rationale,
];

const POST_PROCESSING_SUB_TYPES: &[InfoSubType] = &[
    InfoSubType::ModelInvocationInput,
    InfoSubType::ModelInvocationOutput,
    InfoSubType::Observation,
];

/// Sub-type priority list of a phase. `None` for guardrail phases, whose
/// fragments carry their `traceId` directly.
pub fn info_sub_types(phase: TracePhase) -> Option<&'static [InfoSubType]> {
    match phase {
        TracePhase::PreProcessing => Some(PRE_PROCESSING_SUB_TYPES),
        TracePhase::Orchestration => Some(ORCHESTRATION_SUB_TYPES),
        TracePhase::PostProcessing => Some(POST_PROCESSING_SUB_TYPES),
        TracePhase::PreGuardrail | TracePhase::PostGuardrail => None,
    }
}

/// How a fragment joins a step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKey {
    /// Joins the step sharing this id (absent id groups with other absent ids)
    Shared(Option<String>),
    /// Forms a step of its own
    Singleton(Option<String>),
    /// No recognised sub-type; not part of any step
    Unrecognized,
}

/// Classify a fragment of `phase` by the first present sub-type in priority order.
pub fn step_key(phase: TracePhase, fragment: &TraceFragment) -> StepKey {
    let Some(sub_types) = info_sub_types(phase) else {
        return StepKey::Singleton(fragment.own_trace_id().map(str::to_string));
    };

    sub_types
        .iter()
        .find_map(|sub_type| fragment.sub_type_trace_id(sub_type.key()))
        .map(|trace_id| StepKey::Shared(trace_id.map(str::to_string)))
        .unwrap_or(StepKey::Unrecognized)
}
