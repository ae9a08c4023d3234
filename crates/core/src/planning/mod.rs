pub mod guards;
pub mod macro_plan;
pub mod philosophy;
pub mod pipeline;
pub mod session_text;
pub mod structure;
pub mod templates;
pub mod volume;

pub use guards::{PipelineError, Stage};
pub use macro_plan::{build_macro_plan, phase_for_week};
pub use philosophy::{select_philosophy, PhilosophyRanking, PhilosophySelection};
pub use pipeline::{
    ConflictRecord, PlanOutcome, PlanWriteReport, PlannedSessionWriter, PlanningPipeline,
    SeasonContext, WeekContext,
};
pub use session_text::{
    deterministic_text, generate_with_fallback, validate_session_text,
    DeterministicTextGenerator, SessionText, SessionTextGenerator,
};
pub use structure::{load_structures, structure_for_week};
pub use templates::materialize_week;
pub use volume::{allocate_week, DayAllocation};
