// Re-export chrono for downstream crates that need DateTime types
pub use chrono;

pub mod config;
pub mod corpus;
pub mod domain;
pub mod errors;
pub mod planning;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use corpus::{CorpusError, CorpusStore, PhilosophyDoc, SessionTemplate, StructureDoc};
pub use domain::athlete::{AthleteProfile, Units, UserId};
pub use domain::conversation::{
    Conversation, ConversationId, ConversationStatus, Message, Progress, Sender, TargetAction,
};
pub use domain::link::{Activity, LinkStatus, SessionLink};
pub use domain::plan::{MacroWeek, Phase, PlanningContext};
pub use domain::session::{
    DayModification, MaterializedSession, PrimaryMetric, SessionIntent, Sport, StepType,
    WorkoutStep,
};
pub use domain::slot::{RaceDistance, SlotOutcome, SlotValue};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use planning::{PipelineError, PlanOutcome, PlanningPipeline};
