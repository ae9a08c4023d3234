pub mod classifier;
pub mod controller;
pub mod conversation;
pub mod extractor;
pub mod llm;
pub mod validators;

pub use classifier::{
    is_executable_request, is_execution_confirmation, CompletionClassifier, KeywordClassifier,
    TargetClassifier,
};
pub use controller::{
    ExecutionController, ResponseKind, TurnError, TurnRequest, TurnResponse,
};
pub use conversation::{summarize_context, ContextMessage, ConversationClient, LoadedProgress};
pub use extractor::{AttributeExtractor, ExtractionRequest, ExtractionResult};
pub use llm::{ScriptedCompletion, StructuredCompletion};
pub use validators::{validate_decision, DecisionView, ValidatorConfig};
