//! Conversation accumulator for the text pipeline
//!
//! Holds the symptom utterances accepted in the current session and decides,
//! per message, whether to accept it and what ranking to report.

pub mod accumulator;
pub mod gate;
pub mod models;

pub use accumulator::{ConversationAccumulator, ReplyConfig};
pub use gate::{GateDecision, GatePolicy};
pub use models::{python_list_repr, OutcomeEnvelope, RankedPrediction};
