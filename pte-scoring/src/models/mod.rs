//! Data models for pte-scoring

pub mod attempt;
pub mod progress;

pub use attempt::{
    Attempt, AttemptPage, AttemptTimings, ListAttemptsQuery, PollStatus, ScoringStatus,
    SubmitAttempt, TimeInterval,
};
pub use progress::{ProgressRecord, SkillResultInput};
