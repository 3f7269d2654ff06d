pub mod activity;
pub mod domain;
pub mod error;
pub mod grading;
pub mod graph;
pub mod indexes;
pub mod ports;

pub use domain::{
    AssignedTraining, Candidate, Chapter, IndexNode, Question, SessionLog, Test, TestResult,
    TestStatus, Training, TrainingStatus, VisitedTraining,
};
pub use error::{DomainError, DomainResult};
pub use ports::{PortError, PortResult, StorageService, Versioned};
