pub mod orchestrator;
pub mod stage;
pub mod storage;
pub mod types;
