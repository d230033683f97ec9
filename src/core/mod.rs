pub mod agent;
pub mod brain;
pub mod error;
pub mod images;
pub mod llm;
pub mod mission;
pub mod orchestrator;
pub mod store;
pub mod terminal;
pub mod tools;
