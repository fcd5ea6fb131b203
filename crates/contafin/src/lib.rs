pub mod assistant;
pub mod config;
pub mod llm;
pub mod scheduler;
pub mod server;
pub mod spreadsheet;
pub mod state;
pub mod storage;
