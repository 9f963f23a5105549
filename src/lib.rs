pub mod config;
pub mod conversation;
pub mod data_models;
pub mod error;
pub mod llm;
pub mod registry;
pub mod roles;
pub mod search;
