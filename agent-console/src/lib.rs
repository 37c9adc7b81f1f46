//! Agent console - chat front-end for a hosted LLM agent
//!
//! Turns the agent's completion stream into a transcript message with
//! rendered citations and a grouped, numbered trace panel.

pub mod agent_client;
pub mod api;
pub mod app_state;
pub mod citations;
pub mod config;
pub mod normalizer;
pub mod session;
pub mod trace;
pub mod transcript;
