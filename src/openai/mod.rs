pub mod client;
#[cfg(test)]
pub(crate) mod fake;
pub mod models;

pub use client::{ApiError, AssistantsApi, HttpAssistantsClient};
