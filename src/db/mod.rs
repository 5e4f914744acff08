pub mod configurations;
pub mod hka_responses;
pub mod submissions;
