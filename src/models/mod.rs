pub mod configuration;
pub mod hka_response;
pub mod invoice_submission;

pub use configuration::Configuration;
pub use hka_response::HkaResponseRecord;
pub use invoice_submission::{InvoiceSubmission, SubmissionSource, SubmissionStatus};
