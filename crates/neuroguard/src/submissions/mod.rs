//! Form submissions: storage, scoring with advice, and the HTTP surface.

pub mod form;
pub mod repository;
pub mod router;
pub mod service;
pub mod sqlite;

pub use form::{canonical_form, FORM_FIELDS};
pub use repository::{
    StorageError, SubmissionRecord, SubmissionRepository, SubmissionView, DEFAULT_USER,
};
pub use router::{submission_router, NO_RESULT_SUGGESTION};
pub use service::{SubmissionError, SubmissionOutcome, SubmissionService, RESULTS_REDIRECT};
pub use sqlite::SqliteSubmissionRepository;
