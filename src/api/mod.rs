// Remote analysis service client module
//
// - Authentication (x-goog-api-key)
// - Resumable chunked upload and status polling
// - Analysis request (generateContent)

pub mod analysis;
pub mod auth;
pub mod client;
pub mod error;
pub mod types;
pub mod upload;

pub use analysis::AnalysisRequestDriver;
pub use auth::AuthManager;
pub use client::ApiClient;
pub use upload::{ChunkedUploader, UploadOptions};
