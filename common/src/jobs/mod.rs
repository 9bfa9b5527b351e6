use serde::{Deserialize, Serialize};

/// Status of a background processing job on the server.
///
/// `InProgress` carries the number of data rows handled so far; `Completed`
/// and `Failed` carry a human-readable summary or error message. Clients poll
/// `GET /api/status/{job_id}` and receive one of these.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    InProgress(u32),
    Completed(String),
    Failed(String),
}
