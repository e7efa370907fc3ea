use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Pipeline stage a task runs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum IngestStage {
    Validate,
    Preview,
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestStage::Validate => write!(f, "validate"),
            IngestStage::Preview => write!(f, "preview"),
        }
    }
}

/// One unit of background work for a file job.
///
/// `attempt` pins the task to the job pass it was created for; handlers drop
/// the task when the job has since been retried.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IngestTask {
    pub id: Uuid,
    pub job_id: Uuid,
    pub attempt: u32,
    pub stage: IngestStage,
    pub enqueued_at: DateTime<Utc>,
}

impl IngestTask {
    pub fn new(job_id: Uuid, attempt: u32, stage: IngestStage) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_id,
            attempt,
            stage,
            enqueued_at: Utc::now(),
        }
    }

    /// Follow-up task for the same job pass.
    pub fn next_stage(&self, stage: IngestStage) -> Self {
        Self::new(self.job_id, self.attempt, stage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_stage_keeps_job_and_attempt() {
        let job_id = Uuid::new_v4();
        let task = IngestTask::new(job_id, 3, IngestStage::Validate);
        let next = task.next_stage(IngestStage::Preview);
        assert_eq!(next.job_id, job_id);
        assert_eq!(next.attempt, 3);
        assert_eq!(next.stage, IngestStage::Preview);
        assert_ne!(next.id, task.id);
    }

    #[test]
    fn stage_display() {
        assert_eq!(IngestStage::Validate.to_string(), "validate");
        assert_eq!(IngestStage::Preview.to_string(), "preview");
    }
}
