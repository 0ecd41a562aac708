//! Consultation recording: an encounter with dependent sections.
//!
//! An encounter must exist before its vitals, diagnosis or clinical note
//! can be saved, because each of those records carries the encounter's id.
//! The ordering rules live in [`SequentialWorkflow`]; this module supplies
//! the step definitions and the HTTP persistence behind them.

use serde_json::Value;

use hmc_core::error::{ServiceError, ServiceResult};
use hmc_core::workflow::{SequentialWorkflow, StepDef, StepLoader, StepSaver, WorkflowError};

use crate::http::{extract_id, ApiClient};

pub const ENCOUNTER: &str = "encounter";
pub const VITALS: &str = "vitals";
pub const DIAGNOSIS: &str = "diagnosis";
pub const CLINICAL_NOTE: &str = "clinical_note";

const STEPS: &[StepDef] = &[
    StepDef::root(ENCOUNTER),
    StepDef::child_of(VITALS, ENCOUNTER),
    StepDef::child_of(DIAGNOSIS, ENCOUNTER),
    StepDef::child_of(CLINICAL_NOTE, ENCOUNTER),
];

/// A fresh consultation session. Vitals, diagnosis and clinical note are
/// siblings and may be saved in any order once the encounter exists.
pub fn consultation_workflow() -> SequentialWorkflow {
    // The step table is a constant with the root defined first, so
    // construction cannot fail.
    match SequentialWorkflow::new(STEPS) {
        Ok(workflow) => workflow,
        Err(_) => unreachable!(),
    }
}

fn step_path(step: &str) -> Result<&'static str, WorkflowError> {
    match step {
        ENCOUNTER => Ok("encounters"),
        VITALS => Ok("vitals"),
        DIAGNOSIS => Ok("diagnoses"),
        CLINICAL_NOTE => Ok("clinical-notes"),
        other => Err(WorkflowError::UnknownStep(other.to_string())),
    }
}

#[derive(Clone)]
pub struct Consultations {
    client: ApiClient,
}

impl ApiClient {
    pub fn consultations(&self) -> Consultations {
        Consultations {
            client: self.clone(),
        }
    }
}

impl StepSaver for Consultations {
    async fn create(
        &self,
        step: &str,
        parent_id: Option<&str>,
        payload: &Value,
    ) -> ServiceResult<String> {
        let path = step_path(step).map_err(|_| ServiceError::NotFound {
            entity: "workflow step",
            id: step.to_string(),
        })?;

        // Child records carry their encounter's id in the body.
        let mut body = payload.clone();
        if let (Some(encounter_id), Some(object)) = (parent_id, body.as_object_mut()) {
            object.insert("encounter_id".into(), Value::String(encounter_id.to_string()));
        }

        let response = self.client.post(path, &body).await?;
        extract_id(&response)
    }

    async fn update(&self, step: &str, record_id: &str, payload: &Value) -> ServiceResult<()> {
        let path = step_path(step).map_err(|_| ServiceError::NotFound {
            entity: "workflow step",
            id: step.to_string(),
        })?;
        self.client
            .put(&format!("{path}/{record_id}"), payload)
            .await
            .map(|_| ())
    }
}

impl StepLoader for Consultations {
    /// Fetches the child record under an encounter. A 404 means the section
    /// was never saved, which is a normal state when re-opening.
    async fn load(&self, step: &str, parent_id: &str) -> ServiceResult<Option<(String, Value)>> {
        let path = step_path(step).map_err(|_| ServiceError::NotFound {
            entity: "workflow step",
            id: step.to_string(),
        })?;
        let result = self
            .client
            .get_detail(path, &format!("encounters/{parent_id}"), path)
            .await;
        match result {
            Ok(value) => {
                let id = extract_id(&value)?;
                Ok(Some((id, value)))
            }
            Err(ServiceError::NotFound { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
