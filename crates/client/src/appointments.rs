//! Appointment scheduling.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use hmc_core::error::ServiceResult;
use hmc_core::form::{str_field, DraftBackend, EntityDraft};
use hmc_core::list::ListFetcher;
use hmc_core::query::{ListPage, ListQuery};
use hmc_core::validate::{require, ValidationErrors};

use crate::http::{extract_id, ApiClient};

const PATH: &str = "appointments";

#[derive(Debug, Clone, PartialEq)]
pub struct Appointment {
    pub id: String,
    pub patient_id: String,
    pub doctor_name: String,
    pub department: String,
    /// Absent or unparsable timestamps stay `None`; the row still renders.
    pub scheduled_at: Option<DateTime<Utc>>,
    pub status: String,
    pub reason: String,
}

impl Appointment {
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = str_field(value, "id");
        if id.is_empty() {
            tracing::warn!("skipping appointment row without id");
            return None;
        }
        let scheduled_at = value
            .get("scheduled_at")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok());
        Some(Self {
            id,
            patient_id: str_field(value, "patient_id"),
            doctor_name: str_field(value, "doctor_name"),
            department: str_field(value, "department"),
            scheduled_at,
            status: str_field(value, "status"),
            reason: str_field(value, "reason"),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppointmentDraft {
    pub patient_id: String,
    pub doctor_name: String,
    pub department: String,
    pub scheduled_at: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct CreateAppointment {
    pub patient_id: String,
    pub doctor_name: String,
    pub department: String,
    pub scheduled_at: String,
    pub reason: String,
}

/// Reschedule/amend payload; the patient on an appointment never changes.
#[derive(Debug, Serialize)]
pub struct UpdateAppointment {
    pub doctor_name: String,
    pub department: String,
    pub scheduled_at: String,
    pub reason: String,
}

impl EntityDraft for AppointmentDraft {
    type Create = CreateAppointment;
    type Update = UpdateAppointment;
    const ENTITY: &'static str = "appointment";

    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "patient_id", &self.patient_id);
        require(&mut errors, "doctor_name", &self.doctor_name);
        require(&mut errors, "scheduled_at", &self.scheduled_at);
        errors
    }

    fn create_payload(&self) -> CreateAppointment {
        CreateAppointment {
            patient_id: self.patient_id.clone(),
            doctor_name: self.doctor_name.clone(),
            department: self.department.clone(),
            scheduled_at: self.scheduled_at.clone(),
            reason: self.reason.clone(),
        }
    }

    fn update_payload(&self) -> UpdateAppointment {
        UpdateAppointment {
            doctor_name: self.doctor_name.clone(),
            department: self.department.clone(),
            scheduled_at: self.scheduled_at.clone(),
            reason: self.reason.clone(),
        }
    }

    fn hydrate(value: &Value) -> Self {
        Self {
            patient_id: str_field(value, "patient_id"),
            doctor_name: str_field(value, "doctor_name"),
            department: str_field(value, "department"),
            scheduled_at: str_field(value, "scheduled_at"),
            reason: str_field(value, "reason"),
        }
    }
}

#[derive(Clone)]
pub struct Appointments {
    client: ApiClient,
}

impl ApiClient {
    pub fn appointments(&self) -> Appointments {
        Appointments {
            client: self.clone(),
        }
    }
}

impl Appointments {
    pub async fn list(&self, query: &ListQuery) -> ServiceResult<ListPage<Appointment>> {
        Ok(self
            .client
            .get_list(PATH, query)
            .await?
            .filter_map_rows(|value| Appointment::from_value(&value)))
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Value> {
        self.client
            .get_detail(AppointmentDraft::ENTITY, PATH, id)
            .await
    }

    pub async fn create(&self, payload: &CreateAppointment) -> ServiceResult<String> {
        let response = self.client.post(PATH, payload).await?;
        extract_id(&response)
    }

    pub async fn update(&self, id: &str, payload: &UpdateAppointment) -> ServiceResult<()> {
        self.client.put(&format!("{PATH}/{id}"), payload).await.map(|_| ())
    }

    /// Cancels an appointment (soft delete).
    pub async fn cancel(&self, id: &str) -> ServiceResult<()> {
        self.client.delete(PATH, id).await
    }

    pub async fn restore(&self, id: &str) -> ServiceResult<()> {
        self.client.restore(PATH, id).await
    }
}

impl ListFetcher for Appointments {
    type Row = Appointment;

    async fn fetch_page(&self, query: &ListQuery) -> ServiceResult<ListPage<Appointment>> {
        self.list(query).await
    }
}

impl DraftBackend<AppointmentDraft> for Appointments {
    async fn fetch(&self, id: &str) -> ServiceResult<Value> {
        self.get(id).await
    }

    async fn create(&self, payload: &CreateAppointment) -> ServiceResult<String> {
        Appointments::create(self, payload).await
    }

    async fn update(&self, id: &str, payload: &UpdateAppointment) -> ServiceResult<()> {
        Appointments::update(self, id, payload).await
    }
}
