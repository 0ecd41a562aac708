//! Patient records.

use serde::Serialize;
use serde_json::Value;

use hmc_core::error::ServiceResult;
use hmc_core::form::{bool_field, str_field, DraftBackend, EntityDraft};
use hmc_core::list::ListFetcher;
use hmc_core::query::{ListPage, ListQuery};
use hmc_core::validate::{require, require_email, ValidationErrors};

use crate::http::{extract_id, ApiClient};

const PATH: &str = "patients";

/// One patient row as shown in the register.
#[derive(Debug, Clone, PartialEq)]
pub struct Patient {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub gender: String,
    pub date_of_birth: String,
    pub address: String,
    pub is_active: bool,
}

impl Patient {
    /// Decodes one row defensively; a record without an id is dropped.
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = str_field(value, "id");
        if id.is_empty() {
            tracing::warn!("skipping patient row without id");
            return None;
        }
        Some(Self {
            id,
            first_name: str_field(value, "first_name"),
            last_name: str_field(value, "last_name"),
            email: str_field(value, "email"),
            phone: str_field(value, "phone"),
            gender: str_field(value, "gender"),
            date_of_birth: str_field(value, "date_of_birth"),
            address: str_field(value, "address"),
            is_active: bool_field(value, "is_active"),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Draft for the patient registration/edit form.
#[derive(Debug, Clone, Default)]
pub struct PatientDraft {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub gender: String,
    pub date_of_birth: String,
    pub address: String,
    pub national_id: String,
}

#[derive(Debug, Serialize)]
pub struct CreatePatient {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub gender: String,
    pub date_of_birth: String,
    pub address: String,
    /// Captured once at registration.
    pub national_id: String,
}

/// Update payload; the national id is fixed at registration and has no
/// update-side counterpart.
#[derive(Debug, Serialize)]
pub struct UpdatePatient {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub gender: String,
    pub date_of_birth: String,
    pub address: String,
}

impl EntityDraft for PatientDraft {
    type Create = CreatePatient;
    type Update = UpdatePatient;
    const ENTITY: &'static str = "patient";

    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "first_name", &self.first_name);
        require(&mut errors, "last_name", &self.last_name);
        require_email(&mut errors, "email", &self.email);
        require(&mut errors, "date_of_birth", &self.date_of_birth);
        errors
    }

    fn create_payload(&self) -> CreatePatient {
        CreatePatient {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            gender: self.gender.clone(),
            date_of_birth: self.date_of_birth.clone(),
            address: self.address.clone(),
            national_id: self.national_id.clone(),
        }
    }

    fn update_payload(&self) -> UpdatePatient {
        UpdatePatient {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            gender: self.gender.clone(),
            date_of_birth: self.date_of_birth.clone(),
            address: self.address.clone(),
        }
    }

    fn hydrate(value: &Value) -> Self {
        Self {
            first_name: str_field(value, "first_name"),
            last_name: str_field(value, "last_name"),
            email: str_field(value, "email"),
            phone: str_field(value, "phone"),
            gender: str_field(value, "gender"),
            date_of_birth: str_field(value, "date_of_birth"),
            address: str_field(value, "address"),
            national_id: str_field(value, "national_id"),
        }
    }
}

/// Service wrapper for the patients resource.
#[derive(Clone)]
pub struct Patients {
    client: ApiClient,
}

impl ApiClient {
    pub fn patients(&self) -> Patients {
        Patients {
            client: self.clone(),
        }
    }
}

impl Patients {
    pub async fn list(&self, query: &ListQuery) -> ServiceResult<ListPage<Patient>> {
        Ok(self
            .client
            .get_list(PATH, query)
            .await?
            .filter_map_rows(|value| Patient::from_value(&value)))
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Value> {
        self.client.get_detail(PatientDraft::ENTITY, PATH, id).await
    }

    pub async fn create(&self, payload: &CreatePatient) -> ServiceResult<String> {
        let response = self.client.post(PATH, payload).await?;
        extract_id(&response)
    }

    pub async fn update(&self, id: &str, payload: &UpdatePatient) -> ServiceResult<()> {
        self.client.put(&format!("{PATH}/{id}"), payload).await.map(|_| ())
    }

    pub async fn remove(&self, id: &str) -> ServiceResult<()> {
        self.client.delete(PATH, id).await
    }

    pub async fn restore(&self, id: &str) -> ServiceResult<()> {
        self.client.restore(PATH, id).await
    }
}

impl ListFetcher for Patients {
    type Row = Patient;

    async fn fetch_page(&self, query: &ListQuery) -> ServiceResult<ListPage<Patient>> {
        self.list(query).await
    }
}

impl DraftBackend<PatientDraft> for Patients {
    async fn fetch(&self, id: &str) -> ServiceResult<Value> {
        self.get(id).await
    }

    async fn create(&self, payload: &CreatePatient) -> ServiceResult<String> {
        Patients::create(self, payload).await
    }

    async fn update(&self, id: &str, payload: &UpdatePatient) -> ServiceResult<()> {
        Patients::update(self, id, payload).await
    }
}
