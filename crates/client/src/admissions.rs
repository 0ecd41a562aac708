//! Ward beds and inpatient admissions.

use serde::Serialize;
use serde_json::Value;

use hmc_core::error::ServiceResult;
use hmc_core::form::{bool_field, str_field};
use hmc_core::list::ListFetcher;
use hmc_core::query::{ListPage, ListQuery};

use crate::http::{extract_id, ApiClient};

const BEDS_PATH: &str = "beds";
const ADMISSIONS_PATH: &str = "admissions";

#[derive(Debug, Clone, PartialEq)]
pub struct Bed {
    pub id: String,
    pub name: String,
    pub ward: String,
    pub occupied: bool,
}

impl Bed {
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = str_field(value, "id");
        if id.is_empty() {
            tracing::warn!("skipping bed row without id");
            return None;
        }
        Some(Self {
            id,
            name: str_field(value, "name"),
            ward: str_field(value, "ward"),
            occupied: bool_field(value, "occupied"),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Admission {
    pub id: String,
    pub patient_id: String,
    pub bed_id: String,
    pub admitted_at: String,
    pub discharged_at: String,
    pub diagnosis_summary: String,
}

impl Admission {
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = str_field(value, "id");
        if id.is_empty() {
            tracing::warn!("skipping admission row without id");
            return None;
        }
        Some(Self {
            id,
            patient_id: str_field(value, "patient_id"),
            bed_id: str_field(value, "bed_id"),
            admitted_at: str_field(value, "admitted_at"),
            discharged_at: str_field(value, "discharged_at"),
            diagnosis_summary: str_field(value, "diagnosis_summary"),
        })
    }

    pub fn is_discharged(&self) -> bool {
        !self.discharged_at.is_empty()
    }
}

#[derive(Debug, Serialize)]
pub struct AdmitPatient {
    pub patient_id: String,
    pub bed_id: String,
    pub diagnosis_summary: String,
}

#[derive(Clone)]
pub struct Beds {
    client: ApiClient,
}

#[derive(Clone)]
pub struct Admissions {
    client: ApiClient,
}

impl ApiClient {
    pub fn beds(&self) -> Beds {
        Beds {
            client: self.clone(),
        }
    }

    pub fn admissions(&self) -> Admissions {
        Admissions {
            client: self.clone(),
        }
    }
}

impl Beds {
    pub async fn list(&self, query: &ListQuery) -> ServiceResult<ListPage<Bed>> {
        Ok(self
            .client
            .get_list(BEDS_PATH, query)
            .await?
            .filter_map_rows(|value| Bed::from_value(&value)))
    }
}

impl Admissions {
    pub async fn list(&self, query: &ListQuery) -> ServiceResult<ListPage<Admission>> {
        Ok(self
            .client
            .get_list(ADMISSIONS_PATH, query)
            .await?
            .filter_map_rows(|value| Admission::from_value(&value)))
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Value> {
        self.client.get_detail("admission", ADMISSIONS_PATH, id).await
    }

    pub async fn admit(&self, payload: &AdmitPatient) -> ServiceResult<String> {
        let response = self.client.post(ADMISSIONS_PATH, payload).await?;
        extract_id(&response)
    }

    /// Marks the admission discharged; the bed frees up server-side.
    pub async fn discharge(&self, id: &str) -> ServiceResult<()> {
        self.client
            .put(
                &format!("{ADMISSIONS_PATH}/{id}/discharge"),
                &serde_json::json!({}),
            )
            .await
            .map(|_| ())
    }
}

impl ListFetcher for Beds {
    type Row = Bed;

    async fn fetch_page(&self, query: &ListQuery) -> ServiceResult<ListPage<Bed>> {
        self.list(query).await
    }
}

impl ListFetcher for Admissions {
    type Row = Admission;

    async fn fetch_page(&self, query: &ListQuery) -> ServiceResult<ListPage<Admission>> {
        self.list(query).await
    }
}
