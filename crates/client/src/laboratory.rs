//! Lab test catalogue, test orders and results.

use serde::Serialize;
use serde_json::Value;

use hmc_core::error::ServiceResult;
use hmc_core::form::{num_field, str_field};
use hmc_core::list::ListFetcher;
use hmc_core::query::{ListPage, ListQuery};

use crate::http::{extract_id, ApiClient};

const TESTS_PATH: &str = "lab-tests";
const ORDERS_PATH: &str = "lab-test-orders";

#[derive(Debug, Clone, PartialEq)]
pub struct LabTest {
    pub id: String,
    pub name: String,
    pub sample_type: String,
    pub price: f64,
}

impl LabTest {
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = str_field(value, "id");
        if id.is_empty() {
            tracing::warn!("skipping lab test row without id");
            return None;
        }
        Some(Self {
            id,
            name: str_field(value, "name"),
            sample_type: str_field(value, "sample_type"),
            price: num_field(value, "price"),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabTestOrder {
    pub id: String,
    pub patient_id: String,
    pub status: String,
    pub ordered_at: String,
}

impl LabTestOrder {
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = str_field(value, "id");
        if id.is_empty() {
            tracing::warn!("skipping lab order row without id");
            return None;
        }
        Some(Self {
            id,
            patient_id: str_field(value, "patient_id"),
            status: str_field(value, "status"),
            ordered_at: str_field(value, "ordered_at"),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct CreateLabTestOrder {
    pub patient_id: String,
    /// Catalogue ids of the ordered tests.
    pub test_ids: Vec<String>,
    pub notes: String,
}

/// A technician's result entry for one test on an order.
#[derive(Debug, Serialize)]
pub struct LabResultEntry {
    pub test_id: String,
    pub value: String,
    pub unit: String,
    pub flag: String,
}

#[derive(Clone)]
pub struct LabTests {
    client: ApiClient,
}

#[derive(Clone)]
pub struct LabTestOrders {
    client: ApiClient,
}

impl ApiClient {
    pub fn lab_tests(&self) -> LabTests {
        LabTests {
            client: self.clone(),
        }
    }

    pub fn lab_test_orders(&self) -> LabTestOrders {
        LabTestOrders {
            client: self.clone(),
        }
    }
}

impl LabTests {
    pub async fn list(&self, query: &ListQuery) -> ServiceResult<ListPage<LabTest>> {
        Ok(self
            .client
            .get_list(TESTS_PATH, query)
            .await?
            .filter_map_rows(|value| LabTest::from_value(&value)))
    }
}

impl LabTestOrders {
    pub async fn list(&self, query: &ListQuery) -> ServiceResult<ListPage<LabTestOrder>> {
        Ok(self
            .client
            .get_list(ORDERS_PATH, query)
            .await?
            .filter_map_rows(|value| LabTestOrder::from_value(&value)))
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Value> {
        self.client.get_detail("lab test order", ORDERS_PATH, id).await
    }

    pub async fn create(&self, payload: &CreateLabTestOrder) -> ServiceResult<String> {
        let response = self.client.post(ORDERS_PATH, payload).await?;
        extract_id(&response)
    }

    /// Records a result against an order. The console only offers this to
    /// roles with the `EnterLabResults` capability; the server enforces it
    /// regardless.
    pub async fn add_result(&self, order_id: &str, entry: &LabResultEntry) -> ServiceResult<()> {
        self.client
            .post(&format!("{ORDERS_PATH}/{order_id}/results"), entry)
            .await
            .map(|_| ())
    }

    pub async fn cancel(&self, id: &str) -> ServiceResult<()> {
        self.client.delete(ORDERS_PATH, id).await
    }
}

impl ListFetcher for LabTests {
    type Row = LabTest;

    async fn fetch_page(&self, query: &ListQuery) -> ServiceResult<ListPage<LabTest>> {
        self.list(query).await
    }
}

impl ListFetcher for LabTestOrders {
    type Row = LabTestOrder;

    async fn fetch_page(&self, query: &ListQuery) -> ServiceResult<ListPage<LabTestOrder>> {
        self.list(query).await
    }
}
