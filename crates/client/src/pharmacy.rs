//! Pharmacy: product catalogue, stock and billing.

use serde::Serialize;
use serde_json::Value;

use hmc_core::error::ServiceResult;
use hmc_core::form::{bool_field, num_field, str_field, DraftBackend, EntityDraft};
use hmc_core::list::ListFetcher;
use hmc_core::query::{ListPage, ListQuery};
use hmc_core::validate::{require, require_numeric, ValidationErrors};

use crate::http::{extract_id, ApiClient};

const PRODUCTS_PATH: &str = "products";
const STOCK_PATH: &str = "stock";
const BILLS_PATH: &str = "bills";

#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub sku: String,
    pub unit_price: f64,
    pub stock_qty: f64,
    pub is_active: bool,
}

impl Product {
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = str_field(value, "id");
        if id.is_empty() {
            tracing::warn!("skipping product row without id");
            return None;
        }
        Some(Self {
            id,
            name: str_field(value, "name"),
            sku: str_field(value, "sku"),
            unit_price: num_field(value, "unit_price"),
            stock_qty: num_field(value, "stock_qty"),
            is_active: bool_field(value, "is_active"),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProductDraft {
    pub name: String,
    pub sku: String,
    pub unit_price: String,
    pub reorder_level: String,
}

#[derive(Debug, Serialize)]
pub struct CreateProduct {
    pub name: String,
    pub sku: String,
    pub unit_price: String,
    pub reorder_level: String,
    /// Products typed in by hand during an inward entry are flagged so the
    /// catalogue can review them later.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub manual: bool,
}

#[derive(Debug, Serialize)]
pub struct UpdateProduct {
    pub name: String,
    pub unit_price: String,
    pub reorder_level: String,
}

impl EntityDraft for ProductDraft {
    type Create = CreateProduct;
    type Update = UpdateProduct;
    const ENTITY: &'static str = "product";

    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "name", &self.name);
        require_numeric(&mut errors, "unit_price", &self.unit_price);
        errors
    }

    fn create_payload(&self) -> CreateProduct {
        CreateProduct {
            name: self.name.clone(),
            sku: self.sku.clone(),
            unit_price: self.unit_price.clone(),
            reorder_level: self.reorder_level.clone(),
            manual: false,
        }
    }

    fn update_payload(&self) -> UpdateProduct {
        UpdateProduct {
            name: self.name.clone(),
            unit_price: self.unit_price.clone(),
            reorder_level: self.reorder_level.clone(),
        }
    }

    fn hydrate(value: &Value) -> Self {
        Self {
            name: str_field(value, "name"),
            sku: str_field(value, "sku"),
            unit_price: str_field(value, "unit_price"),
            reorder_level: str_field(value, "reorder_level"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StockEntry {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub batch_no: String,
    pub expiry_date: String,
    pub quantity: f64,
}

impl StockEntry {
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = str_field(value, "id");
        if id.is_empty() {
            tracing::warn!("skipping stock row without id");
            return None;
        }
        Some(Self {
            id,
            product_id: str_field(value, "product_id"),
            product_name: str_field(value, "product_name"),
            batch_no: str_field(value, "batch_no"),
            expiry_date: str_field(value, "expiry_date"),
            quantity: num_field(value, "quantity"),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bill {
    pub id: String,
    pub patient_id: String,
    pub total_amount: f64,
    pub status: String,
    pub billed_at: String,
}

impl Bill {
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = str_field(value, "id");
        if id.is_empty() {
            tracing::warn!("skipping bill row without id");
            return None;
        }
        Some(Self {
            id,
            patient_id: str_field(value, "patient_id"),
            total_amount: num_field(value, "total_amount"),
            status: str_field(value, "status"),
            billed_at: str_field(value, "billed_at"),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct BillItem {
    pub product_id: String,
    pub quantity: f64,
}

#[derive(Debug, Serialize)]
pub struct CreateBill {
    pub patient_id: String,
    pub items: Vec<BillItem>,
}

#[derive(Clone)]
pub struct Products {
    client: ApiClient,
}

#[derive(Clone)]
pub struct Stock {
    client: ApiClient,
}

#[derive(Clone)]
pub struct Bills {
    client: ApiClient,
}

impl ApiClient {
    pub fn products(&self) -> Products {
        Products {
            client: self.clone(),
        }
    }

    pub fn stock(&self) -> Stock {
        Stock {
            client: self.clone(),
        }
    }

    pub fn bills(&self) -> Bills {
        Bills {
            client: self.clone(),
        }
    }
}

impl Products {
    pub async fn list(&self, query: &ListQuery) -> ServiceResult<ListPage<Product>> {
        Ok(self
            .client
            .get_list(PRODUCTS_PATH, query)
            .await?
            .filter_map_rows(|value| Product::from_value(&value)))
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Value> {
        self.client
            .get_detail(ProductDraft::ENTITY, PRODUCTS_PATH, id)
            .await
    }

    pub async fn create(&self, payload: &CreateProduct) -> ServiceResult<String> {
        let response = self.client.post(PRODUCTS_PATH, payload).await?;
        extract_id(&response)
    }

    pub async fn update(&self, id: &str, payload: &UpdateProduct) -> ServiceResult<()> {
        self.client
            .put(&format!("{PRODUCTS_PATH}/{id}"), payload)
            .await
            .map(|_| ())
    }

    pub async fn remove(&self, id: &str) -> ServiceResult<()> {
        self.client.delete(PRODUCTS_PATH, id).await
    }

    pub async fn restore(&self, id: &str) -> ServiceResult<()> {
        self.client.restore(PRODUCTS_PATH, id).await
    }
}

impl Stock {
    pub async fn list(&self, query: &ListQuery) -> ServiceResult<ListPage<StockEntry>> {
        Ok(self
            .client
            .get_list(STOCK_PATH, query)
            .await?
            .filter_map_rows(|value| StockEntry::from_value(&value)))
    }
}

impl Bills {
    pub async fn list(&self, query: &ListQuery) -> ServiceResult<ListPage<Bill>> {
        Ok(self
            .client
            .get_list(BILLS_PATH, query)
            .await?
            .filter_map_rows(|value| Bill::from_value(&value)))
    }

    pub async fn create(&self, payload: &CreateBill) -> ServiceResult<String> {
        let response = self.client.post(BILLS_PATH, payload).await?;
        extract_id(&response)
    }
}

impl ListFetcher for Products {
    type Row = Product;

    async fn fetch_page(&self, query: &ListQuery) -> ServiceResult<ListPage<Product>> {
        self.list(query).await
    }
}

impl ListFetcher for Stock {
    type Row = StockEntry;

    async fn fetch_page(&self, query: &ListQuery) -> ServiceResult<ListPage<StockEntry>> {
        self.list(query).await
    }
}

impl ListFetcher for Bills {
    type Row = Bill;

    async fn fetch_page(&self, query: &ListQuery) -> ServiceResult<ListPage<Bill>> {
        self.list(query).await
    }
}

impl DraftBackend<ProductDraft> for Products {
    async fn fetch(&self, id: &str) -> ServiceResult<Value> {
        self.get(id).await
    }

    async fn create(&self, payload: &CreateProduct) -> ServiceResult<String> {
        Products::create(self, payload).await
    }

    async fn update(&self, id: &str, payload: &UpdateProduct) -> ServiceResult<()> {
        Products::update(self, id, payload).await
    }
}
