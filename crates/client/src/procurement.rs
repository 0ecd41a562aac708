//! Vendors, purchase orders and inward receipts.
//!
//! The inward flow is the line-item workflow: receiving stock against a
//! purchase order where some rows reference catalogue products and some
//! were typed in by hand. Manual products must exist before the receipt
//! can reference them, and the receipt itself is one create carrying the
//! full item set, so a failed manual-product creation aborts the whole
//! submission.

use serde::Serialize;
use serde_json::{json, Value};

use hmc_core::error::ServiceResult;
use hmc_core::form::{str_field, DraftBackend, EntityDraft};
use hmc_core::list::ListFetcher;
use hmc_core::query::{ListPage, ListQuery};
use hmc_core::validate::{require, require_email, ValidationErrors};
use hmc_core::workflow::{assemble_line_items, DependencyCreator, LineItem, WorkflowError};

use crate::http::{extract_id, ApiClient};

const VENDORS_PATH: &str = "vendors";
const ORDERS_PATH: &str = "orders";
const INWARD_PATH: &str = "inward-receipts";
const PRODUCTS_PATH: &str = "products";

#[derive(Debug, Clone, PartialEq)]
pub struct Vendor {
    pub id: String,
    pub name: String,
    pub contact_email: String,
    pub phone: String,
    pub is_active: bool,
}

impl Vendor {
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = str_field(value, "id");
        if id.is_empty() {
            tracing::warn!("skipping vendor row without id");
            return None;
        }
        Some(Self {
            id,
            name: str_field(value, "name"),
            contact_email: str_field(value, "contact_email"),
            phone: str_field(value, "phone"),
            is_active: hmc_core::form::bool_field(value, "is_active"),
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct VendorDraft {
    pub name: String,
    pub contact_email: String,
    pub phone: String,
}

#[derive(Debug, Serialize)]
pub struct CreateVendor {
    pub name: String,
    pub contact_email: String,
    pub phone: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateVendor {
    pub name: String,
    pub contact_email: String,
    pub phone: String,
}

impl EntityDraft for VendorDraft {
    type Create = CreateVendor;
    type Update = UpdateVendor;
    const ENTITY: &'static str = "vendor";

    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "name", &self.name);
        require_email(&mut errors, "contact_email", &self.contact_email);
        errors
    }

    fn create_payload(&self) -> CreateVendor {
        CreateVendor {
            name: self.name.clone(),
            contact_email: self.contact_email.clone(),
            phone: self.phone.clone(),
        }
    }

    fn update_payload(&self) -> UpdateVendor {
        UpdateVendor {
            name: self.name.clone(),
            contact_email: self.contact_email.clone(),
            phone: self.phone.clone(),
        }
    }

    fn hydrate(value: &Value) -> Self {
        Self {
            name: str_field(value, "name"),
            contact_email: str_field(value, "contact_email"),
            phone: str_field(value, "phone"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseOrder {
    pub id: String,
    pub vendor_id: String,
    pub status: String,
    pub ordered_at: String,
}

impl PurchaseOrder {
    pub fn from_value(value: &Value) -> Option<Self> {
        let id = str_field(value, "id");
        if id.is_empty() {
            tracing::warn!("skipping purchase order row without id");
            return None;
        }
        Some(Self {
            id,
            vendor_id: str_field(value, "vendor_id"),
            status: str_field(value, "status"),
            ordered_at: str_field(value, "ordered_at"),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct OrderItem {
    pub product_id: String,
    pub quantity: f64,
}

#[derive(Debug, Serialize)]
pub struct CreatePurchaseOrder {
    pub vendor_id: String,
    pub items: Vec<OrderItem>,
}

/// One row of an inward receipt under assembly.
#[derive(Debug, Clone)]
pub struct InwardItem {
    /// Catalogue product id, when the row references an existing product.
    pub product_id: Option<String>,
    /// Hand-typed product that must be created before submission.
    pub manual_product: Option<ManualProduct>,
    pub quantity: f64,
    pub batch_no: String,
    pub expiry_date: String,
}

#[derive(Debug, Clone)]
pub struct ManualProduct {
    pub name: String,
    pub unit_price: f64,
}

impl InwardItem {
    fn into_line_item(self) -> LineItem {
        let mut payload = json!({
            "quantity": self.quantity,
            "batch_no": self.batch_no,
            "expiry_date": self.expiry_date,
        });
        if let (Some(product_id), Some(object)) = (&self.product_id, payload.as_object_mut()) {
            object.insert("product_id".into(), Value::String(product_id.clone()));
        }

        let item = LineItem::new(payload);
        match self.manual_product {
            Some(manual) => item.with_dependency(
                json!({
                    "name": manual.name,
                    "unit_price": manual.unit_price,
                    "manual": true,
                }),
                "product_id",
            ),
            None => item,
        }
    }
}

#[derive(Clone)]
pub struct Vendors {
    client: ApiClient,
}

#[derive(Clone)]
pub struct PurchaseOrders {
    client: ApiClient,
}

#[derive(Clone)]
pub struct InwardReceipts {
    client: ApiClient,
}

impl ApiClient {
    pub fn vendors(&self) -> Vendors {
        Vendors {
            client: self.clone(),
        }
    }

    pub fn purchase_orders(&self) -> PurchaseOrders {
        PurchaseOrders {
            client: self.clone(),
        }
    }

    pub fn inward_receipts(&self) -> InwardReceipts {
        InwardReceipts {
            client: self.clone(),
        }
    }
}

impl Vendors {
    pub async fn list(&self, query: &ListQuery) -> ServiceResult<ListPage<Vendor>> {
        Ok(self
            .client
            .get_list(VENDORS_PATH, query)
            .await?
            .filter_map_rows(|value| Vendor::from_value(&value)))
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Value> {
        self.client.get_detail(VendorDraft::ENTITY, VENDORS_PATH, id).await
    }

    pub async fn create(&self, payload: &CreateVendor) -> ServiceResult<String> {
        let response = self.client.post(VENDORS_PATH, payload).await?;
        extract_id(&response)
    }

    pub async fn update(&self, id: &str, payload: &UpdateVendor) -> ServiceResult<()> {
        self.client
            .put(&format!("{VENDORS_PATH}/{id}"), payload)
            .await
            .map(|_| ())
    }

    pub async fn remove(&self, id: &str) -> ServiceResult<()> {
        self.client.delete(VENDORS_PATH, id).await
    }

    pub async fn restore(&self, id: &str) -> ServiceResult<()> {
        self.client.restore(VENDORS_PATH, id).await
    }
}

impl PurchaseOrders {
    pub async fn list(&self, query: &ListQuery) -> ServiceResult<ListPage<PurchaseOrder>> {
        Ok(self
            .client
            .get_list(ORDERS_PATH, query)
            .await?
            .filter_map_rows(|value| PurchaseOrder::from_value(&value)))
    }

    pub async fn get(&self, id: &str) -> ServiceResult<Value> {
        self.client.get_detail("purchase order", ORDERS_PATH, id).await
    }

    pub async fn create(&self, payload: &CreatePurchaseOrder) -> ServiceResult<String> {
        let response = self.client.post(ORDERS_PATH, payload).await?;
        extract_id(&response)
    }
}

/// Creates manual products ahead of an inward submission.
struct ManualProductCreator {
    client: ApiClient,
}

impl DependencyCreator for ManualProductCreator {
    async fn create(&self, payload: &Value) -> ServiceResult<String> {
        let response = self.client.post(PRODUCTS_PATH, payload).await?;
        extract_id(&response)
    }
}

impl InwardReceipts {
    /// Submits an inward receipt against a purchase order.
    ///
    /// Manual products are created first; any failure there aborts before
    /// the receipt itself is sent, so the server never sees a partial item
    /// set. The receipt is a single create carrying every item.
    pub async fn submit(
        &self,
        order_id: &str,
        items: Vec<InwardItem>,
    ) -> Result<String, WorkflowError> {
        let line_items: Vec<LineItem> = items.into_iter().map(InwardItem::into_line_item).collect();
        let creator = ManualProductCreator {
            client: self.client.clone(),
        };
        let payloads = assemble_line_items(&line_items, &creator).await?;

        let body = json!({
            "order_id": order_id,
            "items": payloads,
        });
        let response = self.client.post(INWARD_PATH, &body).await?;
        Ok(extract_id(&response)?)
    }

    pub async fn list(&self, query: &ListQuery) -> ServiceResult<ListPage<Value>> {
        self.client.get_list(INWARD_PATH, query).await
    }
}

impl ListFetcher for Vendors {
    type Row = Vendor;

    async fn fetch_page(&self, query: &ListQuery) -> ServiceResult<ListPage<Vendor>> {
        self.list(query).await
    }
}

impl ListFetcher for PurchaseOrders {
    type Row = PurchaseOrder;

    async fn fetch_page(&self, query: &ListQuery) -> ServiceResult<ListPage<PurchaseOrder>> {
        self.list(query).await
    }
}

impl DraftBackend<VendorDraft> for Vendors {
    async fn fetch(&self, id: &str) -> ServiceResult<Value> {
        self.get(id).await
    }

    async fn create(&self, payload: &CreateVendor) -> ServiceResult<String> {
        Vendors::create(self, payload).await
    }

    async fn update(&self, id: &str, payload: &UpdateVendor) -> ServiceResult<()> {
        Vendors::update(self, id, payload).await
    }
}
