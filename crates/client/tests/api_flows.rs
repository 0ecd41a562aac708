//! End-to-end client flows against a mock backend.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use hmc_client::{ApiClient, ClientConfig};
use hmc_core::error::ServiceError;
use hmc_core::form::FormController;
use hmc_core::query::ListQuery;
use hmc_core::session::SessionContext;

use hmc_client::consultation::{consultation_workflow, ENCOUNTER, VITALS};
use hmc_client::patients::PatientDraft;
use hmc_client::procurement::{InwardItem, ManualProduct};

fn signed_in_client(server: &MockServer) -> ApiClient {
    let config = ClientConfig::new(server.uri().parse().unwrap());
    let session = SessionContext::in_memory();
    session.login("tok-test", "admin").unwrap();
    ApiClient::new(config, session).unwrap()
}

#[tokio::test]
async fn bed_list_normalizes_the_doubly_wrapped_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/beds"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "data": [{"id": 1, "name": "Room 1", "ward": "ICU", "occupied": false}],
                "total": 1
            }
        })))
        .mount(&server)
        .await;

    let client = signed_in_client(&server);
    let page = client.beds().list(&ListQuery::new("name")).await.unwrap();

    assert_eq!(page.rows.len(), 1);
    assert_eq!(page.rows[0].name, "Room 1");
    assert_eq!(page.total, 1);
    assert_eq!(page.summary(), "Showing 1-1 of 1");
}

#[tokio::test]
async fn patient_form_creates_then_reloads_prefilled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/patients"))
        .and(body_partial_json(json!({"first_name": "Asha", "email": "asha@example.org"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": "p-41"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/patients/p-41"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "id": "p-41",
                "first_name": "Asha",
                "last_name": "Rao",
                "email": "asha@example.org",
                "date_of_birth": "1990-04-02"
            }
        })))
        .mount(&server)
        .await;

    let client = signed_in_client(&server);

    let mut form = FormController::<PatientDraft, _>::create(client.patients());
    form.edit(|d| {
        d.first_name = "Asha".into();
        d.last_name = "Rao".into();
        d.email = "asha@example.org".into();
        d.date_of_birth = "1990-04-02".into();
    });
    form.submit().await.expect("create patient");
    assert_eq!(form.id(), Some("p-41"));

    let reloaded = FormController::<PatientDraft, _>::load(client.patients(), "p-41")
        .await
        .expect("reload");
    assert_eq!(reloaded.draft().first_name, "Asha");
    assert_eq!(reloaded.draft().date_of_birth, "1990-04-02");
}

#[tokio::test]
async fn consultation_children_carry_the_encounter_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/encounters"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": "enc-1"}
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/vitals"))
        .and(body_partial_json(json!({"encounter_id": "enc-1", "pulse": 72})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "vit-1"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in_client(&server);
    let consultations = client.consultations();
    let mut workflow = consultation_workflow();

    // Vitals before the encounter is rejected locally.
    let err = workflow
        .advance(VITALS, &json!({"pulse": 72}), &consultations)
        .await
        .expect_err("no encounter yet");
    assert_eq!(err.to_string(), "save the encounter before adding the vitals");

    workflow
        .advance(ENCOUNTER, &json!({"patient_id": "p-41"}), &consultations)
        .await
        .expect("create encounter");
    workflow
        .advance(VITALS, &json!({"pulse": 72}), &consultations)
        .await
        .expect("create vitals");
    assert_eq!(workflow.record_id(VITALS), Some("vit-1"));
}

#[tokio::test]
async fn reopened_consultation_updates_existing_vitals() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/encounters/enc-7/vitals"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": "vit-7", "pulse": 80}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/encounters/enc-7/diagnoses"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/encounters/enc-7/clinical-notes"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/vitals/vit-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in_client(&server);
    let consultations = client.consultations();
    let mut workflow = consultation_workflow();

    let hydrated = workflow
        .hydrate(ENCOUNTER, "enc-7", &consultations)
        .await
        .expect("hydrate");
    assert_eq!(hydrated.len(), 1);
    assert_eq!(hydrated[0].0, VITALS);

    // The existing section is updated, never re-created.
    workflow
        .advance(VITALS, &json!({"pulse": 84}), &consultations)
        .await
        .expect("update vitals");
}

#[tokio::test]
async fn inward_receipt_creates_manual_products_first() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/products"))
        .and(body_partial_json(json!({"name": "Gauze 10cm", "manual": true})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": "prod-9"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/inward-receipts"))
        .and(body_partial_json(json!({
            "order_id": "po-3",
            "items": [
                {"product_id": "prod-1", "quantity": 5.0},
                {"product_id": "prod-9", "quantity": 2.0}
            ]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {"id": "rcpt-1"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in_client(&server);
    let items = vec![
        InwardItem {
            product_id: Some("prod-1".into()),
            manual_product: None,
            quantity: 5.0,
            batch_no: "B-01".into(),
            expiry_date: "2027-01-01".into(),
        },
        InwardItem {
            product_id: None,
            manual_product: Some(ManualProduct {
                name: "Gauze 10cm".into(),
                unit_price: 4.5,
            }),
            quantity: 2.0,
            batch_no: "B-02".into(),
            expiry_date: "2027-06-01".into(),
        },
    ];

    let id = client
        .inward_receipts()
        .submit("po-3", items)
        .await
        .expect("submit receipt");
    assert_eq!(id, "rcpt-1");
}

#[tokio::test]
async fn failed_manual_product_aborts_the_receipt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "errors": [{"field": "name", "message": "already exists"}]
        })))
        .mount(&server)
        .await;
    // No /inward-receipts mock: reaching it would fail the test with an
    // unmatched request.

    let client = signed_in_client(&server);
    let items = vec![InwardItem {
        product_id: None,
        manual_product: Some(ManualProduct {
            name: "Gauze 10cm".into(),
            unit_price: 4.5,
        }),
        quantity: 2.0,
        batch_no: "B-02".into(),
        expiry_date: "2027-06-01".into(),
    }];

    let err = client
        .inward_receipts()
        .submit("po-3", items)
        .await
        .expect_err("manual product rejected");
    assert!(matches!(
        err,
        hmc_core::workflow::WorkflowError::Service(ServiceError::Rejected { status: 422, .. })
    ));

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() != "/inward-receipts"));
}

#[tokio::test]
async fn signed_out_client_never_touches_the_network() {
    let server = MockServer::start().await;

    let config = ClientConfig::new(server.uri().parse().unwrap());
    let client = ApiClient::new(config, SessionContext::in_memory()).unwrap();

    let err = client
        .patients()
        .list(&ListQuery::new("last_name"))
        .await
        .expect_err("no identity");
    assert!(matches!(err, ServiceError::Unauthenticated));

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn transient_server_error_on_get_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": "prod-1", "name": "Paracetamol 500mg"}],
            "total": 1
        })))
        .mount(&server)
        .await;

    let client = signed_in_client(&server);
    let page = client.products().list(&ListQuery::new("name")).await.unwrap();
    assert_eq!(page.rows[0].name, "Paracetamol 500mg");
}

#[tokio::test]
async fn create_is_never_retried_on_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/patients"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = signed_in_client(&server);
    let mut form = FormController::<PatientDraft, _>::create(client.patients());
    form.edit(|d| {
        d.first_name = "Asha".into();
        d.last_name = "Rao".into();
        d.email = "asha@example.org".into();
        d.date_of_birth = "1990-04-02".into();
    });
    form.submit().await.expect_err("server error");
    // The expect(1) on the mock verifies exactly one attempt on drop.
}

#[tokio::test]
async fn structured_rejection_maps_onto_form_fields() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/patients"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "errors": [{"field": "email", "message": "already registered"}]
        })))
        .mount(&server)
        .await;

    let client = signed_in_client(&server);
    let mut form = FormController::<PatientDraft, _>::create(client.patients());
    form.edit(|d| {
        d.first_name = "Asha".into();
        d.last_name = "Rao".into();
        d.email = "asha@example.org".into();
        d.date_of_birth = "1990-04-02".into();
    });

    form.submit().await.expect_err("duplicate email");
    assert_eq!(form.errors().get("email"), Some("already registered"));
}
