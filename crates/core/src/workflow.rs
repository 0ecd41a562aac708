//! Dependency-gated sequential saving of related records.
//!
//! Multi-section forms (a consultation's encounter -> vitals / diagnosis /
//! clinical note, a purchase order -> inward receipt with line items) must
//! create records in a fixed dependency order. Getting the ordering or the
//! create-vs-update choice wrong produces duplicate or orphaned records, so
//! the rules live here rather than in each screen:
//!
//! - a child step cannot be saved until its parent has a server-assigned
//!   id; the attempt is rejected locally, before any request is issued;
//! - a step with an id is updated, never re-created, so retrying after a
//!   failure is safe;
//! - sibling steps may be saved in any order the user chooses;
//! - line items that reference a not-yet-existing entity (a manually typed
//!   product on an inward receipt) have that entity created first, and the
//!   whole assembly aborts if any such creation fails, so the parent
//!   submission is all-or-nothing.
//!
//! Re-opening an existing parent hydrates whichever children already exist
//! server-side; an absent child is "not yet created", not an error. The
//! workflow also reports which children of a saved parent are still
//! unsaved, so callers can warn before the user navigates away and leaves a
//! partially configured parent behind.

use std::future::Future;

use serde_json::Value;
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};

/// Static definition of one step in a workflow.
#[derive(Debug, Clone, Copy)]
pub struct StepDef {
    pub name: &'static str,
    /// Name of the parent step, which must be defined before this one.
    pub parent: Option<&'static str>,
}

impl StepDef {
    pub const fn root(name: &'static str) -> Self {
        Self { name, parent: None }
    }

    pub const fn child_of(name: &'static str, parent: &'static str) -> Self {
        Self {
            name,
            parent: Some(parent),
        }
    }
}

#[derive(Debug, Clone)]
struct StepState {
    name: &'static str,
    parent: Option<usize>,
    record_id: Option<String>,
}

/// Persistence seam for workflow steps.
pub trait StepSaver: Send + Sync {
    /// Creates the record for `step` and returns the server-assigned id.
    /// `parent_id` is present for child steps so the payload can reference
    /// its parent.
    fn create(
        &self,
        step: &str,
        parent_id: Option<&str>,
        payload: &Value,
    ) -> impl Future<Output = ServiceResult<String>> + Send;

    fn update(
        &self,
        step: &str,
        record_id: &str,
        payload: &Value,
    ) -> impl Future<Output = ServiceResult<()>> + Send;
}

/// Loads existing child records when re-opening a saved parent.
pub trait StepLoader: Send + Sync {
    /// Fetches the child record for `step` under `parent_id`. `Ok(None)`
    /// means the child does not exist yet, which is a normal state.
    fn load(
        &self,
        step: &str,
        parent_id: &str,
    ) -> impl Future<Output = ServiceResult<Option<(String, Value)>>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Created { id: String },
    Updated { id: String },
}

impl StepOutcome {
    pub fn id(&self) -> &str {
        match self {
            StepOutcome::Created { id } | StepOutcome::Updated { id } => id,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkflowError {
    #[error("unknown step '{0}'")]
    UnknownStep(String),

    #[error("step '{0}' is defined twice")]
    DuplicateStep(&'static str),

    #[error("step '{step}' references parent '{parent}', which is not defined before it")]
    UnknownParent {
        step: &'static str,
        parent: &'static str,
    },

    /// Local rejection issued before any network call.
    #[error("save the {parent} before adding the {step}")]
    MissingParent {
        step: &'static str,
        parent: &'static str,
    },

    #[error("line item {index} has a payload that is not an object")]
    InvalidItem { index: usize },

    #[error("saving the {step} failed: {source}")]
    StepFailed {
        step: &'static str,
        source: ServiceError,
    },

    #[error(transparent)]
    Service(#[from] ServiceError),
}

/// One multi-section form session's save state.
///
/// Held in memory for the duration of the session and discarded on
/// navigation away; nothing here survives except what the server assigned.
#[derive(Debug, Clone)]
pub struct SequentialWorkflow {
    steps: Vec<StepState>,
}

impl SequentialWorkflow {
    /// Builds a workflow from step definitions. Parents must be defined
    /// before their children and names must be unique.
    pub fn new(defs: &[StepDef]) -> Result<Self, WorkflowError> {
        let mut steps: Vec<StepState> = Vec::with_capacity(defs.len());
        for def in defs {
            if steps.iter().any(|s| s.name == def.name) {
                return Err(WorkflowError::DuplicateStep(def.name));
            }
            let parent = match def.parent {
                None => None,
                Some(parent_name) => Some(
                    steps
                        .iter()
                        .position(|s| s.name == parent_name)
                        .ok_or(WorkflowError::UnknownParent {
                            step: def.name,
                            parent: parent_name,
                        })?,
                ),
            };
            steps.push(StepState {
                name: def.name,
                parent,
                record_id: None,
            });
        }
        Ok(Self { steps })
    }

    pub fn record_id(&self, step: &str) -> Option<&str> {
        self.find(step)
            .ok()
            .and_then(|i| self.steps[i].record_id.as_deref())
    }

    pub fn is_created(&self, step: &str) -> bool {
        self.record_id(step).is_some()
    }

    /// Marks a step as already existing server-side, e.g. after fetching
    /// it while editing the parent.
    pub fn mark_existing(&mut self, step: &str, id: impl Into<String>) -> Result<(), WorkflowError> {
        let index = self.find(step)?;
        self.steps[index].record_id = Some(id.into());
        Ok(())
    }

    /// Saves one step: a create when the step has no server id yet, an
    /// update when it does. Child steps are rejected locally while their
    /// parent has no id.
    pub async fn advance<S: StepSaver>(
        &mut self,
        step: &str,
        payload: &Value,
        saver: &S,
    ) -> Result<StepOutcome, WorkflowError> {
        let index = self.find(step)?;
        let name = self.steps[index].name;

        let parent_id = match self.steps[index].parent {
            None => None,
            Some(parent_index) => match &self.steps[parent_index].record_id {
                Some(id) => Some(id.clone()),
                None => {
                    return Err(WorkflowError::MissingParent {
                        step: name,
                        parent: self.steps[parent_index].name,
                    })
                }
            },
        };

        match self.steps[index].record_id.clone() {
            Some(record_id) => {
                saver
                    .update(name, &record_id, payload)
                    .await
                    .map_err(|source| WorkflowError::StepFailed { step: name, source })?;
                Ok(StepOutcome::Updated { id: record_id })
            }
            None => {
                let id = saver
                    .create(name, parent_id.as_deref(), payload)
                    .await
                    .map_err(|source| WorkflowError::StepFailed { step: name, source })?;
                self.steps[index].record_id = Some(id.clone());
                Ok(StepOutcome::Created { id })
            }
        }
    }

    /// Re-hydrates the session from an existing root record: the root is
    /// marked with `root_id` and every child whose parent exists is fetched
    /// by parent id. Children the loader reports as absent stay
    /// not-yet-created. Returns the fetched payloads for the caller to
    /// populate its sections.
    pub async fn hydrate<L: StepLoader>(
        &mut self,
        root: &str,
        root_id: &str,
        loader: &L,
    ) -> Result<Vec<(&'static str, Value)>, WorkflowError> {
        let root_index = self.find(root)?;
        self.steps[root_index].record_id = Some(root_id.to_string());

        let mut hydrated = Vec::new();
        // Definition order guarantees parents are visited before children.
        for index in 0..self.steps.len() {
            if self.steps[index].record_id.is_some() {
                continue;
            }
            let parent_id = match self.steps[index].parent {
                Some(parent_index) => match self.steps[parent_index].record_id.clone() {
                    Some(id) => id,
                    None => continue,
                },
                None => continue,
            };
            let name = self.steps[index].name;
            if let Some((id, value)) = loader.load(name, &parent_id).await? {
                self.steps[index].record_id = Some(id);
                hydrated.push((name, value));
            }
        }
        Ok(hydrated)
    }

    /// Steps whose parent is saved but which have not been created
    /// themselves. Callers surface these as a warning before the user
    /// navigates away from the session.
    pub fn unsaved_children(&self) -> Vec<&'static str> {
        self.steps
            .iter()
            .filter(|step| {
                step.record_id.is_none()
                    && step
                        .parent
                        .map(|p| self.steps[p].record_id.is_some())
                        .unwrap_or(false)
            })
            .map(|step| step.name)
            .collect()
    }

    fn find(&self, step: &str) -> Result<usize, WorkflowError> {
        self.steps
            .iter()
            .position(|s| s.name == step)
            .ok_or_else(|| WorkflowError::UnknownStep(step.to_string()))
    }
}

/// One repeatable line item under a workflow parent.
#[derive(Debug, Clone)]
pub struct LineItem {
    /// Client-side correlation key, for messages about a specific row.
    pub key: Uuid,
    pub payload: Value,
    /// Entity that must be created before this item can reference it.
    pub dependency: Option<ItemDependency>,
}

impl LineItem {
    pub fn new(payload: Value) -> Self {
        Self {
            key: Uuid::new_v4(),
            payload,
            dependency: None,
        }
    }

    pub fn with_dependency(mut self, payload: Value, target_field: impl Into<String>) -> Self {
        self.dependency = Some(ItemDependency {
            payload,
            target_field: target_field.into(),
        });
        self
    }
}

#[derive(Debug, Clone)]
pub struct ItemDependency {
    /// Create payload for the referenced entity (e.g. a manual product).
    pub payload: Value,
    /// Item field that receives the created entity's id.
    pub target_field: String,
}

/// Creates entities that line items depend on.
pub trait DependencyCreator: Send + Sync {
    fn create(&self, payload: &Value) -> impl Future<Output = ServiceResult<String>> + Send;
}

/// Resolves every line-item dependency, then splices the created ids into
/// the item payloads. All-or-nothing: every dependency is resolved before
/// any payload is produced, and the first failure aborts the whole
/// assembly so the parent submission never persists a partial item set.
pub async fn assemble_line_items<C: DependencyCreator>(
    items: &[LineItem],
    creator: &C,
) -> Result<Vec<Value>, WorkflowError> {
    for (index, item) in items.iter().enumerate() {
        if !item.payload.is_object() {
            return Err(WorkflowError::InvalidItem { index });
        }
    }

    let mut resolved: Vec<Option<String>> = Vec::with_capacity(items.len());
    for item in items {
        match &item.dependency {
            Some(dependency) => {
                let id = creator.create(&dependency.payload).await?;
                resolved.push(Some(id));
            }
            None => resolved.push(None),
        }
    }

    let mut payloads = Vec::with_capacity(items.len());
    for (item, id) in items.iter().zip(resolved) {
        let mut payload = item.payload.clone();
        if let (Some(id), Some(dependency), Some(object)) =
            (id, &item.dependency, payload.as_object_mut())
        {
            object.insert(dependency.target_field.clone(), Value::String(id));
        }
        payloads.push(payload);
    }
    Ok(payloads)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn consultation() -> SequentialWorkflow {
        SequentialWorkflow::new(&[
            StepDef::root("encounter"),
            StepDef::child_of("vitals", "encounter"),
            StepDef::child_of("diagnosis", "encounter"),
            StepDef::child_of("clinical_note", "encounter"),
        ])
        .expect("valid definition")
    }

    #[derive(Default)]
    struct RecordingSaver {
        creates: Mutex<Vec<(String, Option<String>)>>,
        updates: Mutex<Vec<(String, String)>>,
    }

    impl StepSaver for RecordingSaver {
        async fn create(
            &self,
            step: &str,
            parent_id: Option<&str>,
            _payload: &Value,
        ) -> ServiceResult<String> {
            self.creates
                .lock()
                .unwrap()
                .push((step.to_string(), parent_id.map(String::from)));
            Ok(format!("{step}-1"))
        }

        async fn update(&self, step: &str, record_id: &str, _payload: &Value) -> ServiceResult<()> {
            self.updates
                .lock()
                .unwrap()
                .push((step.to_string(), record_id.to_string()));
            Ok(())
        }
    }

    #[tokio::test]
    async fn child_step_is_rejected_locally_until_parent_exists() {
        let mut workflow = consultation();
        let saver = RecordingSaver::default();

        let err = workflow
            .advance("vitals", &json!({"pulse": 72}), &saver)
            .await
            .expect_err("vitals before encounter");
        assert!(matches!(
            err,
            WorkflowError::MissingParent {
                step: "vitals",
                parent: "encounter"
            }
        ));
        assert_eq!(err.to_string(), "save the encounter before adding the vitals");
        assert!(saver.creates.lock().unwrap().is_empty());
        assert!(saver.updates.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_once_then_update_on_repeat_saves() {
        let mut workflow = consultation();
        let saver = RecordingSaver::default();

        let outcome = workflow
            .advance("encounter", &json!({"patient_id": "p-9"}), &saver)
            .await
            .expect("create encounter");
        assert_eq!(
            outcome,
            StepOutcome::Created {
                id: "encounter-1".into()
            }
        );

        let outcome = workflow
            .advance("encounter", &json!({"patient_id": "p-9"}), &saver)
            .await
            .expect("second save updates");
        assert_eq!(
            outcome,
            StepOutcome::Updated {
                id: "encounter-1".into()
            }
        );

        workflow
            .advance("encounter", &json!({"patient_id": "p-9"}), &saver)
            .await
            .expect("third save updates");

        assert_eq!(saver.creates.lock().unwrap().len(), 1);
        assert_eq!(saver.updates.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn child_create_receives_parent_id() {
        let mut workflow = consultation();
        let saver = RecordingSaver::default();

        workflow
            .advance("encounter", &json!({}), &saver)
            .await
            .expect("create encounter");
        workflow
            .advance("vitals", &json!({"pulse": 72}), &saver)
            .await
            .expect("create vitals");

        let creates = saver.creates.lock().unwrap();
        assert_eq!(
            creates[1],
            ("vitals".to_string(), Some("encounter-1".to_string()))
        );
    }

    #[tokio::test]
    async fn siblings_save_in_any_order() {
        let mut workflow = consultation();
        let saver = RecordingSaver::default();

        workflow.advance("encounter", &json!({}), &saver).await.unwrap();
        workflow.advance("clinical_note", &json!({}), &saver).await.unwrap();
        workflow.advance("vitals", &json!({}), &saver).await.unwrap();

        assert!(workflow.is_created("clinical_note"));
        assert!(workflow.is_created("vitals"));
        assert!(!workflow.is_created("diagnosis"));
    }

    #[tokio::test]
    async fn failed_step_keeps_existing_ids_for_retry() {
        struct FailingSaver {
            inner: RecordingSaver,
        }

        impl StepSaver for FailingSaver {
            async fn create(
                &self,
                step: &str,
                parent_id: Option<&str>,
                payload: &Value,
            ) -> ServiceResult<String> {
                if step == "vitals" {
                    return Err(ServiceError::Network("timeout".into()));
                }
                self.inner.create(step, parent_id, payload).await
            }

            async fn update(&self, step: &str, record_id: &str, payload: &Value) -> ServiceResult<()> {
                self.inner.update(step, record_id, payload).await
            }
        }

        let mut workflow = consultation();
        let saver = FailingSaver {
            inner: RecordingSaver::default(),
        };

        workflow.advance("encounter", &json!({}), &saver).await.unwrap();
        let err = workflow
            .advance("vitals", &json!({}), &saver)
            .await
            .expect_err("vitals save fails");
        assert!(matches!(err, WorkflowError::StepFailed { step: "vitals", .. }));

        // The encounter id survives, so retrying vitals does not re-create
        // the encounter.
        assert_eq!(workflow.record_id("encounter"), Some("encounter-1"));
        assert!(!workflow.is_created("vitals"));
    }

    struct CannedLoader;

    impl StepLoader for CannedLoader {
        async fn load(&self, step: &str, parent_id: &str) -> ServiceResult<Option<(String, Value)>> {
            assert_eq!(parent_id, "encounter-7");
            match step {
                "vitals" => Ok(Some(("vitals-7".into(), json!({"pulse": 80})))),
                _ => Ok(None),
            }
        }
    }

    #[tokio::test]
    async fn hydration_marks_existing_children_and_skips_absent_ones() {
        let mut workflow = consultation();

        let hydrated = workflow
            .hydrate("encounter", "encounter-7", &CannedLoader)
            .await
            .expect("hydrate");
        assert_eq!(hydrated.len(), 1);
        assert_eq!(hydrated[0].0, "vitals");

        // An existing child is updated on the next save, an absent one is
        // created.
        let saver = RecordingSaver::default();
        workflow
            .advance("vitals", &json!({"pulse": 84}), &saver)
            .await
            .expect("update vitals");
        workflow
            .advance("diagnosis", &json!({"code": "J10"}), &saver)
            .await
            .expect("create diagnosis");

        assert_eq!(
            saver.updates.lock().unwrap()[0],
            ("vitals".to_string(), "vitals-7".to_string())
        );
        assert_eq!(saver.creates.lock().unwrap()[0].0, "diagnosis");
    }

    #[tokio::test]
    async fn unsaved_children_reported_for_navigation_warning() {
        let mut workflow = consultation();
        assert!(workflow.unsaved_children().is_empty());

        let saver = RecordingSaver::default();
        workflow.advance("encounter", &json!({}), &saver).await.unwrap();
        assert_eq!(
            workflow.unsaved_children(),
            vec!["vitals", "diagnosis", "clinical_note"]
        );

        workflow.advance("vitals", &json!({}), &saver).await.unwrap();
        assert_eq!(workflow.unsaved_children(), vec!["diagnosis", "clinical_note"]);
    }

    #[test]
    fn definitions_reject_unknown_parents_and_duplicates() {
        let err = SequentialWorkflow::new(&[StepDef::child_of("vitals", "encounter")])
            .expect_err("parent not defined");
        assert!(matches!(err, WorkflowError::UnknownParent { .. }));

        let err = SequentialWorkflow::new(&[StepDef::root("a"), StepDef::root("a")])
            .expect_err("duplicate");
        assert!(matches!(err, WorkflowError::DuplicateStep("a")));
    }

    struct CountingCreator {
        created: Mutex<Vec<Value>>,
        fail_on: Option<String>,
    }

    impl DependencyCreator for CountingCreator {
        async fn create(&self, payload: &Value) -> ServiceResult<String> {
            if let Some(name) = &self.fail_on {
                if payload.get("name").and_then(Value::as_str) == Some(name) {
                    return Err(ServiceError::Rejected {
                        status: 422,
                        violations: vec![],
                    });
                }
            }
            let mut created = self.created.lock().unwrap();
            created.push(payload.clone());
            Ok(format!("prod-{}", created.len()))
        }
    }

    #[tokio::test]
    async fn line_item_dependencies_resolve_into_payloads() {
        let creator = CountingCreator {
            created: Mutex::new(Vec::new()),
            fail_on: None,
        };
        let items = vec![
            LineItem::new(json!({"product_id": "prod-existing", "qty": 5})),
            LineItem::new(json!({"qty": 2}))
                .with_dependency(json!({"name": "Gauze 10cm", "manual": true}), "product_id"),
        ];

        let payloads = assemble_line_items(&items, &creator).await.expect("assemble");
        assert_eq!(payloads[0]["product_id"], "prod-existing");
        assert_eq!(payloads[1]["product_id"], "prod-1");
        assert_eq!(payloads[1]["qty"], 2);
    }

    #[tokio::test]
    async fn any_dependency_failure_aborts_the_whole_assembly() {
        let creator = CountingCreator {
            created: Mutex::new(Vec::new()),
            fail_on: Some("Bad Product".into()),
        };
        let items = vec![
            LineItem::new(json!({"qty": 1}))
                .with_dependency(json!({"name": "Gauze 10cm"}), "product_id"),
            LineItem::new(json!({"qty": 2}))
                .with_dependency(json!({"name": "Bad Product"}), "product_id"),
        ];

        let err = assemble_line_items(&items, &creator)
            .await
            .expect_err("second dependency fails");
        assert!(matches!(err, WorkflowError::Service(ServiceError::Rejected { .. })));
    }

    #[tokio::test]
    async fn non_object_item_payload_is_rejected_before_any_creation() {
        let creator = CountingCreator {
            created: Mutex::new(Vec::new()),
            fail_on: None,
        };
        let items = vec![
            LineItem::new(json!({"qty": 1}))
                .with_dependency(json!({"name": "Gauze"}), "product_id"),
            LineItem::new(json!("not an object")),
        ];

        let err = assemble_line_items(&items, &creator)
            .await
            .expect_err("invalid payload");
        assert!(matches!(err, WorkflowError::InvalidItem { index: 1 }));
        assert!(creator.created.lock().unwrap().is_empty());
    }
}
