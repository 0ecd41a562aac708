//! Generic entity form control.
//!
//! One [`FormController`] backs one create/edit screen. The draft moves
//! through an explicit state machine instead of branching ad hoc on "is an
//! id present":
//!
//! ```text
//! New -> Saving -> Created -> Editing -> Saving -> Updated -> Editing ...
//! ```
//!
//! Create and update submit *different* payload types, so fields that only
//! exist on one side (a password on create, say) are expressed in the type
//! rather than spliced in and out of one mutable object. Once a submit
//! succeeds the server-assigned id is authoritative and every later submit
//! is an update.

use std::future::Future;

use serde::Serialize;
use serde_json::Value;

use crate::error::{ServiceError, ServiceResult};
use crate::validate::ValidationErrors;

/// A draft record under edit, with distinct create/update payloads.
pub trait EntityDraft: Send + Sync {
    type Create: Serialize + Send + Sync;
    type Update: Serialize + Send + Sync;

    /// Entity name used in messages, e.g. `"patient"`.
    const ENTITY: &'static str;

    /// Local, synchronous validation; never touches the network.
    fn validate(&self) -> ValidationErrors;

    fn create_payload(&self) -> Self::Create;

    fn update_payload(&self) -> Self::Update;

    /// Builds a draft from a fetched record, defaulting every missing
    /// field so an absent value never reaches an input control.
    fn hydrate(value: &Value) -> Self;
}

/// Persistence seam for one entity's form.
pub trait DraftBackend<D: EntityDraft>: Send + Sync {
    fn fetch(&self, id: &str) -> impl Future<Output = ServiceResult<Value>> + Send;

    /// Creates the record and returns the server-assigned id.
    fn create(&self, payload: &D::Create) -> impl Future<Output = ServiceResult<String>> + Send;

    fn update(
        &self,
        id: &str,
        payload: &D::Update,
    ) -> impl Future<Output = ServiceResult<()>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormPhase {
    /// Fresh draft with no server identity.
    New,
    /// A submit is in flight.
    Saving,
    /// The record exists server-side and matches the draft.
    Created,
    /// The draft has local changes since the last save.
    Editing,
    /// The last submit updated the existing record.
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Created { id: String },
    Updated { id: String },
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FormError {
    /// Local validation failed; nothing was sent.
    #[error("validation failed ({} field{})", .0.len(), if .0.len() == 1 { "" } else { "s" })]
    Invalid(ValidationErrors),

    #[error(transparent)]
    Service(#[from] ServiceError),
}

pub struct FormController<D: EntityDraft, B: DraftBackend<D>> {
    backend: B,
    draft: D,
    id: Option<String>,
    phase: FormPhase,
    errors: ValidationErrors,
}

impl<D: EntityDraft, B: DraftBackend<D>> FormController<D, B> {
    /// Starts a create-mode form with a default draft.
    pub fn create(backend: B) -> Self
    where
        D: Default,
    {
        Self {
            backend,
            draft: D::default(),
            id: None,
            phase: FormPhase::New,
            errors: ValidationErrors::new(),
        }
    }

    /// Starts an edit-mode form by fetching the record and hydrating the
    /// draft from it. A missing record propagates [`ServiceError::NotFound`]
    /// so the caller can redirect back to the list view.
    pub async fn load(backend: B, id: &str) -> ServiceResult<Self> {
        let value = backend.fetch(id).await?;
        Ok(Self {
            backend,
            draft: D::hydrate(&value),
            id: Some(id.to_string()),
            phase: FormPhase::Created,
            errors: ValidationErrors::new(),
        })
    }

    pub fn draft(&self) -> &D {
        &self.draft
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn phase(&self) -> FormPhase {
        self.phase
    }

    /// Field-level messages from the last validation pass or structured
    /// server rejection.
    pub fn errors(&self) -> &ValidationErrors {
        &self.errors
    }

    /// Applies a local edit to the draft.
    pub fn edit(&mut self, apply: impl FnOnce(&mut D)) {
        apply(&mut self.draft);
        if matches!(self.phase, FormPhase::Created | FormPhase::Updated) {
            self.phase = FormPhase::Editing;
        }
    }

    /// Validates and submits the draft, creating on first save and
    /// updating thereafter.
    pub async fn submit(&mut self) -> Result<SubmitOutcome, FormError> {
        let errors = self.draft.validate();
        if !errors.is_empty() {
            self.errors = errors.clone();
            return Err(FormError::Invalid(errors));
        }
        self.errors = ValidationErrors::new();

        let resume_phase = self.phase;
        self.phase = FormPhase::Saving;

        match self.id.clone() {
            None => match self.backend.create(&self.draft.create_payload()).await {
                Ok(id) => {
                    self.id = Some(id.clone());
                    self.phase = FormPhase::Created;
                    Ok(SubmitOutcome::Created { id })
                }
                Err(err) => {
                    self.phase = resume_phase;
                    self.absorb_violations(&err);
                    Err(err.into())
                }
            },
            Some(id) => match self.backend.update(&id, &self.draft.update_payload()).await {
                Ok(()) => {
                    self.phase = FormPhase::Updated;
                    Ok(SubmitOutcome::Updated { id })
                }
                Err(err) => {
                    self.phase = resume_phase;
                    self.absorb_violations(&err);
                    Err(err.into())
                }
            },
        }
    }

    /// Maps a structured server rejection back onto form fields. Anything
    /// without violations stays a generic error for the caller to surface.
    fn absorb_violations(&mut self, err: &ServiceError) {
        for violation in err.violations() {
            self.errors.insert(violation.field.clone(), violation.message.clone());
        }
    }
}

/// String field with a defensive default: numbers are stringified, anything
/// else becomes empty.
pub fn str_field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Numeric field with a defensive default of zero; string numbers are
/// coerced.
pub fn num_field(value: &Value, key: &str) -> f64 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Boolean field defaulting to `false`; accepts the string forms the
/// backend sometimes emits.
pub fn bool_field(value: &Value, key: &str) -> bool {
    match value.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.as_str(), "true" | "1" | "yes"),
        Some(Value::Number(n)) => n.as_i64() == Some(1),
        _ => false,
    }
}
