//! Staging session controller
//!
//! Owns the staging state for one product and mirrors it into persistence
//! after every mutation, but only once the snapshot for the current key has
//! been loaded. Framework adapters drive this type; it has no UI dependency.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{StagingError, StagingResult};
use crate::models::{
    resolve_conversion, ConversionInput, DeltaDirection, EntryKind, Interpretation, ProductContext,
    StagedEntry, StagingAction, StagingState, StagingSubmission, StagingSummary,
    UnitConversionDefinition,
};
use crate::persistence::{LoadOutcome, StagingKey, StagingPersistence, StagingStore};
use crate::sequence::{RequestSequencer, RequestTicket};

/// Product details fetched from the backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductMetadata {
    #[serde(default)]
    pub base_unit: Option<String>,
    #[serde(default)]
    pub tare_weight: Option<Decimal>,
    #[serde(default)]
    pub current_stock: Option<Decimal>,
    #[serde(default)]
    pub conversions: Vec<UnitConversionDefinition>,
}

/// A reading in some unit, to be converted into the product's base unit
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRequest {
    pub gross_amount: Decimal,
    pub unit: String,
    pub tare_applied: bool,
    /// Overrides the tare recorded on the conversion definition
    pub tare_amount: Option<Decimal>,
}

pub struct StagingSession<S> {
    persistence: StagingPersistence<S>,
    key: StagingKey,
    context: ProductContext,
    conversions: Vec<UnitConversionDefinition>,
    state: StagingState,
    hydrated: bool,
    persist_enabled: bool,
    metadata_requests: RequestSequencer,
}

impl<S: StagingStore> StagingSession<S> {
    pub fn new(persistence: StagingPersistence<S>, key: StagingKey, context: ProductContext) -> Self {
        Self {
            persistence,
            key,
            context,
            conversions: Vec::new(),
            state: StagingState::new(),
            hydrated: false,
            persist_enabled: true,
            metadata_requests: RequestSequencer::new(),
        }
    }

    pub fn with_conversions(mut self, conversions: Vec<UnitConversionDefinition>) -> Self {
        self.conversions = conversions;
        self
    }

    pub fn set_conversions(&mut self, conversions: Vec<UnitConversionDefinition>) {
        self.conversions = conversions;
    }

    pub fn key(&self) -> &StagingKey {
        &self.key
    }

    pub fn context(&self) -> &ProductContext {
        &self.context
    }

    pub fn conversions(&self) -> &[UnitConversionDefinition] {
        &self.conversions
    }

    pub fn state(&self) -> &StagingState {
        &self.state
    }

    pub fn entries(&self) -> &[StagedEntry] {
        &self.state.entries
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    /// False once a write has failed; staging then stays in memory only
    pub fn is_persistence_enabled(&self) -> bool {
        self.persist_enabled
    }

    pub fn persistence(&self) -> &StagingPersistence<S> {
        &self.persistence
    }

    /// Load the snapshot for the current key and open the persistence gate.
    ///
    /// A usable snapshot replaces anything staged before hydration; otherwise
    /// the in-memory entries are kept and written out.
    pub fn hydrate(&mut self, now: DateTime<Utc>) -> LoadOutcome {
        let outcome = self.persistence.load(&self.key, &self.context, now);
        self.hydrated = true;

        match &outcome {
            LoadOutcome::Hydrated { state, dropped } => {
                tracing::debug!(
                    product = %self.key.product_id,
                    entries = state.entries.len(),
                    dropped,
                    "hydrated staging"
                );
                self.state = state.clone();
                if *dropped > 0 {
                    self.persist(now);
                }
            }
            _ => {
                if !self.state.is_empty() {
                    self.persist(now);
                }
            }
        }

        outcome
    }

    /// Apply an action and mirror the result.
    ///
    /// Actions that would leave the staging area in a state the product
    /// cannot submit are refused and nothing changes.
    pub fn dispatch(&mut self, action: StagingAction, now: DateTime<Utc>) -> StagingResult<()> {
        self.admit(&action)?;
        self.commit(action, now);
        Ok(())
    }

    fn admit(&self, action: &StagingAction) -> StagingResult<()> {
        match action {
            StagingAction::Add(StagedEntry::Manual(_)) if !self.context.permits_manual(self.state.interpretation) => {
                Err(StagingError::ManualEntryNotAllowed)
            }
            StagingAction::Add(entry) => self
                .state
                .checked_total()
                .and_then(|total| total.checked_add(entry.submission_amount()))
                .map(|_| ())
                .ok_or(StagingError::AmountOutOfRange { field: "stagedTotal" }),
            StagingAction::SetInterpretation(interpretation)
                if !self.context.permits_manual(*interpretation)
                    && self.state.entries.iter().any(|e| e.kind() == EntryKind::Manual) =>
            {
                Err(StagingError::ManualEntriesStaged)
            }
            _ => Ok(()),
        }
    }

    fn commit(&mut self, action: StagingAction, now: DateTime<Utc>) {
        let state = std::mem::take(&mut self.state);
        self.state = state.apply(action);
        self.persist(now);
    }

    fn stage(&mut self, entry: StagedEntry, now: DateTime<Utc>) -> StagingResult<String> {
        let id = entry.id().to_string();
        self.dispatch(StagingAction::Add(entry), now)?;
        Ok(id)
    }

    /// Stage a container reading against the product's tare weight
    pub fn add_tare_entry(&mut self, gross_amount: Decimal, now: DateTime<Utc>) -> StagingResult<String> {
        let tare_weight = self
            .context
            .tare_weight
            .filter(|_| self.context.has_tare_weight())
            .ok_or(StagingError::TareWeightMissing)?;
        let entry = StagedEntry::tare(gross_amount, tare_weight)?;
        self.stage(entry, now)
    }

    pub fn add_package_entry(
        &mut self,
        quantity: Decimal,
        package_size: Decimal,
        now: DateTime<Utc>,
    ) -> StagingResult<String> {
        let entry = StagedEntry::package(quantity, package_size)?;
        self.stage(entry, now)
    }

    pub fn add_manual_entry(&mut self, amount: Decimal, now: DateTime<Utc>) -> StagingResult<String> {
        let entry = StagedEntry::manual(amount)?;
        self.stage(entry, now)
    }

    /// Stage a reading taken in another unit, converted into the base unit
    pub fn add_conversion_entry(
        &mut self,
        request: MeasurementRequest,
        now: DateTime<Utc>,
    ) -> StagingResult<String> {
        let base_unit = self
            .context
            .base_unit
            .clone()
            .filter(|unit| !unit.trim().is_empty())
            .ok_or(StagingError::MissingUnit)?;
        if request.unit.trim().is_empty() {
            return Err(StagingError::MissingUnit);
        }

        let resolved = resolve_conversion(&self.conversions, &request.unit, &base_unit).ok_or_else(|| {
            StagingError::NoConversionPath {
                from: request.unit.clone(),
                to: base_unit.clone(),
            }
        })?;

        let tare_amount = if request.tare_applied {
            request.tare_amount.or(resolved.tare).unwrap_or(Decimal::ZERO)
        } else {
            Decimal::ZERO
        };

        let entry = StagedEntry::conversion(ConversionInput {
            gross_amount: request.gross_amount,
            from_unit: request.unit,
            to_unit: base_unit,
            factor: resolved.factor,
            tare_applied: request.tare_applied,
            tare_amount,
        })?;
        self.stage(entry, now)
    }

    pub fn remove_entry(&mut self, id: &str, now: DateTime<Utc>) {
        self.commit(StagingAction::Remove(id.to_string()), now);
    }

    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.commit(StagingAction::Clear, now);
    }

    /// Refused while manual entries are staged for a product that would no
    /// longer accept them
    pub fn set_interpretation(&mut self, interpretation: Interpretation, now: DateTime<Utc>) -> StagingResult<()> {
        self.dispatch(StagingAction::SetInterpretation(interpretation), now)
    }

    pub fn set_direction(&mut self, direction: DeltaDirection, now: DateTime<Utc>) {
        self.commit(StagingAction::SetDirection(direction), now);
    }

    pub fn summary(&self) -> StagingSummary {
        self.state.summarize(&self.context)
    }

    /// Handoff for the inventory API
    pub fn submission(&self, note: Option<String>) -> StagingResult<StagingSubmission> {
        self.state
            .submission(&self.context, note)
            .ok_or(StagingError::NothingStaged)
    }

    /// Record how the submission went. Entries are only cleared on success so
    /// a failed call can be retried without re-entering measurements.
    pub fn complete_submission<E: std::fmt::Display>(&mut self, result: Result<(), E>, now: DateTime<Utc>) -> bool {
        match result {
            Ok(()) => {
                self.clear(now);
                true
            }
            Err(e) => {
                tracing::warn!(product = %self.key.product_id, error = %e, "submission failed, keeping staged entries");
                false
            }
        }
    }

    /// Start a metadata lookup; only the newest lookup's result is applied
    pub fn begin_metadata_fetch(&mut self) -> RequestTicket {
        self.metadata_requests.issue()
    }

    pub fn apply_metadata(&mut self, ticket: RequestTicket, metadata: ProductMetadata) -> bool {
        if !self.metadata_requests.is_current(ticket) {
            tracing::debug!(ticket = ticket.sequence(), "discarding superseded product metadata");
            return false;
        }
        self.context = ProductContext {
            base_unit: metadata.base_unit,
            tare_weight: metadata.tare_weight,
            current_stock: metadata.current_stock,
        };
        self.conversions = metadata.conversions;
        true
    }

    /// Move to another product: in-flight lookups are superseded and the new
    /// key is hydrated before anything is written to it.
    pub fn switch_product(&mut self, key: StagingKey, context: ProductContext, now: DateTime<Utc>) -> LoadOutcome {
        self.metadata_requests.issue();
        self.key = key;
        self.context = context;
        self.conversions.clear();
        self.state = StagingState::new();
        self.hydrated = false;
        self.hydrate(now)
    }

    /// Mirror the state into the store. After a failed write the snapshot on
    /// disk no longer matches memory, so it is removed rather than left to be
    /// hydrated later.
    fn persist(&mut self, now: DateTime<Utc>) {
        if !self.hydrated {
            return;
        }
        if !self.persist_enabled {
            if self.state.is_empty() {
                self.forget_snapshot();
            }
            return;
        }
        if let Err(e) = self.persistence.save(&self.key, &self.state, now) {
            tracing::warn!(
                product = %self.key.product_id,
                error = %e,
                "failed to persist staging, continuing in memory"
            );
            self.persist_enabled = false;
            self.forget_snapshot();
        }
    }

    fn forget_snapshot(&mut self) {
        if let Err(e) = self.persistence.clear(&self.key) {
            tracing::warn!(product = %self.key.product_id, error = %e, "failed to remove stale staging snapshot");
        }
    }
}
