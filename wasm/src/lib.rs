//! WebAssembly bindings for inventory staging
//!
//! Provides the browser side of the staging engine:
//! - A `StagingHandle` the form components drive on every user action
//! - `localStorage` persistence for staged entries
//! - Unit conversion lookups for populating unit pickers
//!
//! Amounts cross the JS boundary as `f64`; structured values as JSON strings.

use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::validation::*;

use shared::{
    encode_entry, LoadOutcome, MeasurementRequest, ProductContext, ProductMetadata, RequestTicket,
    StagingKey, StagingPersistence, StagingSession, StagingStore, StoreError, DEFAULT_NAMESPACE,
};

fn now() -> DateTime<Utc> {
    Utc.timestamp_millis_opt(js_sys::Date::now() as i64)
        .single()
        .unwrap_or_default()
}

fn to_js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

/// `window.localStorage`, or nothing when the page has no storage (private mode, workers)
pub struct LocalStorageStore {
    storage: Option<web_sys::Storage>,
}

impl LocalStorageStore {
    pub fn new() -> Self {
        let storage = web_sys::window().and_then(|window| window.local_storage().ok().flatten());
        if storage.is_none() {
            web_sys::console::warn_1(&"localStorage unavailable, staging will not survive reloads".into());
        }
        Self { storage }
    }

    fn storage(&self) -> Result<&web_sys::Storage, StoreError> {
        self.storage
            .as_ref()
            .ok_or_else(|| StoreError::Unavailable("localStorage".to_string()))
    }
}

impl Default for LocalStorageStore {
    fn default() -> Self {
        Self::new()
    }
}

fn store_error(e: JsValue) -> StoreError {
    let description = format!("{:?}", e);
    if description.contains("QuotaExceeded") {
        StoreError::QuotaExceeded
    } else {
        StoreError::Unavailable(description)
    }
}

impl StagingStore for LocalStorageStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        match &self.storage {
            Some(storage) => storage.get_item(key).map_err(store_error),
            None => Ok(None),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.storage()?.set_item(key, value).map_err(store_error)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        match &self.storage {
            Some(storage) => storage.remove_item(key).map_err(store_error),
            None => Ok(()),
        }
    }
}

/// Parse product metadata JSON into a context and its conversion table
pub fn parse_metadata(metadata_json: Option<&str>) -> Result<ProductMetadata, String> {
    match metadata_json {
        Some(json) if !json.trim().is_empty() => {
            serde_json::from_str(json).map_err(|e| format!("Invalid metadata JSON: {}", e))
        }
        _ => Ok(ProductMetadata::default()),
    }
}

fn context_of(metadata: &ProductMetadata) -> ProductContext {
    ProductContext {
        base_unit: metadata.base_unit.clone(),
        tare_weight: metadata.tare_weight,
        current_stock: metadata.current_stock,
    }
}

/// Name reported to JS for a load outcome
pub fn outcome_name(outcome: &LoadOutcome) -> &'static str {
    match outcome {
        LoadOutcome::Hydrated { .. } => "hydrated",
        LoadOutcome::Missing => "missing",
        LoadOutcome::Expired => "expired",
        LoadOutcome::Corrupt => "corrupt",
    }
}

/// Staging for one product, bound to the browser
#[wasm_bindgen]
pub struct StagingHandle {
    session: StagingSession<LocalStorageStore>,
}

#[wasm_bindgen]
impl StagingHandle {
    /// Create a handle. Call `hydrate` once product metadata is known.
    #[wasm_bindgen(constructor)]
    pub fn new(
        namespace: Option<String>,
        instance_id: &str,
        product_id: &str,
        metadata_json: Option<String>,
    ) -> Result<StagingHandle, JsValue> {
        let metadata = parse_metadata(metadata_json.as_deref()).map_err(to_js_error)?;
        let persistence = StagingPersistence::new(
            LocalStorageStore::new(),
            namespace.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
            chrono::Duration::hours(shared::DEFAULT_MAX_AGE_HOURS),
        );
        let session = StagingSession::new(
            persistence,
            StagingKey::new(instance_id, product_id),
            context_of(&metadata),
        )
        .with_conversions(metadata.conversions);

        Ok(StagingHandle { session })
    }

    /// Load persisted entries; returns "hydrated", "missing", "expired" or "corrupt"
    pub fn hydrate(&mut self) -> String {
        outcome_name(&self.session.hydrate(now())).to_string()
    }

    pub fn is_hydrated(&self) -> bool {
        self.session.is_hydrated()
    }

    /// Start a metadata request; pass the ticket back to `apply_metadata`
    pub fn begin_metadata_fetch(&mut self) -> f64 {
        self.session.begin_metadata_fetch().sequence() as f64
    }

    /// Apply fetched metadata unless a newer request has been issued since
    pub fn apply_metadata(&mut self, ticket: f64, metadata_json: &str) -> Result<bool, JsValue> {
        let metadata = parse_metadata(Some(metadata_json)).map_err(to_js_error)?;
        let ticket = RequestTicket::from_sequence(ticket as u64);
        Ok(self.session.apply_metadata(ticket, metadata))
    }

    /// Move to another product of the same instance and hydrate it
    pub fn switch_product(&mut self, product_id: &str, metadata_json: Option<String>) -> Result<String, JsValue> {
        let metadata = parse_metadata(metadata_json.as_deref()).map_err(to_js_error)?;
        let key = StagingKey::new(self.session.key().instance_id.clone(), product_id);
        let context = context_of(&metadata);
        let outcome = self.session.switch_product(key, context, now());
        self.session.set_conversions(metadata.conversions);
        Ok(outcome_name(&outcome).to_string())
    }

    pub fn add_tare_entry(&mut self, gross_amount: f64) -> Result<String, JsValue> {
        let gross = decimal_from_input(gross_amount, "grossAmount").map_err(to_js_error)?;
        self.session.add_tare_entry(gross, now()).map_err(to_js_error)
    }

    pub fn add_package_entry(&mut self, quantity: f64, package_size: f64) -> Result<String, JsValue> {
        let quantity = decimal_from_input(quantity, "quantity").map_err(to_js_error)?;
        let size = decimal_from_input(package_size, "packageSize").map_err(to_js_error)?;
        self.session
            .add_package_entry(quantity, size, now())
            .map_err(to_js_error)
    }

    pub fn add_manual_entry(&mut self, amount: f64) -> Result<String, JsValue> {
        let amount = decimal_from_input(amount, "submissionAmount").map_err(to_js_error)?;
        self.session.add_manual_entry(amount, now()).map_err(to_js_error)
    }

    pub fn add_conversion_entry(
        &mut self,
        gross_amount: f64,
        unit: &str,
        tare_applied: bool,
        tare_amount: Option<f64>,
    ) -> Result<String, JsValue> {
        let gross = decimal_from_input(gross_amount, "grossAmount").map_err(to_js_error)?;
        let tare = tare_amount
            .map(|t| decimal_from_input(t, "tareAmount"))
            .transpose()
            .map_err(to_js_error)?;
        let request = MeasurementRequest {
            gross_amount: gross,
            unit: unit.to_string(),
            tare_applied,
            tare_amount: tare,
        };
        self.session
            .add_conversion_entry(request, now())
            .map_err(to_js_error)
    }

    pub fn remove_entry(&mut self, id: &str) {
        self.session.remove_entry(id, now());
    }

    pub fn clear(&mut self) {
        self.session.clear(now());
    }

    pub fn set_interpretation(&mut self, interpretation: &str) -> Result<(), JsValue> {
        let interpretation = Interpretation::parse(interpretation)
            .ok_or_else(|| JsValue::from_str("interpretation must be 'absolute' or 'delta'"))?;
        self.session.set_interpretation(interpretation, now()).map_err(to_js_error)
    }

    pub fn set_direction(&mut self, direction: &str) -> Result<(), JsValue> {
        let direction = DeltaDirection::parse(direction)
            .ok_or_else(|| JsValue::from_str("direction must be 'add' or 'subtract'"))?;
        self.session.set_direction(direction, now());
        Ok(())
    }

    /// Staged entries in display order, as a JSON array
    pub fn entries_json(&self) -> String {
        let entries: Vec<serde_json::Value> = self.session.entries().iter().map(encode_entry).collect();
        serde_json::Value::Array(entries).to_string()
    }

    pub fn summary_json(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.session.summary()).map_err(to_js_error)
    }

    pub fn resolved_amount(&self) -> f64 {
        to_f64(self.session.summary().resolved_amount)
    }

    pub fn is_amount_valid(&self) -> bool {
        self.session.summary().is_amount_valid
    }

    /// Payload for the inventory correction or adjustment call
    pub fn submission_json(&self, note: Option<String>) -> Result<String, JsValue> {
        let submission = self.session.submission(note).map_err(to_js_error)?;
        serde_json::to_string(&submission).map_err(to_js_error)
    }

    /// Report the API result; entries are cleared only on success
    pub fn complete_submission(&mut self, success: bool, message: Option<String>) -> bool {
        let result = if success {
            Ok(())
        } else {
            Err(message.unwrap_or_else(|| "submission failed".to_string()))
        };
        self.session.complete_submission(result, now())
    }

    /// Units the current product can be measured in, as a JSON array
    pub fn convertible_units_json(&self) -> String {
        let units = match &self.session.context().base_unit {
            Some(base) => convertible_units(self.session.conversions(), base),
            None => Vec::new(),
        };
        serde_json::to_string(&units).unwrap_or_else(|_| "[]".to_string())
    }
}

/// Resolve a conversion factor from a JSON conversion table; `undefined` when no path exists
#[wasm_bindgen]
pub fn resolve_unit_factor(conversions_json: &str, from_unit: &str, to_unit: &str) -> Result<Option<f64>, JsValue> {
    let conversions: Vec<UnitConversionDefinition> = serde_json::from_str(conversions_json)
        .map_err(|e| JsValue::from_str(&format!("Invalid conversions JSON: {}", e)))?;
    Ok(resolve_factor(&conversions, from_unit, to_unit).map(to_f64))
}

/// Net weight of a container reading, clamped at zero
#[wasm_bindgen]
pub fn calculate_net_amount(gross_amount: f64, tare_weight: f64) -> f64 {
    if !gross_amount.is_finite() || !tare_weight.is_finite() {
        return 0.0;
    }
    (gross_amount - tare_weight).max(0.0)
}
