//! Staging state, its actions and the derived totals

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::StagedEntry;
use crate::validation::is_usable_tare_weight;

/// How the staged total relates to recorded stock
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Interpretation {
    /// The staged total replaces the recorded stock
    #[default]
    Absolute,
    /// The staged total is added to or removed from the recorded stock
    Delta,
}

impl Interpretation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Interpretation::Absolute => "absolute",
            Interpretation::Delta => "delta",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "absolute" => Some(Interpretation::Absolute),
            "delta" => Some(Interpretation::Delta),
            _ => None,
        }
    }
}

/// Sign applied to a delta
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeltaDirection {
    #[default]
    Add,
    Subtract,
}

impl DeltaDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeltaDirection::Add => "add",
            DeltaDirection::Subtract => "subtract",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "add" => Some(DeltaDirection::Add),
            "subtract" => Some(DeltaDirection::Subtract),
            _ => None,
        }
    }

    fn sign(&self) -> Decimal {
        match self {
            DeltaDirection::Add => Decimal::ONE,
            DeltaDirection::Subtract => Decimal::NEGATIVE_ONE,
        }
    }
}

/// What the surrounding application knows about the product being counted
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductContext {
    pub base_unit: Option<String>,
    pub tare_weight: Option<Decimal>,
    pub current_stock: Option<Decimal>,
}

impl ProductContext {
    pub fn has_tare_weight(&self) -> bool {
        is_usable_tare_weight(self.tare_weight)
    }

    /// Manual amounts are refused when a tare-weighed product is counted absolutely,
    /// since that count should come from weighing the container.
    pub fn permits_manual(&self, interpretation: Interpretation) -> bool {
        !(interpretation == Interpretation::Absolute && self.has_tare_weight())
    }
}

/// User actions on a staging session
#[derive(Debug, Clone, PartialEq)]
pub enum StagingAction {
    Add(StagedEntry),
    Remove(String),
    Clear,
    SetInterpretation(Interpretation),
    SetDirection(DeltaDirection),
}

/// Entries staged against one product, plus how to read them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagingState {
    pub entries: Vec<StagedEntry>,
    pub interpretation: Interpretation,
    pub direction: DeltaDirection,
}

impl StagingState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, id: &str) -> Option<&StagedEntry> {
        self.entries.iter().find(|entry| entry.id() == id)
    }

    /// Sum of submission amounts, or `None` if it does not fit in a `Decimal`
    pub fn checked_total(&self) -> Option<Decimal> {
        self.entries
            .iter()
            .try_fold(Decimal::ZERO, |total, entry| total.checked_add(entry.submission_amount()))
    }

    /// Apply one action and return the resulting state.
    ///
    /// Adding an id that is already staged and removing an absent id are no-ops.
    /// Interpretation and direction changes never touch the entries.
    pub fn apply(mut self, action: StagingAction) -> Self {
        match action {
            StagingAction::Add(entry) => {
                if self.entry(entry.id()).is_some() {
                    tracing::debug!(id = entry.id(), "ignoring entry with duplicate id");
                } else {
                    self.entries.push(entry);
                }
            }
            StagingAction::Remove(id) => {
                self.entries.retain(|entry| entry.id() != id);
            }
            StagingAction::Clear => {
                self.entries.clear();
            }
            StagingAction::SetInterpretation(interpretation) => {
                self.interpretation = interpretation;
            }
            StagingAction::SetDirection(direction) => {
                self.direction = direction;
            }
        }
        self
    }

    /// Derived totals for this state
    pub fn summarize(&self, context: &ProductContext) -> StagingSummary {
        let staged_total = saturating_sum(self.entries.iter().map(StagedEntry::submission_amount));

        let tare_context = context.has_tare_weight() || self.entries.iter().any(StagedEntry::carries_tare);
        let staged_net_preview = tare_context.then(|| {
            saturating_sum(self.entries.iter().map(StagedEntry::tare_adjusted_amount)).max(Decimal::ZERO)
        });

        let resolved_amount = match self.interpretation {
            Interpretation::Absolute => staged_total,
            Interpretation::Delta => staged_total.saturating_mul(self.direction.sign()),
        };

        let projected_stock = match self.interpretation {
            Interpretation::Absolute => Some(resolved_amount),
            Interpretation::Delta => context
                .current_stock
                .and_then(|stock| stock.checked_add(resolved_amount)),
        };

        StagingSummary {
            entry_count: self.entries.len(),
            staged_total,
            staged_net_preview,
            resolved_amount,
            is_amount_valid: !self.entries.is_empty(),
            projected_stock,
        }
    }

    /// Build the handoff for the inventory API, or `None` when nothing is staged
    pub fn submission(&self, context: &ProductContext, note: Option<String>) -> Option<StagingSubmission> {
        let summary = self.summarize(context);
        if !summary.is_amount_valid {
            return None;
        }

        let amount = match self.interpretation {
            Interpretation::Absolute => SubmissionAmount::Correction {
                new_amount: summary.resolved_amount,
            },
            Interpretation::Delta => SubmissionAmount::Adjustment {
                delta_amount: summary.resolved_amount,
            },
        };

        let metadata = serde_json::json!({
            "stagedEntryCount": summary.entry_count,
            "interpretation": self.interpretation.as_str(),
            "direction": self.direction.as_str(),
            "entryKinds": self.entries.iter().map(|e| e.kind().as_str()).collect::<Vec<_>>(),
        });

        Some(StagingSubmission {
            amount,
            note: note.filter(|n| !n.trim().is_empty()),
            metadata: Some(metadata),
        })
    }
}

fn saturating_sum(amounts: impl Iterator<Item = Decimal>) -> Decimal {
    amounts.fold(Decimal::ZERO, |total, amount| total.saturating_add(amount))
}

/// Totals recomputed from a `StagingState`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagingSummary {
    pub entry_count: usize,
    #[serde(with = "rust_decimal::serde::float")]
    pub staged_total: Decimal,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub staged_net_preview: Option<Decimal>,
    #[serde(with = "rust_decimal::serde::float")]
    pub resolved_amount: Decimal,
    /// False when nothing is staged, as opposed to a staged total of zero
    pub is_amount_valid: bool,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub projected_stock: Option<Decimal>,
}

/// Amount to submit: a correction sets the stock, an adjustment shifts it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SubmissionAmount {
    Correction {
        #[serde(rename = "newAmount", with = "rust_decimal::serde::float")]
        new_amount: Decimal,
    },
    Adjustment {
        #[serde(rename = "deltaAmount", with = "rust_decimal::serde::float")]
        delta_amount: Decimal,
    },
}

/// Value handed to the inventory correction or adjustment call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StagingSubmission {
    #[serde(flatten)]
    pub amount: SubmissionAmount,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}
