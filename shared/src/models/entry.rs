//! Staged measurement entries
//!
//! Every entry reduces to a `submission_amount` in the product's base unit.
//! Entries are immutable: fields are private and there are no setters, so a
//! correction is always a remove followed by a new entry.

use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use crate::error::{StagingError, StagingResult};
use crate::validation::{validate_factor, validate_non_negative, validate_unit};

/// Decimal places kept on converted amounts
pub const CONVERSION_DECIMALS: u32 = 6;

fn new_entry_id() -> String {
    Uuid::new_v4().to_string()
}

/// Subtract a tare, treating a reading below the tare as empty
fn net_of_tare(gross: Decimal, tare: Decimal) -> Decimal {
    (gross - tare).max(Decimal::ZERO)
}

/// Kind tag of a staged entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Tare,
    Package,
    Manual,
    Conversion,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Tare => "tare",
            EntryKind::Package => "package",
            EntryKind::Manual => "manual",
            EntryKind::Conversion => "conversion",
        }
    }

    /// Parse a persisted kind tag; `measurement` is an older name for conversions
    pub fn parse(tag: &str) -> Option<Self> {
        match tag {
            "tare" => Some(EntryKind::Tare),
            "package" => Some(EntryKind::Package),
            "manual" => Some(EntryKind::Manual),
            "conversion" | "measurement" => Some(EntryKind::Conversion),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A container weighed on a scale with the product's tare weight removed
#[derive(Debug, Clone, PartialEq)]
pub struct TareEntry {
    id: String,
    gross_amount: Decimal,
    tare_weight: Decimal,
    net_amount: Decimal,
}

impl TareEntry {
    pub fn new(gross_amount: Decimal, tare_weight: Decimal) -> StagingResult<Self> {
        Self::with_id(new_entry_id(), gross_amount, tare_weight)
    }

    pub(crate) fn with_id(
        id: String,
        gross_amount: Decimal,
        tare_weight: Decimal,
    ) -> StagingResult<Self> {
        validate_non_negative(gross_amount, "grossAmount")?;
        validate_non_negative(tare_weight, "tareWeight")?;
        Ok(Self {
            id,
            gross_amount,
            tare_weight,
            net_amount: net_of_tare(gross_amount, tare_weight),
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn gross_amount(&self) -> Decimal {
        self.gross_amount
    }

    pub fn tare_weight(&self) -> Decimal {
        self.tare_weight
    }

    pub fn net_amount(&self) -> Decimal {
        self.net_amount
    }
}

/// A number of sealed packages of known size
#[derive(Debug, Clone, PartialEq)]
pub struct PackageEntry {
    id: String,
    quantity: Decimal,
    package_size: Decimal,
    submission_amount: Decimal,
}

impl PackageEntry {
    pub fn new(quantity: Decimal, package_size: Decimal) -> StagingResult<Self> {
        Self::with_id(new_entry_id(), quantity, package_size)
    }

    pub(crate) fn with_id(id: String, quantity: Decimal, package_size: Decimal) -> StagingResult<Self> {
        validate_non_negative(quantity, "quantity")?;
        validate_non_negative(package_size, "packageSize")?;
        let submission_amount = quantity
            .checked_mul(package_size)
            .ok_or(StagingError::AmountOutOfRange { field: "submissionAmount" })?;
        Ok(Self {
            id,
            quantity,
            package_size,
            submission_amount,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn quantity(&self) -> Decimal {
        self.quantity
    }

    pub fn package_size(&self) -> Decimal {
        self.package_size
    }

    pub fn submission_amount(&self) -> Decimal {
        self.submission_amount
    }
}

/// An amount typed in directly, already in the base unit
#[derive(Debug, Clone, PartialEq)]
pub struct ManualEntry {
    id: String,
    submission_amount: Decimal,
}

impl ManualEntry {
    pub fn new(amount: Decimal) -> StagingResult<Self> {
        Self::with_id(new_entry_id(), amount)
    }

    pub(crate) fn with_id(id: String, amount: Decimal) -> StagingResult<Self> {
        validate_non_negative(amount, "submissionAmount")?;
        Ok(Self {
            id,
            submission_amount: amount,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn submission_amount(&self) -> Decimal {
        self.submission_amount
    }
}

/// Raw values for a measurement taken in a foreign unit
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionInput {
    pub gross_amount: Decimal,
    pub from_unit: String,
    pub to_unit: String,
    pub factor: Decimal,
    pub tare_applied: bool,
    /// Expressed in `from_unit`; ignored unless `tare_applied`
    pub tare_amount: Decimal,
}

/// A measurement converted into the base unit, kept with its audit trail
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionEntry {
    id: String,
    gross_amount: Decimal,
    from_unit: String,
    to_unit: String,
    factor: Decimal,
    tare_applied: bool,
    tare_amount: Decimal,
    net_amount: Decimal,
    submission_amount: Decimal,
}

impl ConversionEntry {
    pub fn new(input: ConversionInput) -> StagingResult<Self> {
        Self::with_id(new_entry_id(), input)
    }

    pub(crate) fn with_id(id: String, input: ConversionInput) -> StagingResult<Self> {
        validate_non_negative(input.gross_amount, "grossAmount")?;
        validate_non_negative(input.tare_amount, "tareAmount")?;
        validate_factor(input.factor)?;
        let from_unit = validate_unit(&input.from_unit)?;
        let to_unit = validate_unit(&input.to_unit)?;

        let net_amount = if input.tare_applied {
            net_of_tare(input.gross_amount, input.tare_amount)
        } else {
            input.gross_amount
        };
        let submission_amount = net_amount
            .checked_mul(input.factor)
            .ok_or(StagingError::AmountOutOfRange { field: "submissionAmount" })?
            .round_dp_with_strategy(CONVERSION_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
            .normalize();

        Ok(Self {
            id,
            gross_amount: input.gross_amount,
            from_unit,
            to_unit,
            factor: input.factor,
            tare_applied: input.tare_applied,
            tare_amount: if input.tare_applied {
                input.tare_amount
            } else {
                Decimal::ZERO
            },
            net_amount,
            submission_amount,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn gross_amount(&self) -> Decimal {
        self.gross_amount
    }

    pub fn from_unit(&self) -> &str {
        &self.from_unit
    }

    pub fn to_unit(&self) -> &str {
        &self.to_unit
    }

    pub fn factor(&self) -> Decimal {
        self.factor
    }

    pub fn tare_applied(&self) -> bool {
        self.tare_applied
    }

    pub fn tare_amount(&self) -> Decimal {
        self.tare_amount
    }

    /// Net amount in `from_unit`, before conversion
    pub fn net_amount(&self) -> Decimal {
        self.net_amount
    }

    pub fn submission_amount(&self) -> Decimal {
        self.submission_amount
    }
}

/// One staged measurement
#[derive(Debug, Clone, PartialEq)]
pub enum StagedEntry {
    Tare(TareEntry),
    Package(PackageEntry),
    Manual(ManualEntry),
    Conversion(ConversionEntry),
}

impl StagedEntry {
    pub fn tare(gross_amount: Decimal, tare_weight: Decimal) -> StagingResult<Self> {
        TareEntry::new(gross_amount, tare_weight).map(StagedEntry::Tare)
    }

    pub fn package(quantity: Decimal, package_size: Decimal) -> StagingResult<Self> {
        PackageEntry::new(quantity, package_size).map(StagedEntry::Package)
    }

    pub fn manual(amount: Decimal) -> StagingResult<Self> {
        ManualEntry::new(amount).map(StagedEntry::Manual)
    }

    pub fn conversion(input: ConversionInput) -> StagingResult<Self> {
        ConversionEntry::new(input).map(StagedEntry::Conversion)
    }

    pub fn id(&self) -> &str {
        match self {
            StagedEntry::Tare(e) => e.id(),
            StagedEntry::Package(e) => e.id(),
            StagedEntry::Manual(e) => e.id(),
            StagedEntry::Conversion(e) => e.id(),
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            StagedEntry::Tare(_) => EntryKind::Tare,
            StagedEntry::Package(_) => EntryKind::Package,
            StagedEntry::Manual(_) => EntryKind::Manual,
            StagedEntry::Conversion(_) => EntryKind::Conversion,
        }
    }

    /// Amount this entry contributes, in the product's base unit
    pub fn submission_amount(&self) -> Decimal {
        match self {
            StagedEntry::Tare(e) => e.net_amount(),
            StagedEntry::Package(e) => e.submission_amount(),
            StagedEntry::Manual(e) => e.submission_amount(),
            StagedEntry::Conversion(e) => e.submission_amount(),
        }
    }

    /// Whether a tare was subtracted to produce this entry
    pub fn carries_tare(&self) -> bool {
        match self {
            StagedEntry::Tare(_) => true,
            StagedEntry::Conversion(e) => e.tare_applied(),
            _ => false,
        }
    }

    /// Contribution to the net preview.
    ///
    /// Converted entries already carry their tare inside the base-unit amount,
    /// so only plain tare entries report their net reading directly.
    pub fn tare_adjusted_amount(&self) -> Decimal {
        match self {
            StagedEntry::Tare(e) => e.net_amount(),
            other => other.submission_amount(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn lb_to_g(gross: &str) -> ConversionInput {
        ConversionInput {
            gross_amount: dec(gross),
            from_unit: "lb".to_string(),
            to_unit: "g".to_string(),
            factor: dec("453.592"),
            tare_applied: false,
            tare_amount: Decimal::ZERO,
        }
    }

    #[test]
    fn test_tare_entry_subtracts_tare() {
        let entry = TareEntry::new(dec("230"), dec("50")).unwrap();
        assert_eq!(entry.net_amount(), dec("180"));
        assert_eq!(entry.gross_amount(), dec("230"));
    }

    #[test]
    fn test_tare_entry_clamps_below_tare() {
        let entry = TareEntry::new(dec("30"), dec("50")).unwrap();
        assert_eq!(entry.net_amount(), Decimal::ZERO);
    }

    #[test]
    fn test_tare_entry_rejects_negative_reading() {
        assert_eq!(
            TareEntry::new(dec("-1"), dec("50")),
            Err(StagingError::Negative { field: "grossAmount" })
        );
    }

    #[test]
    fn test_package_entry_multiplies() {
        let entry = PackageEntry::new(dec("3"), dec("500")).unwrap();
        assert_eq!(entry.submission_amount(), dec("1500"));

        let half = PackageEntry::new(dec("0.5"), dec("250")).unwrap();
        assert_eq!(half.submission_amount(), dec("125"));
    }

    #[test]
    fn test_package_entry_allows_zero() {
        let entry = PackageEntry::new(Decimal::ZERO, dec("500")).unwrap();
        assert_eq!(entry.submission_amount(), Decimal::ZERO);
    }

    #[test]
    fn test_oversized_products_are_refused() {
        let huge = dec("1000000000000000");
        assert_eq!(
            StagedEntry::package(huge, huge),
            Err(StagingError::AmountOutOfRange { field: "submissionAmount" })
        );

        let mut input = lb_to_g("1000000000000000000000000000");
        input.factor = huge;
        assert_eq!(
            StagedEntry::conversion(input),
            Err(StagingError::AmountOutOfRange { field: "submissionAmount" })
        );
    }

    #[test]
    fn test_manual_entry_rejects_negative() {
        assert!(ManualEntry::new(dec("120")).is_ok());
        assert!(ManualEntry::new(Decimal::ZERO).is_ok());
        assert!(ManualEntry::new(dec("-0.5")).is_err());
    }

    #[test]
    fn test_conversion_entry_without_tare() {
        let entry = ConversionEntry::new(lb_to_g("2")).unwrap();
        assert_eq!(entry.net_amount(), dec("2"));
        assert_eq!(entry.submission_amount(), dec("907.184"));
        assert!(!entry.tare_applied());
        assert_eq!(entry.tare_amount(), Decimal::ZERO);
    }

    #[test]
    fn test_conversion_entry_with_tare() {
        let mut input = lb_to_g("2.5");
        input.tare_applied = true;
        input.tare_amount = dec("0.5");
        let entry = ConversionEntry::new(input).unwrap();
        assert_eq!(entry.net_amount(), dec("2"));
        assert_eq!(entry.submission_amount(), dec("907.184"));
        assert_eq!(entry.tare_amount(), dec("0.5"));
    }

    #[test]
    fn test_conversion_entry_rounds_to_six_places() {
        let input = ConversionInput {
            gross_amount: dec("1"),
            from_unit: "g".to_string(),
            to_unit: "lb".to_string(),
            factor: Decimal::ONE / dec("453.592"),
            tare_applied: false,
            tare_amount: Decimal::ZERO,
        };
        let entry = ConversionEntry::new(input).unwrap();
        assert_eq!(entry.submission_amount(), dec("0.002205"));
        assert!(entry.submission_amount().scale() <= CONVERSION_DECIMALS);
    }

    #[test]
    fn test_conversion_entry_normalizes_units() {
        let mut input = lb_to_g("1");
        input.from_unit = " LB ".to_string();
        let entry = ConversionEntry::new(input).unwrap();
        assert_eq!(entry.from_unit(), "lb");

        let mut missing = lb_to_g("1");
        missing.to_unit = String::new();
        assert_eq!(ConversionEntry::new(missing), Err(StagingError::MissingUnit));
    }

    #[test]
    fn test_conversion_entry_rejects_zero_factor() {
        let mut input = lb_to_g("1");
        input.factor = Decimal::ZERO;
        assert!(ConversionEntry::new(input).is_err());
    }

    #[test]
    fn test_entry_ids_are_unique() {
        let a = StagedEntry::manual(dec("1")).unwrap();
        let b = StagedEntry::manual(dec("1")).unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_carries_tare() {
        assert!(StagedEntry::tare(dec("100"), dec("10")).unwrap().carries_tare());
        assert!(!StagedEntry::package(dec("1"), dec("10")).unwrap().carries_tare());
        assert!(!StagedEntry::conversion(lb_to_g("1")).unwrap().carries_tare());

        let mut input = lb_to_g("1");
        input.tare_applied = true;
        assert!(StagedEntry::conversion(input).unwrap().carries_tare());
    }

    #[test]
    fn test_kind_tags() {
        assert_eq!(EntryKind::parse("measurement"), Some(EntryKind::Conversion));
        assert_eq!(EntryKind::parse("tare"), Some(EntryKind::Tare));
        assert_eq!(EntryKind::parse("weighed"), None);
        assert_eq!(EntryKind::Package.to_string(), "package");
    }
}
