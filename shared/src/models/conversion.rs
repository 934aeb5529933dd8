//! Unit conversion definitions and the direct-path resolver

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Where a conversion definition comes from
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConversionSource {
    #[default]
    Universal,
    Product,
}

/// A directed conversion: 1 `from_unit` = `factor` `to_unit`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UnitConversionDefinition {
    pub from_unit: String,
    pub to_unit: String,
    pub factor: Decimal,
    /// Container weight, recorded against this direction only
    #[serde(default)]
    pub tare: Option<Decimal>,
    #[serde(default)]
    pub source: ConversionSource,
}

impl UnitConversionDefinition {
    pub fn new(from_unit: impl Into<String>, to_unit: impl Into<String>, factor: Decimal) -> Self {
        Self {
            from_unit: from_unit.into(),
            to_unit: to_unit.into(),
            factor,
            tare: None,
            source: ConversionSource::Universal,
        }
    }

    pub fn with_tare(mut self, tare: Decimal) -> Self {
        self.tare = Some(tare);
        self
    }

    pub fn for_product(mut self) -> Self {
        self.source = ConversionSource::Product;
        self
    }

    fn connects(&self, from: &str, to: &str) -> bool {
        normalize_unit(&self.from_unit) == from && normalize_unit(&self.to_unit) == to
    }
}

/// Outcome of a successful lookup
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedConversion {
    pub factor: Decimal,
    /// Only present when the definition was found in its recorded direction
    pub tare: Option<Decimal>,
    pub reversed: bool,
}

/// Trim and lower-case a unit name for comparison
pub fn normalize_unit(unit: &str) -> String {
    unit.trim().to_lowercase()
}

/// Find the first usable definition for an exact direction, product-specific first
fn find_direct<'a>(
    conversions: &'a [UnitConversionDefinition],
    from: &str,
    to: &str,
) -> Option<&'a UnitConversionDefinition> {
    let usable = |c: &&UnitConversionDefinition| c.factor > Decimal::ZERO && c.connects(from, to);

    conversions
        .iter()
        .filter(|c| c.source == ConversionSource::Product)
        .find(usable)
        .or_else(|| {
            conversions
                .iter()
                .filter(|c| c.source == ConversionSource::Universal)
                .find(usable)
        })
}

/// Resolve a conversion between two units using directly stated relationships.
///
/// Identical units resolve to a factor of one without consulting the table.
/// A reverse definition is inverted; its tare is not carried over because a
/// container's gross-to-net relationship only holds in the recorded direction.
/// There is no transitive search across several definitions.
pub fn resolve_conversion(
    conversions: &[UnitConversionDefinition],
    from_unit: &str,
    to_unit: &str,
) -> Option<ResolvedConversion> {
    let from = normalize_unit(from_unit);
    let to = normalize_unit(to_unit);

    if from == to {
        return Some(ResolvedConversion {
            factor: Decimal::ONE,
            tare: None,
            reversed: false,
        });
    }

    if let Some(direct) = find_direct(conversions, &from, &to) {
        return Some(ResolvedConversion {
            factor: direct.factor,
            tare: direct.tare,
            reversed: false,
        });
    }

    let reverse = find_direct(conversions, &to, &from)?;
    let factor = Decimal::ONE.checked_div(reverse.factor)?;
    Some(ResolvedConversion {
        factor,
        tare: None,
        reversed: true,
    })
}

/// Multiplier from `from_unit` to `to_unit`, or `None` when no direct path exists
pub fn resolve_factor(
    conversions: &[UnitConversionDefinition],
    from_unit: &str,
    to_unit: &str,
) -> Option<Decimal> {
    resolve_conversion(conversions, from_unit, to_unit).map(|resolved| resolved.factor)
}

/// Tare recorded for the canonical `from_unit` -> `to_unit` direction
pub fn resolve_tare(
    conversions: &[UnitConversionDefinition],
    from_unit: &str,
    to_unit: &str,
) -> Option<Decimal> {
    let from = normalize_unit(from_unit);
    let to = normalize_unit(to_unit);
    find_direct(conversions, &from, &to).and_then(|c| c.tare)
}

/// Units that can be staged for a product whose stock is kept in `base_unit`.
///
/// The base unit comes first, followed by every unit with a direct path to it
/// in table order, without duplicates.
pub fn convertible_units(conversions: &[UnitConversionDefinition], base_unit: &str) -> Vec<String> {
    let base = normalize_unit(base_unit);
    let mut units = vec![base.clone()];

    for conversion in conversions.iter().filter(|c| c.factor > Decimal::ZERO) {
        let from = normalize_unit(&conversion.from_unit);
        let to = normalize_unit(&conversion.to_unit);
        let candidate = if to == base {
            from
        } else if from == base {
            to
        } else {
            continue;
        };
        if !candidate.is_empty() && !units.contains(&candidate) {
            units.push(candidate);
        }
    }

    units
}
