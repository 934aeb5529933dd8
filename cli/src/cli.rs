use clap::{Args, Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use shared::{DeltaDirection, Interpretation};

#[derive(Parser, Debug)]
#[command(name = "stockstage")]
#[command(about = "Stage stock measurements before submitting them to inventory", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub product: ProductArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which staging area to work on and what is known about its product
#[derive(Args, Debug, Clone)]
pub struct ProductArgs {
    /// Backend instance the product belongs to
    #[arg(long, global = true, default_value = "default")]
    pub instance: String,

    /// Product identifier
    #[arg(long, global = true, default_value = "default")]
    pub product: String,

    /// JSON file with product metadata (base_unit, tare_weight, current_stock, conversions)
    #[arg(long, global = true)]
    pub metadata: Option<String>,

    /// Unit stock is kept in; overrides the metadata file
    #[arg(long, global = true)]
    pub base_unit: Option<String>,

    /// Container weight for tare entries; overrides the metadata file
    #[arg(long, global = true)]
    pub tare_weight: Option<Decimal>,

    /// Stock on hand, used for the projected stock figure
    #[arg(long, global = true)]
    pub current_stock: Option<Decimal>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stage a gross weighing; the product's tare weight is subtracted
    Tare {
        /// Gross reading including the container
        gross: Decimal,
    },

    /// Stage a number of packages of a fixed size
    Package {
        quantity: Decimal,

        /// Base units per package
        size: Decimal,
    },

    /// Stage an amount typed in directly
    Manual { amount: Decimal },

    /// Stage a reading taken in another unit
    Convert {
        gross: Decimal,

        /// Unit the reading was taken in
        unit: String,

        /// Subtract a container weight before converting
        #[arg(long)]
        tare: bool,

        /// Container weight in the reading's unit; defaults to the conversion's tare
        #[arg(long, requires = "tare")]
        tare_amount: Option<Decimal>,
    },

    /// Remove one staged entry
    Remove { id: String },

    /// Remove every staged entry
    Clear,

    /// Choose whether the staged total replaces stock or adjusts it
    Mode { interpretation: ModeArg },

    /// Choose whether an adjustment adds or subtracts
    Direction { direction: DirectionArg },

    /// Print staged entries and totals
    Show,

    /// Print the payload for the inventory API without clearing anything
    Submit {
        /// Note attached to the stock change
        #[arg(short, long)]
        note: Option<String>,
    },

    /// Record that the submission was accepted and clear the staging area
    Commit,

    /// List units that can be staged for the product
    Units,

    /// Print the multiplier between two units
    Factor { from: String, to: String },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Absolute,
    Delta,
}

impl From<ModeArg> for Interpretation {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Absolute => Interpretation::Absolute,
            ModeArg::Delta => Interpretation::Delta,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectionArg {
    Add,
    Subtract,
}

impl From<DirectionArg> for DeltaDirection {
    fn from(direction: DirectionArg) -> Self {
        match direction {
            DirectionArg::Add => DeltaDirection::Add,
            DirectionArg::Subtract => DeltaDirection::Subtract,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::str::FromStr;

    #[test]
    fn test_command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_convert_with_tare() {
        let cli = Cli::try_parse_from([
            "stockstage",
            "--product",
            "flour",
            "--base-unit",
            "g",
            "convert",
            "2",
            "lb",
            "--tare",
            "--tare-amount",
            "0.1",
        ])
        .unwrap();

        assert_eq!(cli.product.product, "flour");
        assert_eq!(cli.product.base_unit.as_deref(), Some("g"));
        match cli.command {
            Commands::Convert {
                gross,
                unit,
                tare,
                tare_amount,
            } => {
                assert_eq!(gross, Decimal::from(2));
                assert_eq!(unit, "lb");
                assert!(tare);
                assert_eq!(tare_amount, Some(Decimal::from_str("0.1").unwrap()));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_tare_amount_requires_tare_flag() {
        let result = Cli::try_parse_from(["stockstage", "convert", "2", "lb", "--tare-amount", "0.1"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_amount_is_rejected() {
        assert!(Cli::try_parse_from(["stockstage", "manual", "lots"]).is_err());
    }

    #[test]
    fn test_mode_values() {
        let cli = Cli::try_parse_from(["stockstage", "mode", "delta"]).unwrap();
        match cli.command {
            Commands::Mode { interpretation } => {
                assert_eq!(Interpretation::from(interpretation), Interpretation::Delta)
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
