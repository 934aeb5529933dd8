//! Command execution
//!
//! Every invocation opens the staging area for one product, hydrates it from
//! disk, applies a single command and prints the result as JSON.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use serde_json::{json, Value};
use shared::{
    convertible_units, encode_entry, resolve_conversion, LoadOutcome, MeasurementRequest, ProductContext,
    ProductMetadata, StagingError, StagingKey, StagingPersistence, StagingSession,
};

use crate::cli::{Cli, Commands, ProductArgs};
use crate::config::Config;
use crate::error::{CliError, CliResult};
use crate::store::FileStore;

type Session = StagingSession<FileStore>;

/// Run one command and return what should be printed
pub fn run(config: &Config, cli: Cli, now: DateTime<Utc>) -> CliResult<String> {
    let mut session = open_session(config, &cli.product, now)?;

    let output = match cli.command {
        Commands::Tare { gross } => {
            let id = session.add_tare_entry(gross, now)?;
            added(&session, &id)
        }
        Commands::Package { quantity, size } => {
            let id = session.add_package_entry(quantity, size, now)?;
            added(&session, &id)
        }
        Commands::Manual { amount } => {
            let id = session.add_manual_entry(amount, now)?;
            added(&session, &id)
        }
        Commands::Convert {
            gross,
            unit,
            tare,
            tare_amount,
        } => {
            let request = MeasurementRequest {
                gross_amount: gross,
                unit,
                tare_applied: tare,
                tare_amount,
            };
            let id = session.add_conversion_entry(request, now)?;
            added(&session, &id)
        }
        Commands::Remove { id } => {
            if session.state().entry(&id).is_none() {
                return Err(CliError::UnknownEntry(id));
            }
            session.remove_entry(&id, now);
            view(&session)
        }
        Commands::Clear => {
            session.clear(now);
            view(&session)
        }
        Commands::Mode { interpretation } => {
            session.set_interpretation(interpretation.into(), now)?;
            view(&session)
        }
        Commands::Direction { direction } => {
            session.set_direction(direction.into(), now);
            view(&session)
        }
        Commands::Show => view(&session),
        Commands::Submit { note } => serde_json::to_value(session.submission(note)?)?,
        Commands::Commit => {
            let submission = serde_json::to_value(session.submission(None)?)?;
            session.complete_submission(Ok::<(), CliError>(()), now);
            tracing::info!(product = %session.key().product_id, "submission recorded, staging cleared");
            json!({ "committed": submission })
        }
        Commands::Units => {
            let base_unit = base_unit(&session)?;
            json!(convertible_units(session.conversions(), &base_unit))
        }
        Commands::Factor { from, to } => {
            let resolved = resolve_conversion(session.conversions(), &from, &to)
                .ok_or(StagingError::NoConversionPath { from: from.clone(), to: to.clone() })?;
            json!({
                "from": from,
                "to": to,
                "factor": resolved.factor.to_f64(),
                "reversed": resolved.reversed,
            })
        }
    };

    Ok(serde_json::to_string_pretty(&output)?)
}

/// Build the session for the selected product and load its snapshot
pub fn open_session(config: &Config, args: &ProductArgs, now: DateTime<Utc>) -> CliResult<Session> {
    let metadata = read_metadata(args.metadata.as_deref())?;
    let context = ProductContext {
        base_unit: args.base_unit.clone().or(metadata.base_unit),
        tare_weight: args.tare_weight.or(metadata.tare_weight),
        current_stock: args.current_stock.or(metadata.current_stock),
    };

    let persistence = StagingPersistence::new(
        FileStore::new(&config.storage.directory),
        config.staging.namespace.clone(),
        config.max_age(),
    );
    let key = StagingKey::new(args.instance.clone(), args.product.clone());
    let mut session = StagingSession::new(persistence, key, context).with_conversions(metadata.conversions);

    match session.hydrate(now) {
        LoadOutcome::Hydrated { dropped, .. } if dropped > 0 => {
            tracing::info!(dropped, "dropped staged entries that no longer fit the product")
        }
        LoadOutcome::Expired => tracing::info!("previous staging expired and was discarded"),
        LoadOutcome::Corrupt => tracing::warn!("previous staging was unreadable and was discarded"),
        _ => {}
    }

    Ok(session)
}

fn read_metadata(path: Option<&str>) -> CliResult<ProductMetadata> {
    let Some(path) = path else {
        return Ok(ProductMetadata::default());
    };
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::ReadFile {
        path: path.to_string(),
        source,
    })?;
    Ok(serde_json::from_str(&raw)?)
}

fn base_unit(session: &Session) -> CliResult<String> {
    session
        .context()
        .base_unit
        .clone()
        .filter(|unit| !unit.trim().is_empty())
        .ok_or(CliError::Staging(StagingError::MissingUnit))
}

fn added(session: &Session, id: &str) -> Value {
    let mut output = view(session);
    output["added"] = json!(id);
    output
}

fn view(session: &Session) -> Value {
    let state = session.state();
    json!({
        "product": session.key().product_id,
        "interpretation": state.interpretation.as_str(),
        "direction": state.direction.as_str(),
        "entries": state.entries.iter().map(encode_entry).collect::<Vec<_>>(),
        "summary": session.summary(),
        "persisted": session.is_persistence_enabled(),
    })
}
