use std::sync::Arc;

use anyhow::{bail, Context};
use colored::Colorize;
use geostore::{Cell, Store, StoreConfig};
use geostore_kv::LogKv;
use geostore_types::{CellId, Feature, ItemId, ItemRef};
use serde_json::{json, Value};
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    debug!(db = %cli.db.display(), level = config.level, "configuration resolved");
    if let Command::Config = cli.command {
        print!("{}", config.to_toml_string()?);
        return Ok(());
    }
    let kv = Arc::new(
        LogKv::open(&cli.db, config.kv.clone())
            .with_context(|| format!("opening {}", cli.db.display()))?,
    );
    let mut store = Store::new(kv.clone(), config)?;
    store.open(Arc::new(Feature::decode))?;
    let format = cli.format;

    let result = match cli.command {
        Command::Insert(args) => cmd_insert(&store, args, format),
        Command::Get(args) => cmd_get(&store, args, format),
        Command::Cell(args) => cmd_cell(&store, args, format),
        Command::Radius(args) => cmd_radius(&store, args, format),
        Command::Delete(args) => cmd_delete(&store, args, format),
        Command::Prefix(args) => cmd_prefix(&store, args, format),
        Command::Covering(args) => cmd_covering(&store, args, format),
        Command::Verify(args) => cmd_verify(&store, args, format),
        Command::Compact => {
            kv.compact()?;
            println!("{} Compacted {} ({} keys)", "✓".green(), cli.db.display(), kv.len());
            Ok(())
        }
        Command::Config => Ok(()),
    };
    store.close()?;
    result
}

fn load_config(cli: &Cli) -> anyhow::Result<StoreConfig> {
    let mut config = match &cli.config {
        Some(path) => StoreConfig::load(path)?,
        None => StoreConfig::default(),
    };
    if let Some(level) = cli.level {
        config.level = level;
    }
    config.validate()?;
    Ok(config)
}

fn cmd_insert(store: &Store, args: InsertArgs, format: OutputFormat) -> anyhow::Result<()> {
    let mut feature = Feature::new(args.key, args.coords);
    if let Some(props) = &args.props {
        for (name, value) in parse_props(props)? {
            feature = feature.with_property(name, value);
        }
    }
    let id = store.insert(Arc::new(feature))?;
    match format {
        OutputFormat::Json => print_json(&json!({ "id": id.to_string() })),
        OutputFormat::Text => println!("{} Inserted {}", "✓".green().bold(), id.to_string().yellow()),
    }
    Ok(())
}

fn cmd_get(store: &Store, args: IdArgs, format: OutputFormat) -> anyhow::Result<()> {
    let item = store.get_str(&args.id)?;
    match format {
        OutputFormat::Json => print_json(&item_json(&item)?),
        OutputFormat::Text => print_item(&item)?,
    }
    Ok(())
}

fn cmd_cell(store: &Store, args: CellArgs, format: OutputFormat) -> anyhow::Result<()> {
    let cell = store.get_cell_by_lat_lng(args.lat, args.lng)?;
    match format {
        OutputFormat::Json => print_json(&cell_json(&cell)?),
        OutputFormat::Text => print_cell(&cell)?,
    }
    Ok(())
}

fn cmd_radius(store: &Store, args: RadiusArgs, format: OutputFormat) -> anyhow::Result<()> {
    let cells = store.within_radius(args.lat, args.lng, args.meters)?;
    match format {
        OutputFormat::Json => {
            let cells = cells.iter().map(cell_json).collect::<anyhow::Result<Vec<_>>>()?;
            print_json(&Value::Array(cells));
        }
        OutputFormat::Text => {
            if cells.is_empty() {
                println!("No cells within {} m.", args.meters);
            }
            for cell in &cells {
                print_cell(cell)?;
            }
        }
    }
    Ok(())
}

fn cmd_delete(store: &Store, args: IdArgs, format: OutputFormat) -> anyhow::Result<()> {
    let id = ItemId::parse(&args.id)?;
    store.delete(&id)?;
    match format {
        OutputFormat::Json => print_json(&json!({ "deleted": id.to_string() })),
        OutputFormat::Text => println!("{} Deleted {}", "✓".green().bold(), id.to_string().yellow()),
    }
    Ok(())
}

fn cmd_prefix(store: &Store, args: PrefixArgs, format: OutputFormat) -> anyhow::Result<()> {
    let entries = store.entries_by_prefix(&args.prefix)?;
    match format {
        OutputFormat::Json => {
            let entries = entries
                .iter()
                .map(|(id, item)| -> anyhow::Result<Value> {
                    Ok(json!({ "id": id.to_string(), "item": item_json(item)? }))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            print_json(&Value::Array(entries));
        }
        OutputFormat::Text => {
            if entries.is_empty() {
                println!("No items.");
            }
            for (id, item) in &entries {
                print!("{}  ", id.to_string().yellow());
                print_item(item)?;
            }
        }
    }
    Ok(())
}

fn cmd_covering(store: &Store, args: IdArgs, format: OutputFormat) -> anyhow::Result<()> {
    let id = ItemId::parse(&args.id)?;
    let cells = store.covering_cells(&id)?;
    match format {
        OutputFormat::Json => print_json(&json!({
            "id": id.to_string(),
            "cells": cells.iter().map(|c| c.raw()).collect::<Vec<_>>(),
        })),
        OutputFormat::Text => {
            println!("{} covers {} cell(s):", id.to_string().yellow(), cells.len());
            for cell in &cells {
                println!("  {}", cell.to_string().cyan());
            }
        }
    }
    Ok(())
}

fn cmd_verify(store: &Store, args: VerifyArgs, format: OutputFormat) -> anyhow::Result<()> {
    let cell = CellId::new(args.cell);
    let ok = store.verify_cell(cell)?;
    match format {
        OutputFormat::Json => print_json(&json!({ "cell": args.cell, "hash_ok": ok })),
        OutputFormat::Text if ok => {
            println!("{} Cell {} hash verified", "✓".green().bold(), cell.to_string().cyan())
        }
        OutputFormat::Text => println!(
            "{} Cell {} hash mismatch",
            "✗".red().bold(),
            cell.to_string().cyan()
        ),
    }
    Ok(())
}

/// Parse `--props` into name/value pairs.
fn parse_props(raw: &str) -> anyhow::Result<Vec<(String, Value)>> {
    match serde_json::from_str::<Value>(raw).context("parsing --props")? {
        Value::Object(map) => Ok(map.into_iter().collect()),
        other => bail!("--props must be a JSON object, got {other}"),
    }
}

fn item_json(item: &ItemRef) -> anyhow::Result<Value> {
    let bytes = item.encode()?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn cell_json(cell: &Cell) -> anyhow::Result<Value> {
    let items = cell.items().iter().map(item_json).collect::<anyhow::Result<Vec<_>>>()?;
    Ok(json!({
        "id": cell.id().raw(),
        "hash": hex_digest(cell),
        "items": items,
    }))
}

fn hex_digest(cell: &Cell) -> String {
    hex::encode(cell.hash())
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("failed to render JSON: {e}"),
    }
}

fn print_item(item: &ItemRef) -> anyhow::Result<()> {
    let position = item.position();
    let pairs: Vec<String> = position
        .chunks_exact(2)
        .map(|p| format!("({}, {})", p[0], p[1]))
        .collect();
    println!("{}  {}", item.key().bold(), pairs.join(" ").dimmed());
    let value = item_json(item)?;
    if let Some(props) = value.get("properties").and_then(Value::as_object) {
        for (name, v) in props {
            println!("  {name}: {v}");
        }
    }
    Ok(())
}

fn print_cell(cell: &Cell) -> anyhow::Result<()> {
    let hash = hex_digest(cell);
    println!(
        "Cell {}  hash {}  ({} item(s))",
        cell.id().to_string().cyan().bold(),
        hash[..12].dimmed(),
        cell.len()
    );
    for item in cell.items() {
        print!("  ");
        print_item(item)?;
    }
    Ok(())
}
