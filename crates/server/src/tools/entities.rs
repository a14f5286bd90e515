//! Code-entity tools: index a source tree, search the index.

use entity::EntityIndex;
use serde_json::{json, Value};

use crate::error::{ErrorReason, ToolError, ToolResponse, ToolResult};
use crate::state::CoreContext;
use crate::tools::{optional_bool, optional_str, required_str};

pub fn index_code(ctx: &CoreContext, args: &Value) -> ToolResult {
    if !ctx.config.indexing.enabled {
        return Err(ToolError::new(
            ErrorReason::IndexingDisabled,
            "Code indexing is disabled in configuration.",
        ));
    }
    let directory = required_str(args, "directory")?;
    let recursive = optional_bool(args, "recursive").unwrap_or(true);

    // Build fully, persist, then swap; readers keep the old revision until
    // the swap.
    let mut fresh = EntityIndex::with_default_scanners();
    let files_indexed = fresh.index_directory(directory, recursive)?;
    fresh.save(ctx.config.entities_path())?;
    let stats = fresh.stats();
    ctx.swap_entity_index(fresh);

    Ok(ToolResponse::new(
        format!(
            "Code Indexing Complete\n\n\
             Directory: {directory}\n\
             Files Indexed: {files_indexed}\n\
             Total Entities: {}\n\
             Functions: {}\n\
             Classes: {}\n\
             Endpoints: {}\n",
            stats.total_entities, stats.functions, stats.classes, stats.endpoints,
        ),
        serde_json::to_value(stats).unwrap_or_else(|_| json!({})),
    ))
}

pub fn search_entity(ctx: &CoreContext, args: &Value) -> ToolResult {
    if !ctx.config.indexing.enabled {
        return Err(ToolError::new(
            ErrorReason::IndexingDisabled,
            "Code indexing is disabled in configuration.",
        ));
    }
    let name = required_str(args, "name")?;
    let entity_type = optional_str(args, "entity_type").unwrap_or("any");

    let index = ctx.entity_index();
    let records: Vec<&entity::EntityRecord> = match entity_type {
        "function" => index.search_function(name),
        "class" => index.search_class(name),
        "any" => index.search_any(name),
        other => {
            return Err(ToolError::invalid(format!(
                "Unknown entity_type '{other}' (expected function, class, or any)"
            )))
        }
    };

    if records.is_empty() {
        return Ok(ToolResponse::new(
            format!(
                "No entities found matching: {name}\n\nTry indexing the codebase first using the 'index_code' tool."
            ),
            json!({"results_count": 0, "query": name}),
        ));
    }

    let mut text = format!("Search Results for '{name}' ({} found):\n\n", records.len());
    for record in &records {
        text.push_str(&format!(
            "{}: {}\n  Module: {}\n  Location: {}:{}-{}\n",
            capitalize(record.kind.as_str()),
            record.name,
            record.module,
            record.file_path,
            record.line_start,
            record.line_end,
        ));
        if let Some(signature) = &record.signature {
            text.push_str(&format!("  Signature: {signature}\n"));
        }
        text.push('\n');
    }

    let results: Vec<Value> = records
        .iter()
        .map(|r| serde_json::to_value(r).unwrap_or_else(|_| json!({})))
        .collect();
    Ok(ToolResponse::new(
        text,
        json!({"results_count": records.len(), "query": name, "results": results}),
    ))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
