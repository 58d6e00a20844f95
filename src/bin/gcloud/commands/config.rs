//! # `gcloud config`
//!
//! Properties of the active configuration, plus the `configurations`
//! group for switching between named configurations.

use anyhow::Result;
use clap::Subcommand;
use serde_json::json;

use gcloud::config::{ConfigError, Property};

use crate::common::{Ctx, print_json, print_table};

#[derive(Subcommand, Debug)]
pub enum ConfigCmd {
    /// Set a property in the active configuration
    Set {
        /// Property name, `SECTION/NAME` or a core name like `project`
        property: String,
        value: String,
    },
    /// Print the value of a property
    Get { property: String },
    /// Remove a property from the active configuration
    Unset { property: String },
    /// List the properties of the active configuration
    List,
    /// Manage named configurations
    #[command(subcommand)]
    Configurations(ConfigurationsCmd),
}

#[derive(Subcommand, Debug)]
pub enum ConfigurationsCmd {
    /// Create a new, empty named configuration
    Create { name: String },
    /// Make a named configuration the active one
    Activate { name: String },
    /// Delete a named configuration
    Delete { name: String },
    /// List all named configurations
    List,
    /// Show the properties of one named configuration
    Describe { name: String },
}

pub async fn run(ctx: &Ctx, cmd: ConfigCmd) -> Result<()> {
    match cmd {
        ConfigCmd::Set { property, value } => {
            let property = Property::parse(&property)?;
            ctx.store.set(&property, &value)?;
            eprintln!("Updated property [{property}].");
            Ok(())
        }
        ConfigCmd::Get { property } => {
            let value = ctx.store.require(&Property::parse(&property)?)?;
            println!("{value}");
            Ok(())
        }
        ConfigCmd::Unset { property } => {
            let property = Property::parse(&property)?;
            ctx.store.unset(&property)?;
            eprintln!("Unset property [{property}].");
            Ok(())
        }
        ConfigCmd::List => list(ctx),
        ConfigCmd::Configurations(cmd) => configurations(ctx, cmd),
    }
}

/// Prints effective properties grouped into `[section]` blocks, the way
/// the configuration file itself reads.
fn list(ctx: &Ctx) -> Result<()> {
    let properties = ctx.store.effective_properties()?;
    if ctx.json_output() {
        let mut sections = serde_json::Map::new();
        for (property, value) in &properties {
            if let Some(section) = sections
                .entry(property.section.clone())
                .or_insert_with(|| json!({}))
                .as_object_mut()
            {
                section.insert(property.name.clone(), json!(value));
            }
        }
        return print_json(&sections);
    }
    let mut current_section = "";
    for (property, value) in &properties {
        if property.section != current_section {
            println!("[{}]", property.section);
            current_section = &property.section;
        }
        println!("{} = {}", property.name, value);
    }
    if properties.is_empty() {
        eprintln!("(unset)");
    }
    Ok(())
}

fn configurations(ctx: &Ctx, cmd: ConfigurationsCmd) -> Result<()> {
    match cmd {
        ConfigurationsCmd::Create { name } => {
            ctx.store.create_configuration(&name)?;
            eprintln!("Created [{name}].");
            Ok(())
        }
        ConfigurationsCmd::Activate { name } => {
            ctx.store.activate_configuration(&name)?;
            eprintln!("Activated [{name}].");
            Ok(())
        }
        ConfigurationsCmd::Delete { name } => {
            ctx.confirm(&format!(
                "The configuration [{name}] and its properties will be deleted."
            ))?;
            ctx.store.delete_configuration(&name)?;
            eprintln!("Deleted [{name}].");
            Ok(())
        }
        ConfigurationsCmd::List => {
            let active = ctx.store.active_configuration();
            let names = ctx.store.list_configurations()?;
            if ctx.json_output() {
                let items: Vec<_> = names
                    .iter()
                    .map(|name| json!({"name": name, "is_active": *name == active}))
                    .collect();
                return print_json(&items);
            }
            let rows: Vec<Vec<String>> = names
                .iter()
                .map(|name| {
                    vec![
                        name.clone(),
                        if *name == active { "true" } else { "false" }.to_string(),
                    ]
                })
                .collect();
            print_table(&["NAME", "IS_ACTIVE"], &rows);
            Ok(())
        }
        ConfigurationsCmd::Describe { name } => {
            let active = ctx.store.active_configuration();
            if !ctx.store.list_configurations()?.contains(&name) {
                return Err(ConfigError::NoSuchConfiguration(name).into());
            }
            let properties = ctx.store.load_configuration(&name)?;
            if ctx.json_output() {
                return print_json(&json!({
                    "is_active": name == active,
                    "name": name,
                    "properties": properties,
                }));
            }
            println!("is_active: {}", name == active);
            println!("name: {name}");
            println!("properties:");
            for (section, values) in &properties {
                println!("  [{section}]");
                if let Some(values) = values.as_table() {
                    for (key, value) in values {
                        println!("    {} = {}", key, value.as_str().unwrap_or(""));
                    }
                }
            }
            Ok(())
        }
    }
}
