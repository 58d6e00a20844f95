//! # `gcloud compute`
//!
//! Instance lifecycle commands and the operations group. Mutating verbs
//! return a long-running operation; without `--async` the command waits
//! for it and reports the final result.

use std::collections::HashMap;

use anyhow::{Result, bail};
use clap::{Args, Subcommand};
use itertools::Itertools;

use gcloud::api::compute;
use gcloud::api::compute::{Instance, InstanceSpec, build_instance_request};
use gcloud::config::Property;
use gcloud::operations::{self, Operation, OperationScope, last_segment};
use gcloud::resource::{
    COMPUTE_GLOBAL_OPERATIONS, COMPUTE_INSTANCES, COMPUTE_REGION_OPERATIONS,
    COMPUTE_ZONE_OPERATIONS, Fallthrough, RefResolver, ResourceRef, resolve_attribute,
};

use crate::common::{Ctx, enrich_datetime, parse_kv_map, print_json, print_table};

#[derive(Subcommand, Debug)]
pub enum ComputeCmd {
    /// Create, list, and manage VM instances
    #[command(subcommand)]
    Instances(InstancesCmd),
    /// Inspect long-running operations
    #[command(subcommand)]
    Operations(OperationsCmd),
}

#[derive(Subcommand, Debug)]
pub enum InstancesCmd {
    /// List instances; all zones unless --zone narrows it
    List {
        #[arg(long)]
        zone: Option<String>,
        /// Server-side filter expression, e.g. `status=RUNNING`
        #[arg(long)]
        filter: Option<String>,
    },
    /// Show one instance exactly as the API returns it
    Describe {
        instance: String,
        #[arg(long)]
        zone: Option<String>,
    },
    /// Create an instance
    Create(CreateArgs),
    /// Delete instances
    Delete {
        #[arg(required = true)]
        instances: Vec<String>,
        #[arg(long)]
        zone: Option<String>,
        /// Return as soon as the operations start
        #[arg(long = "async")]
        async_: bool,
    },
    /// Start a stopped instance
    Start {
        instance: String,
        #[arg(long)]
        zone: Option<String>,
        #[arg(long = "async")]
        async_: bool,
    },
    /// Stop a running instance
    Stop {
        instance: String,
        #[arg(long)]
        zone: Option<String>,
        #[arg(long = "async")]
        async_: bool,
    },
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Name of the instance to create
    pub name: String,
    #[arg(long)]
    pub zone: Option<String>,
    #[arg(long, default_value = "e2-medium")]
    pub machine_type: String,
    /// Image family, or a full image path
    #[arg(long, default_value = "debian-12")]
    pub image_family: String,
    #[arg(long, default_value = "debian-cloud")]
    pub image_project: String,
    /// Boot disk size in GiB
    #[arg(long, default_value_t = 10)]
    pub boot_disk_size: u32,
    #[arg(long)]
    pub network: Option<String>,
    #[arg(long)]
    pub subnet: Option<String>,
    /// Do not assign an external IP
    #[arg(long)]
    pub no_address: bool,
    /// Provision as a spot instance
    #[arg(long)]
    pub spot: bool,
    /// Labels as `k1=v1,k2=v2`
    #[arg(long)]
    pub labels: Option<String>,
    /// Network tags as a comma-separated list
    #[arg(long)]
    pub tags: Option<String>,
    /// Startup script to run on first boot
    #[arg(long)]
    pub startup_script: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long = "async")]
    pub async_: bool,
}

#[derive(Subcommand, Debug)]
pub enum OperationsCmd {
    /// List operations in one scope (default: the configured zone)
    List {
        #[arg(long)]
        zone: Option<String>,
        #[arg(long, conflicts_with = "zone")]
        region: Option<String>,
        #[arg(long, conflicts_with_all = ["zone", "region"])]
        global: bool,
    },
    /// Show one operation
    Describe {
        operation: String,
        #[arg(long)]
        zone: Option<String>,
        #[arg(long, conflicts_with = "zone")]
        region: Option<String>,
        #[arg(long, conflicts_with_all = ["zone", "region"])]
        global: bool,
    },
    /// Block until an operation completes
    Wait {
        operation: String,
        #[arg(long)]
        zone: Option<String>,
        #[arg(long, conflicts_with = "zone")]
        region: Option<String>,
        #[arg(long, conflicts_with_all = ["zone", "region"])]
        global: bool,
    },
}

pub async fn run(ctx: &Ctx, cmd: ComputeCmd) -> Result<()> {
    match cmd {
        ComputeCmd::Instances(cmd) => instances(ctx, cmd).await,
        ComputeCmd::Operations(cmd) => operations_group(ctx, cmd).await,
    }
}

async fn instances(ctx: &Ctx, cmd: InstancesCmd) -> Result<()> {
    match cmd {
        InstancesCmd::List { zone, filter } => list_instances(ctx, zone, filter).await,
        InstancesCmd::Describe { instance, zone } => {
            let instance = instance_ref(ctx, &instance, zone.as_deref())?;
            let raw = compute::get_instance(ctx.track, &instance).await?;
            print_json(&raw)
        }
        InstancesCmd::Create(args) => create_instance(ctx, args).await,
        InstancesCmd::Delete {
            instances,
            zone,
            async_,
        } => delete_instances(ctx, &instances, zone.as_deref(), async_).await,
        InstancesCmd::Start {
            instance,
            zone,
            async_,
        } => {
            let instance = instance_ref(ctx, &instance, zone.as_deref())?;
            let operation = compute::start_instance(ctx.track, &instance).await?;
            finish(ctx, operation, &instance, "Start", "Started", async_).await
        }
        InstancesCmd::Stop {
            instance,
            zone,
            async_,
        } => {
            let instance = instance_ref(ctx, &instance, zone.as_deref())?;
            let operation = compute::stop_instance(ctx.track, &instance).await?;
            finish(ctx, operation, &instance, "Stop", "Stopped", async_).await
        }
    }
}

async fn list_instances(ctx: &Ctx, zone: Option<String>, filter: Option<String>) -> Result<()> {
    let project = ctx.project()?;
    let instances = match &zone {
        Some(zone) => compute::list_instances(ctx.track, &project, zone, filter.as_deref()).await?,
        None => compute::aggregated_list_instances(ctx.track, &project, filter.as_deref()).await?,
    };
    let instances: Vec<Instance> = instances
        .into_iter()
        .sorted_by_key(|i| {
            let zone = i.zone.as_deref().map(last_segment).unwrap_or("").to_string();
            (zone, i.name.clone())
        })
        .collect();
    if ctx.json_output() {
        return print_json(&instances);
    }
    if instances.is_empty() {
        eprintln!("Listed 0 items.");
        return Ok(());
    }
    let rows: Vec<Vec<String>> = instances
        .iter()
        .map(|i| {
            vec![
                i.name.clone(),
                i.zone.as_deref().map(last_segment).unwrap_or("-").to_string(),
                i.machine_type
                    .as_deref()
                    .map(last_segment)
                    .unwrap_or("-")
                    .to_string(),
                i.internal_ip().unwrap_or("-").to_string(),
                i.external_ip().unwrap_or("-").to_string(),
                i.status.clone().unwrap_or_else(|| "-".to_string()),
            ]
        })
        .collect();
    print_table(
        &["NAME", "ZONE", "MACHINE_TYPE", "INTERNAL_IP", "EXTERNAL_IP", "STATUS"],
        &rows,
    );
    Ok(())
}

async fn create_instance(ctx: &Ctx, args: CreateArgs) -> Result<()> {
    let project = ctx.project()?;
    let zone = resolve_attribute(
        "zone",
        &[
            Fallthrough::Flag(args.zone.as_deref(), "--zone"),
            Fallthrough::Property(&ctx.store, "compute/zone"),
        ],
    )?;
    let labels = match &args.labels {
        Some(spec) => parse_kv_map(spec)?,
        None => HashMap::new(),
    };
    let tags: Vec<String> = args
        .tags
        .as_deref()
        .map(|spec| {
            spec.split(',')
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    let spec = InstanceSpec {
        name: args.name.clone(),
        machine_type: args.machine_type,
        image_family: args.image_family,
        image_project: args.image_project,
        boot_disk_size_gb: args.boot_disk_size,
        network: args.network,
        subnet: args.subnet,
        external_ip: !args.no_address,
        spot: args.spot,
        labels,
        tags,
        startup_script: args.startup_script,
        description: args.description,
    };
    let request = build_instance_request(&spec, &project, &zone);
    let operation = compute::insert_instance(ctx.track, &project, &zone, &request).await?;

    if args.async_ {
        eprintln!(
            "Instance creation in progress for [{}]: {}",
            args.name,
            operation.self_link.as_deref().unwrap_or(&operation.name)
        );
        return Ok(());
    }
    let done = operations::wait(operation, ctx.timeout, ctx.quiet).await?;
    let instance = instance_ref(ctx, &args.name, Some(&zone))?;
    let target = done
        .target_link
        .clone()
        .unwrap_or_else(|| instance.self_link(ctx.track));
    eprintln!("Created [{target}].");

    let raw = compute::get_instance(ctx.track, &instance).await?;
    if ctx.json_output() {
        return print_json(&raw);
    }
    let created: Instance = serde_json::from_value(raw)?;
    print_table(
        &["NAME", "ZONE", "MACHINE_TYPE", "INTERNAL_IP", "EXTERNAL_IP", "STATUS"],
        &[vec![
            created.name.clone(),
            zone,
            created
                .machine_type
                .as_deref()
                .map(last_segment)
                .unwrap_or("-")
                .to_string(),
            created.internal_ip().unwrap_or("-").to_string(),
            created.external_ip().unwrap_or("-").to_string(),
            created.status.clone().unwrap_or_else(|| "-".to_string()),
        ]],
    );
    Ok(())
}

async fn delete_instances(
    ctx: &Ctx,
    instances: &[String],
    zone: Option<&str>,
    async_: bool,
) -> Result<()> {
    let refs: Vec<ResourceRef> = instances
        .iter()
        .map(|name| instance_ref(ctx, name, zone))
        .collect::<Result<_>>()?;
    let listing = refs
        .iter()
        .map(|r| format!(" - [{}] in [{}]", r.name(), r.get("zone").unwrap_or("-")))
        .join("\n");
    ctx.confirm(&format!(
        "The following instances will be deleted:\n{listing}"
    ))?;

    for instance in &refs {
        let operation = compute::delete_instance(ctx.track, instance).await?;
        finish(ctx, operation, instance, "Delete", "Deleted", async_).await?;
    }
    Ok(())
}

/// Reports a mutating operation: either the in-progress link (`--async`)
/// or the final target after waiting.
async fn finish(
    ctx: &Ctx,
    operation: Operation,
    target: &ResourceRef,
    in_progress: &str,
    done_verb: &str,
    async_: bool,
) -> Result<()> {
    if async_ {
        eprintln!(
            "{in_progress} in progress for [{}].",
            operation.self_link.as_deref().unwrap_or(&operation.name)
        );
        return Ok(());
    }
    let done = operations::wait(operation, ctx.timeout, ctx.quiet).await?;
    let link = done
        .target_link
        .clone()
        .unwrap_or_else(|| target.self_link(ctx.track));
    eprintln!("{done_verb} [{link}].");
    Ok(())
}

fn instance_ref(ctx: &Ctx, input: &str, zone: Option<&str>) -> Result<ResourceRef> {
    Ok(RefResolver::new(&COMPUTE_INSTANCES)
        .attribute("project", ctx.project_sources())
        .attribute(
            "zone",
            vec![
                Fallthrough::Flag(zone, "--zone"),
                Fallthrough::Property(&ctx.store, "compute/zone"),
            ],
        )
        .parse(input)?)
}

async fn operations_group(ctx: &Ctx, cmd: OperationsCmd) -> Result<()> {
    match cmd {
        OperationsCmd::List { zone, region, global } => {
            let project = ctx.project()?;
            let scope = list_scope(ctx, zone, region, global)?;
            let operations = compute::list_operations(ctx.track, &project, &scope).await?;
            if ctx.json_output() {
                return print_json(&operations);
            }
            if operations.is_empty() {
                eprintln!("Listed 0 items.");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = operations
                .iter()
                .map(|op| {
                    vec![
                        op.name.clone(),
                        op.operation_type.clone().unwrap_or_else(|| "-".to_string()),
                        op.target_link
                            .as_deref()
                            .map(last_segment)
                            .unwrap_or("-")
                            .to_string(),
                        op.status.to_string(),
                        op.insert_time
                            .as_deref()
                            .map(enrich_datetime)
                            .unwrap_or_else(|| "-".to_string()),
                    ]
                })
                .collect();
            print_table(&["NAME", "TYPE", "TARGET", "STATUS", "TIMESTAMP"], &rows);
            Ok(())
        }
        OperationsCmd::Describe {
            operation,
            zone,
            region,
            global,
        } => {
            let operation = operation_ref(ctx, &operation, zone.as_deref(), region.as_deref(), global)?;
            let operation = compute::get_operation(ctx.track, &operation).await?;
            print_json(&operation)
        }
        OperationsCmd::Wait {
            operation,
            zone,
            region,
            global,
        } => {
            let operation = operation_ref(ctx, &operation, zone.as_deref(), region.as_deref(), global)?;
            let current = compute::get_operation(ctx.track, &operation).await?;
            let done = operations::wait(current, ctx.timeout, ctx.quiet).await?;
            if ctx.json_output() {
                return print_json(&done);
            }
            eprintln!("Operation [{}] completed.", done.name);
            Ok(())
        }
    }
}

/// Scope for `operations list`: an explicit flag wins; otherwise the
/// configured zone, and failing that the global scope.
fn list_scope(
    ctx: &Ctx,
    zone: Option<String>,
    region: Option<String>,
    global: bool,
) -> Result<OperationScope> {
    if let Some(zone) = zone {
        return Ok(OperationScope::Zone(zone));
    }
    if let Some(region) = region {
        return Ok(OperationScope::Region(region));
    }
    if global {
        return Ok(OperationScope::Global);
    }
    match ctx.store.get(&Property::parse("compute/zone")?)? {
        Some(zone) => Ok(OperationScope::Zone(zone)),
        None => Ok(OperationScope::Global),
    }
}

/// Resolves an operation argument. Qualified names carry their own scope;
/// bare names are placed by `--zone`/`--region`/`--global`, defaulting to
/// the configured zone.
fn operation_ref(
    ctx: &Ctx,
    input: &str,
    zone: Option<&str>,
    region: Option<&str>,
    global: bool,
) -> Result<ResourceRef> {
    if input.contains('/') {
        for collection in [
            &COMPUTE_ZONE_OPERATIONS,
            &COMPUTE_REGION_OPERATIONS,
            &COMPUTE_GLOBAL_OPERATIONS,
        ] {
            if let Ok(parsed) = RefResolver::new(collection).parse(input) {
                return Ok(parsed);
            }
        }
        bail!("[{input}] is not a compute operation name");
    }
    if global {
        return Ok(RefResolver::new(&COMPUTE_GLOBAL_OPERATIONS)
            .attribute("project", ctx.project_sources())
            .parse(input)?);
    }
    if region.is_some() {
        return Ok(RefResolver::new(&COMPUTE_REGION_OPERATIONS)
            .attribute("project", ctx.project_sources())
            .attribute("region", vec![Fallthrough::Flag(region, "--region")])
            .parse(input)?);
    }
    Ok(RefResolver::new(&COMPUTE_ZONE_OPERATIONS)
        .attribute("project", ctx.project_sources())
        .attribute(
            "zone",
            vec![
                Fallthrough::Flag(zone, "--zone"),
                Fallthrough::Property(&ctx.store, "compute/zone"),
            ],
        )
        .parse(input)?)
}
