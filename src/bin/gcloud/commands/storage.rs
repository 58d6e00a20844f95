//! # `gcloud storage`
//!
//! Object commands working on `gs://` URLs plus the `buckets` group.
//! Downloads are MD5-verified against the object metadata; `cp` moves data
//! between the local filesystem and a bucket, one object at a time.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use itertools::Itertools;
use serde_json::json;

use gcloud::api::storage::{self, BucketRequest, Object};
use gcloud::operations::last_segment;

use crate::common::{Ctx, enrich_datetime, print_json, print_table};

#[derive(Subcommand, Debug)]
pub enum StorageCmd {
    /// List buckets, or the contents of a storage URL
    Ls {
        /// `gs://bucket[/prefix]`; without it, lists the project's buckets
        url: Option<String>,
        /// Show size and modification time per object
        #[arg(short, long)]
        long: bool,
        /// List everything under the prefix, not just one level
        #[arg(short, long)]
        recursive: bool,
    },
    /// Write an object's content to stdout
    Cat { url: String },
    /// Copy between local files and storage (`gs://` on exactly one side)
    Cp { src: String, dest: String },
    /// Delete objects
    Rm {
        url: String,
        /// Delete every object under the prefix
        #[arg(short, long)]
        recursive: bool,
    },
    /// Manage buckets
    #[command(subcommand)]
    Buckets(BucketsCmd),
}

#[derive(Subcommand, Debug)]
pub enum BucketsCmd {
    /// Create a bucket
    Create {
        /// Bucket name, bare or as `gs://name`
        bucket: String,
        #[arg(long)]
        location: Option<String>,
        #[arg(long = "default-storage-class")]
        storage_class: Option<String>,
    },
    /// Delete an empty bucket
    Delete { bucket: String },
    /// List the project's buckets
    List,
    /// Show one bucket exactly as the API returns it
    Describe { bucket: String },
}

pub async fn run(ctx: &Ctx, cmd: StorageCmd) -> Result<()> {
    match cmd {
        StorageCmd::Ls {
            url,
            long,
            recursive,
        } => ls(ctx, url, long, recursive).await,
        StorageCmd::Cat { url } => cat(&url).await,
        StorageCmd::Cp { src, dest } => cp(ctx, &src, &dest).await,
        StorageCmd::Rm { url, recursive } => rm(ctx, &url, recursive).await,
        StorageCmd::Buckets(cmd) => buckets(ctx, cmd).await,
    }
}

async fn ls(ctx: &Ctx, url: Option<String>, long: bool, recursive: bool) -> Result<()> {
    let Some(url) = url else {
        let project = ctx.project()?;
        let buckets = storage::list_buckets(&project).await?;
        if ctx.json_output() {
            return print_json(&buckets);
        }
        for bucket in &buckets {
            println!("gs://{}/", bucket.name);
        }
        return Ok(());
    };

    let (bucket, path) = storage::parse_gs_url(&url)?;
    // An exact object path lists just that object, like a file given to ls.
    if !path.is_empty()
        && !path.ends_with('/')
        && let Ok(object) = storage::get_object(&bucket, &path).await
    {
        if ctx.json_output() {
            return print_json(&object);
        }
        println!("{}", object_line(&bucket, &object, long));
        return Ok(());
    }

    let delimiter = if recursive { None } else { Some("/") };
    let (prefixes, objects) = storage::list_objects(&bucket, &path, delimiter).await?;
    if ctx.json_output() {
        return print_json(&json!({"prefixes": prefixes, "items": objects}));
    }
    for prefix in &prefixes {
        println!("gs://{bucket}/{prefix}");
    }
    for object in &objects {
        println!("{}", object_line(&bucket, object, long));
    }
    if long {
        let total: u64 = objects.iter().filter_map(Object::size_bytes).sum();
        println!("TOTAL: {} objects, {} bytes", objects.len(), total);
    }
    Ok(())
}

fn object_line(bucket: &str, object: &Object, long: bool) -> String {
    if long {
        format!(
            "{:>10}  {:<24}  gs://{}/{}",
            object.size.as_deref().unwrap_or("-"),
            object.updated.as_deref().unwrap_or("-"),
            bucket,
            object.name
        )
    } else {
        format!("gs://{}/{}", bucket, object.name)
    }
}

async fn cat(url: &str) -> Result<()> {
    let (bucket, object) = storage::parse_gs_url(url)?;
    if object.is_empty() || object.ends_with('/') {
        bail!("cat requires a full object path, not a bucket or prefix: {url}");
    }
    let bytes = storage::download_object(&bucket, &object)
        .await
        .with_context(|| format!("Failed to download gs://{bucket}/{object}"))?;
    let mut out = std::io::stdout().lock();
    out.write_all(&bytes)?;
    Ok(())
}

async fn cp(ctx: &Ctx, src: &str, dest: &str) -> Result<()> {
    match (src.starts_with("gs://"), dest.starts_with("gs://")) {
        (true, true) => bail!("copying between two storage URLs is not supported"),
        (false, false) => bail!("at least one of SRC and DEST must be a storage URL (gs://...)"),
        (false, true) => upload(ctx, src, dest).await,
        (true, false) => download(src, dest).await,
    }
}

async fn upload(ctx: &Ctx, src: &str, dest: &str) -> Result<()> {
    let (bucket, mut name) = storage::parse_gs_url(dest)?;
    let data = std::fs::read(src).with_context(|| format!("Failed to read [{src}]"))?;
    if name.is_empty() || name.ends_with('/') {
        let file = Path::new(src)
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("[{src}] has no file name to copy to [{dest}]"))?;
        name.push_str(file);
    }
    eprintln!("Copying file://{src} to gs://{bucket}/{name}");
    let size = data.len();
    let object = storage::upload_object(&bucket, &name, data, "application/octet-stream").await?;
    eprintln!("  Completed files 1/1 | {size}B");
    if ctx.json_output() {
        return print_json(&object);
    }
    Ok(())
}

async fn download(src: &str, dest: &str) -> Result<()> {
    let (bucket, object) = storage::parse_gs_url(src)?;
    if object.is_empty() || object.ends_with('/') {
        bail!("download requires a full object path, not a bucket or prefix: {src}");
    }
    let metadata = storage::get_object(&bucket, &object).await?;
    let data = storage::download_object(&bucket, &object).await?;
    storage::verify_md5(&data, &metadata)?;

    let mut dest_path = PathBuf::from(dest);
    if dest.ends_with('/') || dest_path.is_dir() {
        dest_path.push(last_segment(&object));
    }
    eprintln!("Copying gs://{bucket}/{object} to file://{}", dest_path.display());
    std::fs::write(&dest_path, &data)
        .with_context(|| format!("Failed to write [{}]", dest_path.display()))?;
    eprintln!("  Completed files 1/1 | {}B", data.len());
    Ok(())
}

async fn rm(ctx: &Ctx, url: &str, recursive: bool) -> Result<()> {
    let (bucket, path) = storage::parse_gs_url(url)?;
    let targets: Vec<String> = if recursive {
        let (_, objects) = storage::list_objects(&bucket, &path, None).await?;
        objects.into_iter().map(|o| o.name).collect()
    } else {
        if path.is_empty() || path.ends_with('/') {
            bail!("rm requires a full object path unless --recursive is given: {url}");
        }
        vec![path]
    };
    if targets.is_empty() {
        bail!("no objects matched [{url}]");
    }

    let listing = targets
        .iter()
        .map(|name| format!(" - [gs://{bucket}/{name}]"))
        .join("\n");
    ctx.confirm(&format!("The following objects will be deleted:\n{listing}"))?;

    for name in &targets {
        eprintln!("Removing gs://{bucket}/{name}...");
        storage::delete_object(&bucket, name)
            .await
            .with_context(|| format!("Failed to delete gs://{bucket}/{name}"))?;
    }
    eprintln!("  Completed {}/{}", targets.len(), targets.len());
    Ok(())
}

async fn buckets(ctx: &Ctx, cmd: BucketsCmd) -> Result<()> {
    match cmd {
        BucketsCmd::Create {
            bucket,
            location,
            storage_class,
        } => {
            let project = ctx.project()?;
            let name = bucket_name(&bucket)?;
            let request = BucketRequest {
                name,
                location,
                storage_class,
            };
            let created = storage::create_bucket(&project, &request).await?;
            eprintln!("Created [gs://{}/].", created.name);
            if ctx.json_output() {
                return print_json(&created);
            }
            Ok(())
        }
        BucketsCmd::Delete { bucket } => {
            let name = bucket_name(&bucket)?;
            ctx.confirm(&format!("Bucket [gs://{name}/] will be deleted."))?;
            storage::delete_bucket(&name).await?;
            eprintln!("Deleted [gs://{name}/].");
            Ok(())
        }
        BucketsCmd::List => {
            let project = ctx.project()?;
            let buckets = storage::list_buckets(&project).await?;
            if ctx.json_output() {
                return print_json(&buckets);
            }
            if buckets.is_empty() {
                eprintln!("Listed 0 items.");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = buckets
                .iter()
                .map(|b| {
                    vec![
                        b.name.clone(),
                        b.location.clone().unwrap_or_else(|| "-".to_string()),
                        b.storage_class.clone().unwrap_or_else(|| "-".to_string()),
                        b.time_created
                            .as_deref()
                            .map(enrich_datetime)
                            .unwrap_or_else(|| "-".to_string()),
                    ]
                })
                .collect();
            print_table(&["NAME", "LOCATION", "STORAGE_CLASS", "CREATED"], &rows);
            Ok(())
        }
        BucketsCmd::Describe { bucket } => {
            let name = bucket_name(&bucket)?;
            let raw = storage::get_bucket(&name).await?;
            print_json(&raw)
        }
    }
}

/// Accepts a bucket as `gs://name`, `gs://name/`, or a bare name.
fn bucket_name(input: &str) -> Result<String> {
    let name = input.strip_prefix("gs://").unwrap_or(input);
    let name = name.trim_end_matches('/');
    if name.is_empty() || name.contains('/') {
        bail!("[{input}] is not a bucket name");
    }
    Ok(name.to_string())
}
