//! `casctl`: blobs and manifests in a local filesystem store

use anyhow::{Context as _, Result};
use cas_artifact::{Descriptor, Digest};
use cas_manifest::{AnyManifest, FormatRegistry, Manifest, Versioned};
use cas_storage::{
    Context, FsRepository, ManifestService, PutOptions, Repository, StorageConfig, StorageError,
};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_BLOB_MEDIA_TYPE: &str = "application/octet-stream";

fn cli() -> Command {
    let digest_arg = || {
        Arg::new("digest")
            .required(true)
            .value_parser(value_parser!(Digest))
            .help("Digest in <algorithm>:<hex> form")
    };
    let file_arg = || {
        Arg::new("file")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("File to upload")
    };

    Command::new("casctl")
        .version(cas_storage::VERSION)
        .about("Content-addressable manifest store")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("root")
                .long("root")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Store root directory (overrides config)"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("repository")
                .long("repository")
                .global(true)
                .default_value("default")
                .help("Repository name"),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging"),
        )
        .subcommand(
            Command::new("blob")
                .about("Raw blob operations")
                .subcommand_required(true)
                .subcommand(
                    Command::new("put")
                        .about("Store a file as a blob")
                        .arg(file_arg())
                        .arg(
                            Arg::new("media-type")
                                .long("media-type")
                                .default_value(DEFAULT_BLOB_MEDIA_TYPE)
                                .help("Media type recorded for the blob"),
                        ),
                )
                .subcommand(Command::new("stat").about("Describe a blob").arg(digest_arg()))
                .subcommand(Command::new("delete").about("Remove a blob").arg(digest_arg())),
        )
        .subcommand(
            Command::new("manifest")
                .about("Manifest operations")
                .subcommand_required(true)
                .subcommand(
                    Command::new("put")
                        .about("Verify and store a manifest document")
                        .arg(file_arg())
                        .arg(
                            Arg::new("media-type")
                                .long("media-type")
                                .help("Media type (default: the document's mediaType)"),
                        )
                        .arg(
                            Arg::new("skip-verify")
                                .long("skip-verify")
                                .action(ArgAction::SetTrue)
                                .help("Store without checking referenced blobs"),
                        ),
                )
                .subcommand(
                    Command::new("get")
                        .about("Print a stored manifest")
                        .arg(digest_arg()),
                )
                .subcommand(
                    Command::new("delete")
                        .about("Remove a stored manifest")
                        .arg(digest_arg()),
                ),
        )
        .subcommand(Command::new("formats").about("List registered manifest media type prefixes"))
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(matches: &ArgMatches) -> Result<StorageConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => StorageConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => StorageConfig::default(),
    };
    if let Some(root) = matches.get_one::<PathBuf>("root") {
        config = config.with_root(root);
    }
    Ok(config)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn required<'a, T: Clone + Send + Sync + 'static>(args: &'a ArgMatches, name: &str) -> Result<&'a T> {
    args.get_one::<T>(name)
        .with_context(|| format!("missing argument <{name}>"))
}

async fn read_file(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ManifestOutput<'a> {
    digest: String,
    media_type: &'a str,
    references: &'a [Descriptor],
    payload: serde_json::Value,
}

async fn run_blob(repository: &FsRepository, ctx: &Context, args: &ArgMatches) -> Result<()> {
    let blobs = repository.blobs();
    match args.subcommand() {
        Some(("put", args)) => {
            let path = required::<PathBuf>(args, "file")?;
            let media_type = required::<String>(args, "media-type")?;
            let content = read_file(path).await?;
            let descriptor = blobs.put(ctx, media_type, &content).await?;
            print_json(&descriptor)
        }
        Some(("stat", args)) => {
            let digest = required::<Digest>(args, "digest")?;
            print_json(&blobs.stat(ctx, digest).await?)
        }
        Some(("delete", args)) => {
            let digest = required::<Digest>(args, "digest")?;
            blobs.delete(ctx, digest).await?;
            print_json(&serde_json::json!({ "deleted": digest }))
        }
        _ => anyhow::bail!("unknown blob command"),
    }
}

async fn run_manifest(service: &ManifestService, ctx: &Context, args: &ArgMatches) -> Result<()> {
    match args.subcommand() {
        Some(("put", args)) => {
            let path = required::<PathBuf>(args, "file")?;
            let content = read_file(path).await?;
            let media_type = match args.get_one::<String>("media-type") {
                Some(media_type) => media_type.clone(),
                None => Versioned::peek(&content)
                    .with_context(|| format!("{} is not a manifest document", path.display()))?
                    .media_type,
            };
            let options = if args.get_flag("skip-verify") {
                PutOptions::new().skip_dependency_verification()
            } else {
                PutOptions::new()
            };

            let digest = match service.put_bytes(ctx, &media_type, &content, options).await {
                Ok(digest) => digest,
                Err(StorageError::Manifest(err)) if err.is_content_error() => {
                    return Err(anyhow::Error::new(err)
                        .context(format!("{} is not a valid {media_type} manifest", path.display())));
                }
                Err(err) => return Err(err.into()),
            };
            print_json(&serde_json::json!({ "digest": digest, "mediaType": media_type }))
        }
        Some(("get", args)) => {
            let digest = required::<Digest>(args, "digest")?;
            let manifest: AnyManifest = service.get(ctx, digest).await?;
            let payload = manifest.payload()?;
            print_json(&ManifestOutput {
                digest: digest.to_string(),
                media_type: payload.media_type,
                references: manifest.references(),
                payload: serde_json::from_slice(payload.bytes)?,
            })
        }
        Some(("delete", args)) => {
            let digest = required::<Digest>(args, "digest")?;
            service.delete(ctx, digest).await?;
            print_json(&serde_json::json!({ "deleted": digest }))
        }
        _ => anyhow::bail!("unknown manifest command"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("verbose"));

    let formats = FormatRegistry::global();
    if let Some(("formats", _)) = matches.subcommand() {
        return print_json(&formats.prefixes());
    }

    let config = load_config(&matches)?;
    let name = required::<String>(&matches, "repository")?;
    let repository = Arc::new(FsRepository::open(&config, name)?);
    tracing::debug!(root = %config.root.display(), repository = name, "opened repository");

    let ctx = Context::background();
    match matches.subcommand() {
        Some(("blob", args)) => run_blob(&repository, &ctx, args).await,
        Some(("manifest", args)) => {
            let service = ManifestService::from_config(repository, formats, &config);
            run_manifest(&service, &ctx, args).await
        }
        _ => anyhow::bail!("unknown command"),
    }
}
