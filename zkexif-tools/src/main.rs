use std::{
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use halo2curves_axiom::bn256::Fr;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zkexif_circuit::{SchemeKind, DEFAULT_K};
use zkexif_common::{
    config::default_manifest_path, digest_to_field, fr_from_decimal, CommitmentScheme, Config,
    PoseidonEngine, ProofPayload, TruncationPolicy, ValueHashMode,
};
use zkexif_metadata::{
    embed, extract, parse_assignments, parse_removals, retrieve, ExifTool, ExtractOptions,
    MetadataTool, ReadOptions, WriteOptions,
};
use zkexif_prover::{generate_proof, resolve_query_tag, write_artifacts, Halo2Prover, ProofRequest};
use zkexif_verifier::{verify_image, Halo2Verifier, PayloadSource, VerifyRequest};

#[derive(Parser)]
#[command(
    name = "zkexif",
    about = "Prove facts about an image's metadata without revealing it"
)]
struct Cli {
    /// Path to the exiftool executable (overrides ZKEXIF_EXIFTOOL).
    #[arg(long, global = true)]
    exiftool: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the committed tag names and identifiers of an image.
    Extract(ExtractArgs),
    /// Print every tag of an image, grouped, as JSON.
    Read { image: PathBuf },
    /// Copy an image and set tags on the copy.
    Write {
        input: PathBuf,
        output: PathBuf,
        /// `Tag=Value` assignments.
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Copy an image and delete tags from the copy.
    Remove {
        input: PathBuf,
        output: PathBuf,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Generate params/vk/pk and a manifest for one commitment scheme.
    GenParams(GenParamsArgs),
    /// Commit to an image's metadata and prove the commitment.
    Prove(ProveArgs),
    /// Check a proof against an image.
    Verify(VerifyArgs),
    /// Copy an image and store a proof payload in its metadata.
    Embed {
        image: PathBuf,
        proof: PathBuf,
        output: PathBuf,
        /// Target field (overrides ZKEXIF_EMBED_FIELD).
        #[arg(long)]
        field: Option<String>,
    },
    /// Print the proof payload embedded in an image.
    Retrieve { image: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SchemeArg {
    /// Tag-name set with a membership query.
    IdentifierOnly,
    /// Tag names and values.
    IdentifierValuePair,
    /// Tag names and values keyed by a holder secret.
    SecretKeyedPair,
}

impl From<SchemeArg> for SchemeKind {
    fn from(arg: SchemeArg) -> Self {
        match arg {
            SchemeArg::IdentifierOnly => SchemeKind::IdentifierOnly,
            SchemeArg::IdentifierValuePair => SchemeKind::IdentifierValuePair,
            SchemeArg::SecretKeyedPair => SchemeKind::SecretKeyedPair,
        }
    }
}

#[derive(Args)]
struct HashingArgs {
    /// `truncate` or `reject` (overrides ZKEXIF_TRUNCATION).
    #[arg(long)]
    truncation: Option<TruncationPolicy>,
    /// `poseidon` or `blake3` (overrides ZKEXIF_VALUE_HASH).
    #[arg(long)]
    value_hash: Option<ValueHashMode>,
}

impl HashingArgs {
    fn options(&self, config: &Config) -> ExtractOptions {
        ExtractOptions {
            value_hash: self.value_hash.unwrap_or(config.value_hash),
            truncation: self.truncation.unwrap_or(config.truncation),
        }
    }
}

#[derive(Args)]
struct ExtractArgs {
    image: PathBuf,
    #[command(flatten)]
    hashing: HashingArgs,
}

#[derive(Args)]
struct GenParamsArgs {
    #[arg(long, value_enum)]
    scheme: SchemeArg,
    /// Defaults to the directory of the scheme's manifest.
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

#[derive(Args)]
struct ProveArgs {
    image: PathBuf,
    #[arg(long, value_enum, default_value_t = SchemeArg::IdentifierValuePair)]
    scheme: SchemeArg,
    /// Tag name or numeric identifier whose presence is proven.
    #[arg(long, required_if_eq("scheme", "identifier-only"))]
    query: Option<String>,
    /// Holder secret: a decimal field element, or any text (hashed).
    #[arg(long, required_if_eq("scheme", "secret-keyed-pair"))]
    secret: Option<String>,
    #[arg(long, default_value = "proof.json")]
    out: PathBuf,
    /// Field to embed the payload into; defaults to ZKEXIF_EMBED_FIELD.
    #[arg(long, requires = "embed_out")]
    embed: Option<String>,
    /// Where to write the image copy carrying the payload.
    #[arg(long)]
    embed_out: Option<PathBuf>,
    #[arg(long)]
    manifest: Option<PathBuf>,
    #[command(flatten)]
    hashing: HashingArgs,
}

#[derive(Args)]
struct VerifyArgs {
    image: PathBuf,
    /// Payload file; read from the image's metadata when omitted.
    proof: Option<PathBuf>,
    #[arg(long)]
    secret: Option<String>,
    #[arg(long)]
    manifest: Option<PathBuf>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExtractSummary<'a> {
    image_path: String,
    tag_count: usize,
    tag_names: &'a [String],
    tag_ids: &'a [u32],
    truncated: bool,
}

fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zkexif=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::from_env()?;
    if let Some(exiftool) = cli.exiftool {
        config.exiftool = exiftool;
    }

    match cli.command {
        Commands::Extract(args) => extract_cmd(&config, args),
        Commands::Read { image } => {
            let mut tool = ExifTool::spawn(&config.exiftool)?;
            let tags = tool.read(&image, &ReadOptions::default())?;
            print_json(&tags)
        }
        Commands::Write {
            input,
            output,
            tags,
        } => {
            let tags = parse_assignments(&tags)?;
            edit_copy(&config, &input, &output, &tags)?;
            println!("Wrote {} tag(s) to {}", tags.len(), output.display());
            Ok(())
        }
        Commands::Remove {
            input,
            output,
            tags,
        } => {
            let tags = parse_removals(&tags)?;
            edit_copy(&config, &input, &output, &tags)?;
            let names: Vec<&str> = tags.keys().map(String::as_str).collect();
            println!("Removed tags from {}: {}", output.display(), names.join(", "));
            Ok(())
        }
        Commands::GenParams(args) => gen_params(args),
        Commands::Prove(args) => prove_cmd(&config, args),
        Commands::Verify(args) => verify_cmd(&config, args),
        Commands::Embed {
            image,
            proof,
            output,
            field,
        } => {
            let payload = ProofPayload::read_from(&proof)
                .with_context(|| format!("failed to load {}", proof.display()))?;
            let field = field.unwrap_or_else(|| config.embed_field.clone());
            let mut tool = ExifTool::spawn(&config.exiftool)?;
            embed(&mut tool, &image, &payload, &field, &output)?;
            println!("Embedded proof into {} ({field})", output.display());
            Ok(())
        }
        Commands::Retrieve { image } => {
            let mut tool = ExifTool::spawn(&config.exiftool)?;
            let payload = retrieve(&mut tool, &image)?;
            println!("{}", payload.to_json_pretty()?);
            Ok(())
        }
    }
}

fn extract_cmd(config: &Config, args: ExtractArgs) -> Result<()> {
    let mut tool = ExifTool::spawn(&config.exiftool)?;
    let extraction = extract(
        &mut tool,
        PoseidonEngine::shared(),
        &args.image,
        args.hashing.options(config),
    )?;
    print_json(&ExtractSummary {
        image_path: args.image.display().to_string(),
        tag_count: extraction.count,
        tag_names: &extraction.ordered_tag_names,
        tag_ids: &extraction.identifiers,
        truncated: extraction.truncated,
    })
}

fn edit_copy(
    config: &Config,
    input: &Path,
    output: &Path,
    tags: &std::collections::BTreeMap<String, Option<String>>,
) -> Result<()> {
    let mut tool = ExifTool::spawn(&config.exiftool)?;
    tool.copy(input, output)
        .with_context(|| format!("failed to copy {} to {}", input.display(), output.display()))?;
    tool.write(output, tags, &WriteOptions::default())?;
    Ok(())
}

fn gen_params(args: GenParamsArgs) -> Result<()> {
    let scheme = SchemeKind::from(args.scheme);
    let output_dir = match args.output_dir {
        Some(dir) => dir,
        None => default_manifest_path(scheme)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")),
    };
    println!("Generating {scheme} artifacts (k={DEFAULT_K})...");
    println!("This may take several minutes...");

    let manifest = write_artifacts(&output_dir, scheme)?;
    println!(
        "Generated artifacts for circuit v{} (k={}) at {}",
        manifest.circuit_version,
        manifest.k,
        output_dir.display()
    );
    println!("  params.bin: {} bytes, blake3: {}", manifest.params.size, manifest.params.blake3);
    println!("  vk.bin: {} bytes, blake3: {}", manifest.vk.size, manifest.vk.blake3);
    println!("  pk.bin: {} bytes, blake3: {}", manifest.pk.size, manifest.pk.blake3);
    Ok(())
}

fn prove_cmd(config: &Config, args: ProveArgs) -> Result<()> {
    let kind = SchemeKind::from(args.scheme);
    let scheme = match kind {
        SchemeKind::IdentifierOnly => {
            let query = args.query.as_deref().context("--query is required")?;
            CommitmentScheme::IdentifierOnly {
                query_tag: resolve_query_tag(query),
            }
        }
        SchemeKind::IdentifierValuePair => CommitmentScheme::IdentifierValuePair,
        SchemeKind::SecretKeyedPair => {
            let secret = args.secret.as_deref().context("--secret is required")?;
            CommitmentScheme::SecretKeyedPair {
                secret: parse_secret(secret),
            }
        }
    };

    let request = ProofRequest {
        image: args.image.clone(),
        scheme,
        query_label: args.query.clone(),
        options: args.hashing.options(config),
        manifest_path: args
            .manifest
            .clone()
            .unwrap_or_else(|| config.manifest_for(kind)),
        output: Some(args.out.clone()),
    };

    let mut tool = ExifTool::spawn(&config.exiftool)?;
    let mut backend = Halo2Prover::new();
    let generated = generate_proof(&mut backend, &mut tool, PoseidonEngine::shared(), &request)?;
    if generated.extraction.truncated {
        eprintln!(
            "warning: {} tags found, only the first {} were committed",
            generated.extraction.ordered_tag_names.len(),
            generated.extraction.count
        );
    }
    println!("Proof written to {}", args.out.display());

    if let Some(embed_out) = args.embed_out.as_ref() {
        let field = args.embed.unwrap_or_else(|| config.embed_field.clone());
        embed(&mut tool, &args.image, &generated.payload, &field, embed_out)?;
        println!("Embedded proof into {} ({field})", embed_out.display());
    }
    Ok(())
}

fn verify_cmd(config: &Config, args: VerifyArgs) -> Result<()> {
    let source = match args.proof.as_deref() {
        Some(path) => PayloadSource::File(path),
        None => PayloadSource::Embedded,
    };
    let request = VerifyRequest {
        image: &args.image,
        source,
        secret: args.secret.as_deref().map(parse_secret),
        manifest_path: args.manifest.clone().or_else(|| config.manifest_path.clone()),
    };

    let mut tool = ExifTool::spawn(&config.exiftool)?;
    let mut backend = Halo2Verifier::new();
    let report = verify_image(&mut backend, &mut tool, PoseidonEngine::shared(), &request)?;
    info!(scheme = %report.payload.scheme(), "payload checked");

    if let Err(err) = report.outcome.ensure_verified() {
        println!("Proof invalid");
        return Err(err.into());
    }
    println!("Proof verified");
    Ok(())
}

/// Decimal field elements are used as-is; any other text is hashed into the field.
fn parse_secret(raw: &str) -> Fr {
    fr_from_decimal(raw).unwrap_or_else(|_| digest_to_field(raw.as_bytes()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{json}");
    Ok(())
}
