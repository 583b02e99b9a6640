//! apimorph CLI
//!
//! Compile version definitions and run documents through their mappings.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;

use apimorph::{
    CompileConfig, ProcessError, SchemaCatalog, Version, VersionRegistry, VersionSetDef,
};

#[derive(Parser)]
#[command(name = "apimorph")]
#[command(about = "Compile versioned request shapes and transform documents")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a version-set definition and print one artifact
    Compile {
        /// Version-set definition file (JSON)
        versions: PathBuf,

        /// Version to compile (default: latest; inexact names downgrade)
        #[arg(long)]
        version: Option<String>,

        /// Artifact to print
        #[arg(long, value_enum, default_value_t = Artifact::Schema)]
        artifact: Artifact,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Transform a document through a version's mapping
    Transform {
        /// Version-set definition file (JSON)
        versions: PathBuf,

        /// Document file to transform
        document: PathBuf,

        /// Version to transform with (default: latest)
        #[arg(long)]
        version: Option<String>,

        /// Validate the document before transforming
        #[arg(long)]
        validate: bool,

        /// Apply the inverse mapping (internal shape back to external)
        #[arg(long)]
        reverse: bool,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Validate a document against a version's validation schema
    Validate {
        /// Version-set definition file (JSON)
        versions: PathBuf,

        /// Document file to validate
        document: PathBuf,

        /// Version to validate against (default: latest)
        #[arg(long)]
        version: Option<String>,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Artifact {
    /// Publishable JSON Schema
    Schema,
    /// Self-contained validation schema
    Validation,
    /// Forward mapping table
    Mapping,
    /// Inverse mapping table
    Inverse,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Compile {
            versions,
            version,
            artifact,
            output,
            pretty,
        } => run_compile(&versions, version.as_deref(), artifact, output, pretty),

        Commands::Transform {
            versions,
            document,
            version,
            validate,
            reverse,
            output,
            pretty,
        } => run_transform(TransformArgs {
            versions,
            document,
            version,
            validate,
            reverse,
            output,
            pretty,
        }),

        Commands::Validate {
            versions,
            document,
            version,
            json,
        } => run_validate(&versions, &document, version.as_deref(), json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

fn run_compile(
    versions_path: &PathBuf,
    version_id: Option<&str>,
    artifact: Artifact,
    output: Option<PathBuf>,
    pretty: bool,
) -> Result<(), u8> {
    let registry = load_registry(versions_path)?;
    let version = pick_version(&registry, version_id)?;

    let value = match artifact {
        Artifact::Schema => version.schema().map(Value::clone),
        Artifact::Validation => version.validation_schema().map(Value::clone),
        Artifact::Mapping => version.mapping().map(|m| m.to_document()),
        Artifact::Inverse => version.inverse_mapping().map(|m| m.to_document()),
    }
    .map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    write_output(&value, output, pretty)
}

struct TransformArgs {
    versions: PathBuf,
    document: PathBuf,
    version: Option<String>,
    validate: bool,
    reverse: bool,
    output: Option<PathBuf>,
    pretty: bool,
}

fn run_transform(args: TransformArgs) -> Result<(), u8> {
    let registry = load_registry(&args.versions)?;
    let document = load_json(&args.document)?;

    let result = if args.reverse {
        // Reverse transforms never validate: the validation schema
        // describes the external shape, not the internal one.
        let version = pick_version(&registry, args.version.as_deref())?;
        version.transform_back(&document).map_err(ProcessError::from)
    } else {
        let version_id = match args.version.as_deref() {
            Some(id) => id,
            None => latest_name(&registry)?,
        };
        registry.process(&document, version_id, args.validate)
    };

    match result {
        Ok(value) => write_output(&value, args.output, args.pretty),
        Err(ProcessError::Invalid { errors }) => {
            eprintln!("Validation failed:");
            for error in errors {
                eprintln!("  {}", error);
            }
            Err(1)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            Err(e.exit_code() as u8)
        }
    }
}

fn run_validate(
    versions_path: &PathBuf,
    document_path: &PathBuf,
    version_id: Option<&str>,
    json_output: bool,
) -> Result<(), u8> {
    let registry = load_registry(versions_path)?;
    let document = load_json(document_path)?;
    let version = pick_version(&registry, version_id)?;

    let schema = version.validation_schema().map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;
    let errors = apimorph::check(schema, &document).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    if errors.is_empty() {
        if json_output {
            println!(r#"{{"valid":true}}"#);
        } else {
            println!("Valid");
        }
        Ok(())
    } else {
        if json_output {
            let output = serde_json::json!({ "valid": false, "errors": errors });
            println!("{}", output);
        } else {
            eprintln!("Validation failed:");
            for error in &errors {
                eprintln!("  {}", error);
            }
        }
        Err(1)
    }
}

fn load_registry(path: &PathBuf) -> Result<VersionRegistry, u8> {
    let def: VersionSetDef = serde_json::from_value(load_json(path)?).map_err(|e| {
        eprintln!("Error reading version definitions: {}", e);
        2u8
    })?;
    VersionRegistry::from_definitions(&def, &CompileConfig::new(), &SchemaCatalog::new()).map_err(
        |e| {
            eprintln!("Error: {}", e);
            e.exit_code() as u8
        },
    )
}

fn load_json(path: &PathBuf) -> Result<Value, u8> {
    let text = std::fs::read_to_string(path).map_err(|e| {
        eprintln!("Error reading {}: {}", path.display(), e);
        3u8
    })?;
    serde_json::from_str(&text).map_err(|e| {
        eprintln!("Error parsing {}: {}", path.display(), e);
        2u8
    })
}

fn pick_version<'a>(
    registry: &'a VersionRegistry,
    version_id: Option<&str>,
) -> Result<&'a Version, u8> {
    match version_id {
        Some(id) => registry.resolve(id).map_err(|e| {
            eprintln!("Error: {}", e);
            2u8
        }),
        None => registry.latest().ok_or_else(|| {
            eprintln!("Error: no versions defined");
            2u8
        }),
    }
}

fn latest_name(registry: &VersionRegistry) -> Result<&str, u8> {
    registry.latest().map(|v| v.name()).ok_or_else(|| {
        eprintln!("Error: no versions defined");
        2u8
    })
}

fn write_output(value: &Value, output: Option<PathBuf>, pretty: bool) -> Result<(), u8> {
    let json_output = if pretty {
        serde_json::to_string_pretty(value)
    } else {
        serde_json::to_string(value)
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &json_output).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", json_output);
        }
    }

    Ok(())
}
