//! Developer CLI: inspect schemas, cascade variants, and write minimal overrides.
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use pbi_theme_engine::form::Validator;
use pbi_theme_engine::style::{props_to_value, DEFAULT_VARIANT};
use pbi_theme_engine::{
    extract_variant_overrides, get_property_sources, merge_styles, PropValue, PropertySource,
    SchemaDocument, SchemaResolver, StyleProps, ThemeDocument,
};

// ————————————————————————————————————————————————————————————————————————————
// TYPES
// ————————————————————————————————————————————————————————————————————————————

/// resolve Power BI theme schemas and work with visual style variants
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    /// more logging (-v info, -vv debug, -vvv trace); RUST_LOG wins when set
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// list the visual types a schema can style
    Visuals(SchemaSettings),
    /// print the resolved schema of one visual (or all of them)
    Resolve(ResolveOut),
    /// print the effective style of a variant
    Cascade(CascadeOut),
    /// show where each property of a variant's effective style comes from
    Sources(VariantSettings),
    /// store a computed style as a variant, keeping only what differs from "*"
    Extract(ExtractOut),
    /// check every variant of every theme survives merge → extract → merge
    Check(CheckSettings),
    /// validate theme styles against the schema
    Validate(ValidateSettings),
}

#[derive(Args, Debug, Clone)]
struct SchemaSettings {
    /// theme JSON schema
    #[arg(long, env = "PBI_THEME_SCHEMA")]
    schema: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct VariantSettings {
    /// theme JSON file
    #[arg(long)]
    theme: PathBuf,

    /// visual type, e.g. `card`
    #[arg(long)]
    visual: String,

    /// variant name
    #[arg(long, default_value = DEFAULT_VARIANT)]
    variant: String,
}

#[derive(clap::Parser, Debug)]
struct ResolveOut {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// visual type (all visuals if omitted)
    #[arg(long)]
    visual: Option<String>,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct CascadeOut {
    #[command(flatten)]
    variant_settings: VariantSettings,

    /// output .json file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(clap::Parser, Debug)]
struct ExtractOut {
    #[command(flatten)]
    variant_settings: VariantSettings,

    /// JSON file holding the desired effective style
    #[arg(long)]
    computed: PathBuf,

    /// output theme file (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct CheckSettings {
    /// One or more theme files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(Args, Debug, Clone)]
struct ValidateSettings {
    #[command(flatten)]
    schema_settings: SchemaSettings,

    /// One or more theme files. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

// ————————————————————————————————————————————————————————————————————————————
// IMPLEMENTATION
// ————————————————————————————————————————————————————————————————————————————

impl SchemaSettings {
    fn load_resolver(&self) -> Result<SchemaResolver> {
        let source = read_source(&self.schema)?;
        let doc = SchemaDocument::from_str(&source)
            .with_context(|| format!("failed to parse schema {}", self.schema.display()))?;
        Ok(SchemaResolver::new(doc))
    }
}

impl VariantSettings {
    fn load_theme(&self) -> Result<ThemeDocument> {
        load_theme(&self.theme)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn init_logging(&self) {
        let level = match self.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
            .try_init();
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Visuals(target) => {
                let resolver = target.load_resolver()?;
                for visual in resolver.get_visual_types() {
                    println!("{visual}");
                }
            }
            Command::Resolve(target) => {
                let mut resolver = target.schema_settings.load_resolver()?;
                let value = match &target.visual {
                    Some(visual) => {
                        let schema = resolver
                            .get_visual_schema(visual)
                            .with_context(|| format!("schema has no visual `{visual}`"))?;
                        serde_json::to_value(&schema)?
                    }
                    None => serde_json::to_value(resolver.resolve_all())?,
                };
                log::info!("{} resolved nodes cached", resolver.cached_len());
                write_output(target.out.as_deref(), &serde_json::to_string_pretty(&value)?)?;
            }
            Command::Cascade(target) => {
                let settings = &target.variant_settings;
                let theme = settings.load_theme()?;
                let style = theme.variant_style(&settings.visual, &settings.variant)?;
                write_output(target.out.as_deref(), &serde_json::to_string_pretty(&props_to_value(&style))?)?;
            }
            Command::Sources(settings) => {
                let theme = settings.load_theme()?;
                let base = theme.variant_style(&settings.visual, DEFAULT_VARIANT)?;
                let overrides = theme.variant_overrides(&settings.visual, &settings.variant)?;
                let computed = merge_styles(&base, &overrides);
                for (property, source) in get_property_sources(&base, &overrides, &computed) {
                    let label = match source {
                        PropertySource::Inherited => source.to_string().dimmed(),
                        PropertySource::Overridden => source.to_string().yellow(),
                        PropertySource::New => source.to_string().green(),
                    };
                    println!("{property}: {label}");
                }
            }
            Command::Extract(target) => {
                let settings = &target.variant_settings;
                let mut theme = settings.load_theme()?;
                let source = read_source(&target.computed)?;
                let computed = pbi_theme_engine::path_de::from_str_with_path::<StyleProps>(&source)
                    .with_context(|| format!("failed to parse {}", target.computed.display()))?;
                let stored = theme.set_variant_style(&settings.visual, &settings.variant, computed);
                log::info!(
                    "{}/{}: stored {} overridden properties",
                    settings.visual,
                    settings.variant,
                    stored.len()
                );
                write_output(target.out.as_deref(), &theme.to_string_pretty()?)?;
            }
            Command::Check(settings) => {
                let mut failures = 0usize;
                for path in resolve_file_path_patterns(&settings.input)? {
                    let theme = load_theme(&path)?;
                    failures += check_round_trips(&path, &theme);
                }
                if failures > 0 {
                    bail!("{failures} variant(s) failed the round trip");
                }
            }
            Command::Validate(settings) => {
                let mut resolver = settings.schema_settings.load_resolver()?;
                let mut validator = Validator::new();
                let mut total = 0usize;
                for path in resolve_file_path_patterns(&settings.input)? {
                    let theme = load_theme(&path)?;
                    total += validate_theme(&path, &theme, &mut resolver, &mut validator)?;
                }
                if total > 0 {
                    bail!("{total} violation(s)");
                }
            }
        }
        Ok(())
    }
}

fn check_round_trips(path: &Path, theme: &ThemeDocument) -> usize {
    let mut failures = 0;
    for (visual, variants) in theme.visual_styles.iter() {
        let base = variants.get(DEFAULT_VARIANT).cloned().unwrap_or_default();
        for (variant, overrides) in variants.iter().filter(|(name, _)| name.as_str() != DEFAULT_VARIANT) {
            let computed = merge_styles(&base, overrides);
            let extracted = extract_variant_overrides(&base, &computed);
            if merge_styles(&base, &extracted) == computed {
                println!("{} {}: {visual}/{variant}", "✅".green(), path.display());
            } else {
                failures += 1;
                println!("{} {}: {visual}/{variant}", "❌".red(), path.display());
            }
        }
    }
    failures
}

fn validate_theme(
    path: &Path,
    theme: &ThemeDocument,
    resolver: &mut SchemaResolver,
    validator: &mut Validator,
) -> Result<usize> {
    let mut total = 0;
    for visual in theme.visual_types() {
        let Some(schema) = resolver.get_visual_schema(&visual) else {
            log::warn!("{}: visual `{visual}` has no schema, skipping", path.display());
            continue;
        };
        for variant in theme.variant_names(&visual)? {
            let style = theme.variant_style(&visual, &variant)?;
            let violations = validator.validate(&schema, &PropValue::Object(style));
            for violation in &violations {
                println!("{} {}: {visual}/{variant} {violation}", "❌".red(), path.display());
            }
            total += violations.len();
        }
    }
    Ok(total)
}

// ————————————————————————————————————————————————————————————————————————————
// INTERNAL HELPERS
// ————————————————————————————————————————————————————————————————————————————

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_theme(path: &Path) -> Result<ThemeDocument> {
    let source = read_source(path)?;
    ThemeDocument::from_str(&source).with_context(|| format!("failed to parse theme {}", path.display()))
}

fn write_output(out: Option<&Path>, contents: &str) -> Result<()> {
    match out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(out, contents).with_context(|| format!("failed to write {}", out.display()))?;
        }
        None => println!("{contents}"),
    }
    Ok(())
}

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}
