use anyhow::{Context, bail};
use clap::Parser;
use dronegraph::{
    Config, EntityDictionary, EntityLabel, MemoryStore, PopulateOutcome, ValidationOutcome, form_requirements,
    resolve_shape_set, shape_set_labels, validate_and_populate, validate_constraints,
};
use oxrdf::{Graph, Literal, Term};
use oxrdfio::{RdfFormat, RdfParser, RdfSerializer};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write, stdout};
use std::path::Path;
use std::str::FromStr;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::{Args, Command};

mod cli;

pub fn main() -> anyhow::Result<()> {
    let matches = Args::parse();
    init_logging(matches.log_json);
    match matches.command {
        Command::Shapes {
            shapes,
            shape_set,
            map,
            format,
        } => {
            let shapes = load_graph(&shapes)?;
            let mut out = stdout().lock();
            let Some(shape_set) = shape_set else {
                for label in shape_set_labels(&shapes) {
                    writeln!(out, "{label}")?;
                }
                return Ok(());
            };
            let set = resolve_shape_set(&shapes, &shape_set)?;
            if set.is_empty() {
                bail!("No shape in shape set {shape_set}");
            }
            if map {
                let format = format
                    .as_deref()
                    .map_or(Ok(RdfFormat::Turtle), rdf_format_from_name)?;
                let mut serializer = RdfSerializer::from_format(format).for_writer(out);
                for shape in &set {
                    for triple in &shape.rdf_map() {
                        serializer.serialize_triple(triple)?;
                    }
                }
                serializer.finish()?.flush()?;
                return Ok(());
            }
            for shape in set {
                writeln!(out, "{}\t{}", shape.label(), shape.target_class)?;
                for property in shape.all_properties() {
                    match &property.path {
                        Some(path) => writeln!(out, "  {}\t{path}", property.name())?,
                        None => writeln!(out, "  {}", property.name())?,
                    }
                }
            }
            Ok(())
        }
        Command::Requirements {
            shapes,
            data,
            config,
            shape_set,
        } => {
            let shapes = load_graph(&shapes)?;
            let store = load_store(data.as_deref())?;
            let config = load_config(config.as_deref())?;
            let shape_set = shape_set.as_deref().unwrap_or(config.input_shape());
            let fields = form_requirements(&shapes, &store, shape_set, &config)?;
            let mut out = stdout().lock();
            serde_json::to_writer_pretty(&mut out, &fields)?;
            writeln!(out)?;
            Ok(())
        }
        Command::Populate {
            shapes,
            data,
            entities,
            multiplicity,
            shape_set,
            constraint_set,
            config,
            output,
        } => {
            let format = rdf_format_from_path(&output)?;
            let shapes = load_graph(&shapes)?;
            let mut store = load_store(data.as_deref())?;
            let mut entities = load_entities(&entities)?;
            let config = load_config(config.as_deref())?;
            let shape_set = shape_set.as_deref().unwrap_or(config.input_shape());
            let constraint_set = constraint_set.as_deref().or(config.constraint_shape());
            match validate_and_populate(
                &shapes,
                &mut store,
                &mut entities,
                shape_set,
                constraint_set,
                multiplicity,
                &config,
            )? {
                PopulateOutcome::Populated { created } => {
                    debug!("{} nodes created", created.len());
                }
                PopulateOutcome::NotFound { shape_set } => {
                    bail!("No shape in shape set {shape_set}")
                }
                PopulateOutcome::Rejected(report) => {
                    bail!("The entities do not satisfy the constraints:\n{report}")
                }
            }
            dump_graph(store.graph(), &output, format)?;
            write_entities(&entities)
        }
        Command::Validate {
            shapes,
            data,
            entities,
            constraint_set,
            config,
        } => {
            let shapes = load_graph(&shapes)?;
            let store = load_store(Some(data.as_path()))?;
            let entities = load_entities(&entities)?;
            let config = load_config(config.as_deref())?;
            let constraint_set = constraint_set
                .as_deref()
                .or(config.constraint_shape())
                .context("The --constraint-set option or the constraint_shape configuration value must be set")?;
            match validate_constraints(&shapes, &store, constraint_set, &entities)? {
                ValidationOutcome::Conforms => {
                    writeln!(stdout().lock(), "Conforms")?;
                    Ok(())
                }
                ValidationOutcome::Violated(report) => {
                    let mut out = stdout().lock();
                    writeln!(out, "{report}")?;
                    out.flush()?;
                    bail!("{} relationships do not hold", report.violations.len())
                }
                ValidationOutcome::NotFound { shape_set } => {
                    bail!("No shape in shape set {shape_set}")
                }
            }
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_graph(path: &Path) -> anyhow::Result<Graph> {
    let format = rdf_format_from_path(path)?;
    let file = File::open(path).with_context(|| format!("Error while opening {}", path.display()))?;
    let mut graph = Graph::new();
    for quad in RdfParser::from_format(format).for_reader(BufReader::new(file)) {
        let quad = quad.with_context(|| format!("Error while parsing {}", path.display()))?;
        graph.insert(quad.as_ref());
    }
    debug!("Loaded {} triples from {}", graph.len(), path.display());
    Ok(graph)
}

fn load_store(path: Option<&Path>) -> anyhow::Result<MemoryStore> {
    Ok(match path {
        Some(path) => load_graph(path)?.into(),
        None => MemoryStore::new(),
    })
}

fn dump_graph(graph: &Graph, path: &Path, format: RdfFormat) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("Error while creating {}", path.display()))?;
    let mut serializer = RdfSerializer::from_format(format).for_writer(BufWriter::new(file));
    for triple in graph {
        serializer.serialize_triple(triple)?;
    }
    serializer.finish()?.flush()?;
    Ok(())
}

#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    flight: BTreeMap<String, toml::Value>,
}

/// Reads the `[flight]` table. Non string values are kept in their TOML form.
fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        return Ok(Config::new());
    };
    let content = fs::read_to_string(path)
        .with_context(|| format!("Error while reading {}", path.display()))?;
    let file: ConfigFile = toml::from_str(&content)
        .with_context(|| format!("Invalid configuration file {}", path.display()))?;
    Ok(file
        .flight
        .into_iter()
        .map(|(key, value)| match value {
            toml::Value::String(value) => (key, value),
            value => (key, value.to_string()),
        })
        .collect())
}

fn load_entities(path: &Path) -> anyhow::Result<EntityDictionary> {
    let file = File::open(path).with_context(|| format!("Error while opening {}", path.display()))?;
    let values: BTreeMap<String, String> = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("{} must be a JSON object of strings", path.display()))?;
    Ok(values
        .into_iter()
        .map(|(label, value)| (EntityLabel::from(label.as_str()), parse_term(&value)))
        .collect::<EntityDictionary>())
}

/// N-Triples terms are parsed, anything else is a simple literal.
fn parse_term(value: &str) -> Term {
    Term::from_str(value).unwrap_or_else(|_| Literal::new_simple_literal(value).into())
}

fn write_entities(entities: &EntityDictionary) -> anyhow::Result<()> {
    let values = entities
        .iter()
        .map(|(label, term)| (label.to_string(), term.to_string()))
        .collect::<BTreeMap<_, _>>();
    let mut out = stdout().lock();
    serde_json::to_writer_pretty(&mut out, &values)?;
    writeln!(out)?;
    Ok(())
}

fn rdf_format_from_name(name: &str) -> anyhow::Result<RdfFormat> {
    if let Some(format) = RdfFormat::from_extension(name) {
        return Ok(format);
    }
    if let Some(format) = RdfFormat::from_media_type(name) {
        return Ok(format);
    }
    bail!("The file format '{name}' is unknown")
}

fn rdf_format_from_path(path: &Path) -> anyhow::Result<RdfFormat> {
    let Some(ext) = path.extension().and_then(OsStr::to_str) else {
        bail!(
            "The path {} has no extension to guess a file format from",
            path.display()
        )
    };
    RdfFormat::from_extension(ext).with_context(|| {
        format!("Not able to guess the file format from file name extension '{ext}'")
    })
}
