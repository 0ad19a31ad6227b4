use clap::{Parser, Subcommand, ValueHint};
use std::path::PathBuf;

#[derive(Parser)]
#[command(about, version, name = "dronegraph")]
/// Dronegraph shape driven population of drone flight metadata
pub struct Args {
    /// Write logs as JSON lines
    ///
    /// Log levels are set with the RUST_LOG environment variable.
    #[arg(long, global = true)]
    pub log_json: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// List the shape sets, or the shapes of a shape set
    Shapes {
        /// File containing the SHACL shapes
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        shapes: PathBuf,
        /// Shape set to describe
        ///
        /// If not present, the labels of every shape set are listed.
        #[arg(long)]
        shape_set: Option<String>,
        /// Write a template of the shape set instances, with a placeholder per property
        #[arg(long, requires = "shape_set")]
        map: bool,
        /// Format of the template
        ///
        /// It can be an extension like "nt" or a MIME type like "application/n-triples".
        /// By default Turtle is used.
        #[arg(long, requires = "map")]
        format: Option<String>,
    },
    /// Print the input fields of a shape set as JSON
    Requirements {
        /// File containing the SHACL shapes
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        shapes: PathBuf,
        /// File containing the data graph, used to list the instances of referenced classes
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        data: Option<PathBuf>,
        /// TOML configuration file with a [flight] table
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
        /// Shape set describing the form
        ///
        /// By default the input_shape configuration value is used.
        #[arg(long)]
        shape_set: Option<String>,
    },
    /// Create and link the nodes described by a shape set
    ///
    /// The relationships of the constraint set, if any, are checked first and nothing is written if they do not hold.
    /// The whole data graph is written to the output file and the updated entities are printed as JSON.
    Populate {
        /// File containing the SHACL shapes
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        shapes: PathBuf,
        /// File containing the data graph to extend
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        data: Option<PathBuf>,
        /// JSON object mapping entity labels to terms
        ///
        /// Values are N-Triples terms like <http://example.com/flight> or plain strings.
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        entities: PathBuf,
        /// Index given to the entities created for the shape set
        #[arg(short, long)]
        multiplicity: Option<usize>,
        /// Shape set to populate
        ///
        /// By default the input_shape configuration value is used.
        #[arg(long)]
        shape_set: Option<String>,
        /// Shape set of relationships to check before populating
        ///
        /// By default the constraint_shape configuration value is used.
        #[arg(long)]
        constraint_set: Option<String>,
        /// TOML configuration file with a [flight] table
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
        /// File in which the data graph is written
        ///
        /// Its format is guessed from its extension.
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        output: PathBuf,
    },
    /// Check that the relationships of a constraint set hold between entities
    ///
    /// Exits with a failure status if some relationship does not hold.
    Validate {
        /// File containing the SHACL shapes
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        shapes: PathBuf,
        /// File containing the data graph
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        data: PathBuf,
        /// JSON object mapping entity labels to terms
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        entities: PathBuf,
        /// Shape set of relationships to check
        ///
        /// By default the constraint_shape configuration value is used.
        #[arg(long)]
        constraint_set: Option<String>,
        /// TOML configuration file with a [flight] table
        #[arg(short, long, value_hint = ValueHint::FilePath)]
        config: Option<PathBuf>,
    },
}
