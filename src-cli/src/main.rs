//! Halscope command line
//!
//! Prints what an inspector window would show: the object tree, the
//! property listing of one object, control models, and the results of
//! queries that need input.

use clap::{Parser, Subcommand};
use halscope_core::{InspectorSettings, ScopeSetting};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "halscope")]
#[command(about = "Inspect Core Audio HAL objects and their properties", long_about = None)]
#[command(version)]
struct Cli {
    /// Use the built-in simulated HAL instead of the system one
    #[arg(long, global = true)]
    simulated: bool,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Property scope (global, input, output, play_through, any)
    #[arg(long, global = true)]
    scope: Option<ScopeSetting>,

    /// Include deprecated property sets
    #[arg(long, global = true)]
    deprecated: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the object tree
    Tree,

    /// List the properties of an object
    Props {
        /// Object id (e.g. 40 or @40)
        object: String,
    },

    /// Query a property that needs input (translation, qualifier or inbound value)
    Query {
        object: String,
        /// Property case name, e.g. DataSourceNameForIdCfString
        property: String,
        /// Input text; comma-separated for array qualifiers
        input: String,
    },

    /// Show the control model of a control object
    Control { object: String },

    /// Write a control's value
    SetControl {
        object: String,
        /// New value: number, true/false, or comma-separated item ids
        value: String,
        /// For level controls, write the scalar instead of the decibel value
        #[arg(long)]
        scalar: bool,
    },

    /// Print change notifications for a property
    Watch {
        object: String,
        property: String,
        /// Stop after this many seconds
        #[arg(long, default_value_t = 30)]
        seconds: u64,
    },

    /// Show the settings file, optionally saving the current flags into it
    Settings {
        #[arg(long)]
        save: bool,
    },
}

fn init_logging(settings: &InspectorSettings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut settings = InspectorSettings::load();
    init_logging(&settings);

    if let Some(scope) = cli.scope {
        settings.scope = scope;
    }
    settings.include_deprecated |= cli.deprecated;
    settings.simulated |= cli.simulated;

    info!("Starting halscope ({})", if settings.simulated { "simulated" } else { "system HAL" });
    let hal = halscope_hal::create_hal(settings.simulated);

    let output = commands::Output { json: cli.json };
    match cli.command {
        Command::Tree => commands::tree(hal.as_ref(), output),
        Command::Props { object } => commands::props(hal.as_ref(), &settings, &object, output),
        Command::Query {
            object,
            property,
            input,
        } => commands::query(hal.as_ref(), &settings, &object, &property, &input, output),
        Command::Control { object } => commands::control(hal.as_ref(), &object, output),
        Command::SetControl {
            object,
            value,
            scalar,
        } => commands::set_control(hal.as_ref(), &object, &value, scalar, output),
        Command::Watch {
            object,
            property,
            seconds,
        } => commands::watch(hal, &settings, &object, &property, seconds),
        Command::Settings { save } => commands::settings(&mut settings, save, output),
    }
}
