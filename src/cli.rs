use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ironlog", version, about = "CLI workout session tracker")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Emit machine-readable JSON instead of colorful text.
    #[arg(global = true, long)]
    pub json: bool,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Session-scoped commands
    #[command(subcommand, visible_alias = "s")]
    Session(SessionCmd),

    /// Workout template utilities
    #[command(subcommand, visible_alias = "t")]
    Template(TemplateCmd),

    /// View or edit ironlog config
    #[command(subcommand)]
    Config(ConfigCmd),
}

//
// Commands
//

#[derive(Subcommand)]
pub enum SessionCmd {
    /// Start a session from a workout template file
    #[command(visible_alias = "s")]
    Start {
        /// Path to the template TOML file
        template: String,
    },

    /// Show the active session
    #[command(visible_alias = "i")]
    Show,

    /// Edit a set in the active session - Usage: session edit EXERCISE [--set N] [--weight W] [--reps R] [--rir RIR]
    #[command(visible_alias = "e")]
    Edit {
        /// Exercise index (as shown by `session show`), id, or name
        #[arg(value_name = "EXERCISE")]
        exercise: String,

        /// Set number (defaults to the first blank set)
        #[arg(long, short = 's')]
        set: Option<usize>,

        /// Weight in kg
        #[arg(long, short = 'w')]
        weight: Option<String>,

        /// Number of reps
        #[arg(long, short = 'r')]
        reps: Option<String>,

        /// Reps in reserve
        #[arg(long)]
        rir: Option<String>,
    },

    /// Toggle a set's completion; completing starts the rest countdown
    #[command(visible_alias = "d")]
    Done {
        /// Exercise index, id, or name
        exercise: String,

        /// Set number
        set: usize,

        /// Skip the rest countdown
        #[arg(long)]
        no_timer: bool,
    },

    /// Append an empty set to an exercise
    AddSet {
        /// Exercise index, id, or name
        exercise: String,
    },

    /// Change an exercise's rest time
    Rest {
        /// Exercise index, id, or name
        exercise: String,

        /// Rest time in seconds
        seconds: u32,
    },

    /// Attach a note to an exercise
    #[command(visible_alias = "n")]
    Note {
        /// Exercise index, id, or name
        exercise: String,

        /// Free-form text
        note: String,
    },

    /// Show elapsed session time
    Timer {
        /// Keep updating once per second until interrupted
        #[arg(long, short = 'w')]
        watch: bool,
    },

    /// Put the session aside without ending it
    #[command(visible_alias = "m")]
    Minimize,

    /// Pick a minimized session back up
    #[command(visible_alias = "r")]
    Resume,

    /// Finish the session and send it to the server
    Finish,

    /// Abandon the session without saving progress
    Discard,

    /// Clear all local session state for a fresh start
    Reset,
}

#[derive(Subcommand)]
pub enum TemplateCmd {
    /// Validate and display a template file
    #[command(visible_alias = "s")]
    Show {
        /// Path to the template TOML file
        file: String,
    },
}

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Show all config keys
    List,

    /// Get the value of a key
    Get { key: String },

    /// Set or override a key
    Set { key: String, val: String },

    /// Remove a key
    Unset { key: String },
}
