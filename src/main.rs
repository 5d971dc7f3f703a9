use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

use snipcycle::{
    commands,
    config::{Mode, ThemeMode},
    logging::init_logging,
    paths::Paths,
    sink::SinkKind,
    snippet::{Direction, ProfileKind},
    ui::{ColorMode, Ui},
};

#[derive(Parser)]
#[command(name = "snipcycle")]
#[command(about = "Snippet rotator - paste saved texts in rotation or pick them from folders")]
#[command(version)]
struct Cli {
    /// Use this config file instead of ~/.snipcycle/config.json
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// When to use colors: always, auto, never
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: ColorMode,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List a profile's items
    List {
        #[arg(long, value_name = "PROFILE")]
        profile: Option<ProfileKind>,

        /// Show every text in rotation order, folders expanded
        #[arg(long)]
        flat: bool,
    },

    /// Add a text at the end of a profile
    Add {
        text: String,

        #[arg(long, value_name = "PROFILE")]
        profile: Option<ProfileKind>,
    },

    /// Add an empty folder at the end of a profile
    AddFolder {
        name: String,

        #[arg(long, value_name = "PROFILE")]
        profile: Option<ProfileKind>,
    },

    /// Remove an item (a folder goes with everything in it)
    Remove {
        /// Position as shown by `list`
        position: usize,

        #[arg(long, value_name = "PROFILE")]
        profile: Option<ProfileKind>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Swap an item with its neighbour
    Move {
        position: usize,

        /// up or down
        direction: Direction,

        #[arg(long, value_name = "PROFILE")]
        profile: Option<ProfileKind>,
    },

    /// Replace the content of a text
    Edit {
        position: usize,
        text: String,

        #[arg(long, value_name = "PROFILE")]
        profile: Option<ProfileKind>,
    },

    /// Work with the contents of a folder
    Folder {
        #[command(subcommand)]
        command: FolderCommands,

        #[arg(long, global = true, value_name = "PROFILE")]
        profile: Option<ProfileKind>,
    },

    /// Show or switch the dispatch mode (rotation or popup)
    Mode { mode: Option<Mode> },

    /// Show or set the hotkey, e.g. ctrl+shift+v
    Hotkey { combo: Option<String> },

    /// Show or set the theme preference (light, dark, auto)
    Theme { theme: Option<ThemeMode> },

    /// Show settings, profile sizes and daemon state
    Status,

    /// Serve triggers until stopped
    Run {
        /// Where selected texts go: stdout, or clipboard when built with it
        #[arg(long, value_name = "SINK", default_value = "stdout")]
        sink: SinkKind,
    },

    /// Fire one trigger at the running daemon (bind this to your hotkey)
    Trigger,

    /// Stop the running daemon
    Stop,

    /// Print shell completions
    Completions { shell: Shell },
}

#[derive(Subcommand)]
enum FolderCommands {
    /// List the items of a folder
    List { folder: usize },

    /// Add a text at the end of a folder
    Add { folder: usize, text: String },

    /// Remove an item from a folder
    Remove {
        folder: usize,
        position: usize,

        #[arg(short, long)]
        force: bool,
    },

    /// Swap an item in a folder with its neighbour
    Move {
        folder: usize,
        position: usize,
        direction: Direction,
    },

    /// Replace the content of a text in a folder
    Edit {
        folder: usize,
        position: usize,
        text: String,
    },

    /// Rename a folder
    Rename { folder: usize, name: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let mut paths = Paths::new()?;
    if let Some(config) = cli.config {
        paths = paths.with_config_file(config);
    }
    let ui = Ui::new(cli.color, cli.no_color);

    match cli.command {
        Commands::List { profile, flat } => commands::list(&paths, profile, flat, &ui),
        Commands::Add { text, profile } => commands::add(&paths, profile, &text, &ui),
        Commands::AddFolder { name, profile } => commands::add_folder(&paths, profile, &name, &ui),
        Commands::Remove {
            position,
            profile,
            force,
        } => commands::remove(&paths, profile, position, force, &ui),
        Commands::Move {
            position,
            direction,
            profile,
        } => commands::move_item(&paths, profile, position, direction, &ui),
        Commands::Edit {
            position,
            text,
            profile,
        } => commands::edit(&paths, profile, position, &text, &ui),
        Commands::Folder { command, profile } => match command {
            FolderCommands::List { folder } => commands::folder_list(&paths, profile, folder, &ui),
            FolderCommands::Add { folder, text } => {
                commands::folder_add(&paths, profile, folder, &text, &ui)
            }
            FolderCommands::Remove {
                folder,
                position,
                force,
            } => commands::folder_remove(&paths, profile, folder, position, force, &ui),
            FolderCommands::Move {
                folder,
                position,
                direction,
            } => commands::folder_move(&paths, profile, folder, position, direction, &ui),
            FolderCommands::Edit {
                folder,
                position,
                text,
            } => commands::folder_edit(&paths, profile, folder, position, &text, &ui),
            FolderCommands::Rename { folder, name } => {
                commands::folder_rename(&paths, profile, folder, &name, &ui)
            }
        },
        Commands::Mode { mode } => commands::mode(&paths, mode, &ui),
        Commands::Hotkey { combo } => commands::hotkey(&paths, combo.as_deref(), &ui),
        Commands::Theme { theme } => commands::theme(&paths, theme, &ui),
        Commands::Status => commands::status(&paths, &ui),
        Commands::Run { sink } => commands::run(&paths, sink, &ui),
        Commands::Trigger => commands::trigger(&paths),
        Commands::Stop => commands::stop(&paths, &ui),
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "snipcycle", &mut std::io::stdout());
            Ok(())
        }
    }
}
