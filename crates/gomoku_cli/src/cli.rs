//! Command-line interface for the gomoku client.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use gomoku_session::{AutoPlaySpeed, Player};

/// Gomoku - terminal client for an engine-hosted gomoku game
#[derive(Parser, Debug)]
#[command(name = "gomoku")]
#[command(about = "Play, watch and calibrate gomoku against an engine host", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML client configuration
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Engine host URL, overriding config and environment
    #[arg(long, global = true)]
    pub engine_url: Option<String>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Colour chosen by the human player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Color {
    /// Play black and move first
    Black,
    /// Play white and let the engine open
    White,
}

impl From<Color> for Player {
    fn from(color: Color) -> Self {
        match color {
            Color::Black => Player::B,
            Color::White => Player::W,
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Play an interactive game against the engine
    Play {
        /// Colour to play
        #[arg(long, value_enum, default_value = "black")]
        color: Color,

        /// Two humans share the board instead
        #[arg(long)]
        hot_seat: bool,
    },

    /// Watch two engine profiles play each other
    Watch {
        /// Profile playing black
        #[arg(long)]
        black: String,

        /// Profile playing white
        #[arg(long)]
        white: String,

        /// Step speed (slow, medium, fast); defaults to the configured speed
        #[arg(long)]
        speed: Option<AutoPlaySpeed>,
    },

    /// Run a self-play calibration and follow its progress
    SelfPlay {
        /// Games per profile pairing
        #[arg(long)]
        games_per_pair: Option<u32>,

        /// Games run concurrently by the engine
        #[arg(long)]
        parallelism: Option<u32>,

        /// Lowest heuristic level
        #[arg(long)]
        min_level: Option<u8>,

        /// Highest heuristic level
        #[arg(long)]
        max_level: Option<u8>,

        /// Include every language-model profile with a stored key
        #[arg(long)]
        include_llm: bool,
    },

    /// Show the ratings table
    Ratings {
        /// Make this profile the opponent for human games
        #[arg(long)]
        activate: Option<String>,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// List or manage local users
    Users {
        /// Create a user with this name
        #[arg(long)]
        create: Option<String>,

        /// Switch to the user with this id
        #[arg(long)]
        switch: Option<String>,
    },
}
