mod config;
mod engine;
mod error;
mod generator;
mod note;
mod parser;
mod repl;
mod scheduler;
mod stats;
mod synth;

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use config::Settings;
use error::Result;
use note::{ClefType, Difficulty, GameMode, MetronomeSpeed, NoteNotation, RoundLength};
use stats::{JsonFileStore, MemoryStore, StatsAggregator, StatsStore};

#[derive(Parser)]
#[command(name = "staffdrill", about = "Sight-reading trainer: name the note on the staff")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Settings file (default: ~/.config/staffdrill/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Start a game (the default when no command is given)
    Play(PlayArgs),

    /// Show practice statistics
    Stats,

    /// Erase all practice statistics
    ResetStats {
        /// Confirm the reset
        #[arg(long)]
        yes: bool,
    },

    /// Create a default settings file
    Init,

    /// Show the settings file path
    ConfigPath,
}

#[derive(clap::Args, Default)]
struct PlayArgs {
    /// practice, timed or streak
    #[arg(short, long)]
    mode: Option<GameMode>,

    /// 1 (staff lines only) to 5 (three ledger lines)
    #[arg(short, long)]
    difficulty: Option<Difficulty>,

    /// treble, bass or random
    #[arg(long)]
    clef: Option<ClefType>,

    /// Notes per round: 4, 8 or 12
    #[arg(short, long)]
    length: Option<RoundLength>,

    /// Only ask these notes, e.g. "do,mi,sol" or "C,E,G"
    #[arg(short, long)]
    notes: Option<String>,

    /// Run the metronome at this tempo (60, 90, 120 or 150)
    #[arg(long)]
    metronome: Option<MetronomeSpeed>,

    /// Start with the metronome off
    #[arg(long, conflicts_with = "metronome")]
    no_metronome: bool,

    /// Start with sound off
    #[arg(long)]
    mute: bool,

    /// solfege or letter
    #[arg(long)]
    notation: Option<NoteNotation>,

    /// Remember these options as the new defaults
    #[arg(long)]
    save: bool,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config {
        Some(path) => path,
        None => Settings::config_path()?,
    };

    match cli.command.unwrap_or(Command::Play(PlayArgs::default())) {
        Command::Play(args) => {
            let settings = play_settings(&config_path, &args)?;
            repl::run(
                settings.to_session_config(),
                settings.display.notation,
                settings.audio.muted,
                &mut open_stats(),
            )
        }
        Command::Stats => {
            let notation = Settings::load_or_default(&config_path)?.display.notation;
            print_stats(&open_stats(), notation);
            Ok(())
        }
        Command::ResetStats { yes } => {
            if !yes {
                println!("This erases all practice history. Run again with --yes to confirm.");
                return Ok(());
            }
            open_stats().reset_all_stats();
            println!("Statistics cleared.");
            Ok(())
        }
        Command::Init => {
            Settings::create_default_config_file(&config_path)?;
            println!("Created default config at: {}", config_path.display());
            Ok(())
        }
        Command::ConfigPath => {
            println!("{}", config_path.display());
            Ok(())
        }
    }
}

/// Settings file merged with the command line, written back with `--save`
fn play_settings(path: &Path, args: &PlayArgs) -> Result<Settings> {
    let settings = apply_overrides(Settings::load_or_default(path)?, args)?;
    if args.save {
        settings.save_to(path)?;
        log::info!("saved settings to {}", path.display());
    }
    Ok(settings)
}

fn apply_overrides(mut settings: Settings, args: &PlayArgs) -> Result<Settings> {
    if let Some(mode) = args.mode {
        settings.game.mode = mode;
    }
    if let Some(difficulty) = args.difficulty {
        settings.game.difficulty = difficulty;
    }
    if let Some(clef) = args.clef {
        settings.game.clef = clef;
    }
    if let Some(length) = args.length {
        settings.game.round_length = length;
    }
    if let Some(notes) = &args.notes {
        settings.game.allowed_notes = parser::parse_note_list(notes)?;
    }
    if let Some(speed) = args.metronome {
        settings.metronome.enabled = true;
        settings.metronome.bpm = speed;
    }
    if args.no_metronome {
        settings.metronome.enabled = false;
    }
    if args.mute {
        settings.audio.muted = true;
    }
    if let Some(notation) = args.notation {
        settings.display.notation = notation;
    }
    Ok(settings)
}

/// Open the persistent stats, or in-memory ones when there is no data directory
fn open_stats() -> StatsAggregator<Box<dyn StatsStore>> {
    let store: Box<dyn StatsStore> = match JsonFileStore::open_default() {
        Ok(store) => {
            log::debug!("stats stored in {}", store.dir().display());
            Box::new(store)
        }
        Err(e) => {
            log::warn!("stats will not be saved: {}", e);
            Box::new(MemoryStore::default())
        }
    };
    StatsAggregator::load(store)
}

fn print_stats<S: StatsStore>(stats: &StatsAggregator<S>, notation: NoteNotation) {
    println!("Today");
    match stats.today_stats() {
        Some(today) => println!(
            "  {} notes, {} correct ({:.0}%), {} practiced",
            today.total_notes,
            today.correct_notes,
            today.accuracy(),
            format_duration(today.practice_time_seconds)
        ),
        None => println!("  nothing yet"),
    }
    println!();

    println!("Last 7 days");
    for day in stats.last_7_days_stats() {
        let bar = "#".repeat((day.total_notes as usize).div_ceil(5).min(40));
        println!(
            "  {}  {:>4} notes {:>4.0}%  {}",
            day.date.format("%a %d %b"),
            day.total_notes,
            day.accuracy(),
            bar
        );
    }
    println!();

    println!("All time");
    println!(
        "  {} notes, {} correct ({:.1}%)",
        stats.total_notes_all_time(),
        stats.total_correct_all_time(),
        stats.overall_accuracy()
    );
    println!("  {} practiced", format_duration(stats.total_practice_time()));

    let weak = stats.weak_notes();
    let strong = stats.strong_notes();
    if weak.is_empty() {
        println!("  (answer each note 5 times to see weak and strong notes)");
        return;
    }
    let describe = |notes: &[stats::NoteStats]| {
        notes
            .iter()
            .map(|n| format!("{} {:.0}%", n.note_name.display_name(notation), n.accuracy()))
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!("  Needs work: {}", describe(&weak));
    println!("  Strongest:  {}", describe(&strong));
}

fn format_duration(seconds: u64) -> String {
    let (h, m, s) = (seconds / 3600, (seconds / 60) % 60, seconds % 60);
    if h > 0 {
        format!("{}h {:02}m", h, m)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0s");
        assert_eq!(format_duration(75), "1m 15s");
        assert_eq!(format_duration(3 * 3600 + 5 * 60 + 9), "3h 05m");
    }

    #[test]
    fn test_cli_overrides_settings() {
        let cli = Cli::parse_from([
            "staffdrill", "play", "--mode", "streak", "-d", "4", "--clef", "bass", "--notes",
            "do,G", "--metronome", "120",
        ]);
        let Some(Command::Play(args)) = cli.command else {
            panic!("expected play");
        };
        let settings = apply_overrides(Settings::default(), &args).unwrap();
        assert_eq!(settings.game.mode, GameMode::Streak);
        assert_eq!(settings.game.difficulty, Difficulty::Hard);
        assert_eq!(settings.game.clef, ClefType::Bass);
        assert_eq!(
            settings.game.allowed_notes,
            vec![note::NoteName::Do, note::NoteName::Sol]
        );
        assert!(settings.metronome.enabled);
        assert_eq!(settings.metronome.bpm, MetronomeSpeed::Medium);
        assert_eq!(settings.game.round_length, RoundLength::Short);
    }

    #[test]
    fn test_cli_rejects_bad_values() {
        assert!(Cli::try_parse_from(["staffdrill", "play", "-d", "7"]).is_err());
        assert!(Cli::try_parse_from(["staffdrill", "play", "--length", "5"]).is_err());
        assert!(
            Cli::try_parse_from(["staffdrill", "play", "--metronome", "90", "--no-metronome"])
                .is_err()
        );
    }

    #[test]
    fn test_save_writes_to_the_given_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        let cli = Cli::parse_from([
            "staffdrill",
            "--config",
            path.to_str().unwrap(),
            "play",
            "--mode",
            "timed",
            "--notation",
            "letter",
            "--save",
        ]);
        let Some(Command::Play(args)) = cli.command else {
            panic!("expected play");
        };
        let config_path = cli.config.unwrap();
        assert_eq!(config_path, path);

        let settings = play_settings(&config_path, &args).unwrap();
        let saved = Settings::load_from(&path).unwrap();
        assert_eq!(saved, settings);
        assert_eq!(saved.game.mode, GameMode::TimedChallenge);
        assert_eq!(saved.display.notation, NoteNotation::Letter);

        // a later run without flags picks the saved values up
        let again = play_settings(&path, &PlayArgs::default()).unwrap();
        assert_eq!(again.game.mode, GameMode::TimedChallenge);
    }

    #[test]
    fn test_play_without_save_leaves_config_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        let args = PlayArgs {
            mute: true,
            ..PlayArgs::default()
        };
        let settings = play_settings(&path, &args).unwrap();
        assert!(settings.audio.muted);
        assert!(!path.exists());
    }

    #[test]
    fn test_no_command_means_play() {
        let cli = Cli::parse_from(["staffdrill"]);
        assert!(cli.command.is_none());
    }
}
