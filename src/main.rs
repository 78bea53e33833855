use std::cell::RefCell;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::process;
use std::rc::Rc;

use clap::{Parser, Subcommand};
use env_logger::Env;

use kplay::chord::Pitch;
use kplay::midi::{MidiParser, MidiSource, SmfParser};
use kplay::playback::{
    ErrorRaised, IntervalTimer, LoggingSynth, ManualClock, RecordingSynth, SystemClock, TimeUpdate, Transport,
};
use kplay::sync::{format_time, ChordView, Controls, ControlsView, KeyboardView, LyricView};
use kplay::{PlayerConfig, Session, SongData, Views};

#[derive(Parser)]
#[command(name = "kplay", about = "Headless karaoke player")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Play a song in real time, printing lyrics, chords and keys as they change
    Play {
        /// Path to a .mid file
        file: PathBuf,

        /// Lyrics and chords: a .json song file or timestamped lyric text
        #[arg(long)]
        song: Option<PathBuf>,

        /// Player configuration (YAML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Playback rate, 0.5 to 2.0
        #[arg(long)]
        rate: Option<f64>,

        /// Start position in seconds
        #[arg(long)]
        start: Option<f64>,
    },

    /// Print the parsed MIDI file as JSON
    Inspect {
        /// Path to a .mid file
        file: PathBuf,
    },

    /// Print the note triggers that playback would schedule, as JSON
    Schedule {
        /// Path to a .mid file
        file: PathBuf,

        /// Playback rate, 0.5 to 2.0
        #[arg(long, default_value_t = 1.0)]
        rate: f64,

        /// Start position in seconds
        #[arg(long, default_value_t = 0.0)]
        start: f64,
    },
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Command::Play {
            file,
            song,
            config,
            rate,
            start,
        } => play(&file, song.as_deref(), config.as_deref(), rate, start),
        Command::Inspect { file } => inspect(&file),
        Command::Schedule { file, rate, start } => schedule(&file, rate, start),
    }
}

fn play(file: &Path, song: Option<&Path>, config: Option<&Path>, rate: Option<f64>, start: Option<f64>) {
    let mut config = match config {
        Some(path) => or_exit("Configuration error", PlayerConfig::load(path)),
        None => PlayerConfig::default(),
    };
    if let Some(rate) = rate {
        config.playback_rate = rate;
    }
    let song = match song {
        Some(path) => or_exit("Song data error", SongData::load(path, config.time_unit)),
        None => SongData::default(),
    };

    let views = Views {
        lyrics: Box::new(ConsoleLyrics),
        chords: Box::new(ConsoleChords),
        keyboard: Some(Box::new(ConsoleKeys)),
        controls: Box::new(ConsoleControls),
    };
    let session = or_exit(
        "Setup error",
        Session::new(
            config,
            Rc::new(SystemClock::new()),
            Rc::new(IntervalTimer::new()),
            Box::new(LoggingSynth),
            views,
        ),
    );
    let transport = session.transport();

    let midi = or_exit("Load error", session.load_song(file, song));
    println!(
        "Playing {} ({} tracks, {})",
        file.display(),
        midi.tracks().len(),
        format_time(midi.duration())
    );

    let shown = Rc::new(RefCell::new(String::new()));
    transport.add_event_listener::<TimeUpdate>(move |e| {
        let clock = format!("{} / {}", format_time(e.current_time), format_time(e.duration));
        if *shown.borrow() != clock {
            println!("  {}", clock);
            *shown.borrow_mut() = clock;
        }
    });
    transport.add_event_listener::<ErrorRaised>(|e| eprintln!("Playback error: {}", e.message));

    if let Some(start) = start {
        or_exit("Seek error", transport.seek(start));
    }
    transport.play();
    session.run();
}

fn inspect(file: &Path) {
    let bytes = or_exit("Load error", MidiSource::from(file).read());
    let midi = or_exit("Parse error", SmfParser.parse(&bytes));
    match serde_json::to_string_pretty(&midi) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Serialization error: {}", e);
            process::exit(1);
        }
    }
}

fn schedule(file: &Path, rate: f64, start: f64) {
    let synth = RecordingSynth::new();
    let transport = Transport::new(
        Rc::new(ManualClock::new()),
        Rc::new(IntervalTimer::new()),
        Box::new(synth.clone()),
    );
    or_exit("Load error", transport.load_midi(file));
    or_exit("Rate error", transport.set_playback_rate(rate));
    or_exit("Seek error", transport.seek(start));
    transport.play();

    match serde_json::to_string_pretty(&synth.pending()) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Serialization error: {}", e);
            process::exit(1);
        }
    }
}

fn or_exit<T, E: Display>(context: &str, result: Result<T, E>) -> T {
    result.unwrap_or_else(|e| {
        eprintln!("{}: {}", context, e);
        process::exit(1);
    })
}

struct ConsoleLyrics;

impl LyricView for ConsoleLyrics {
    fn highlight_line(&mut self, _index: Option<usize>, text: Option<&str>) {
        if let Some(text) = text {
            println!("♪ {}", text);
        }
    }
}

struct ConsoleChords;

impl ChordView for ConsoleChords {
    fn show_chord(&mut self, _index: Option<usize>, name: Option<&str>) {
        if let Some(name) = name {
            println!("[{}]", name);
        }
    }
}

struct ConsoleKeys;

impl KeyboardView for ConsoleKeys {
    fn highlight_keys(&mut self, keys: &[Pitch]) {
        if !keys.is_empty() {
            let names: Vec<String> = keys.iter().map(|k| k.to_string()).collect();
            println!("  keys: {}", names.join(" "));
        }
    }
}

struct ConsoleControls;

impl ControlsView for ConsoleControls {
    fn set_controls(&mut self, controls: Controls) {
        log::debug!(
            "Controls: play={} pause={} stop={}",
            controls.play_enabled,
            controls.pause_enabled,
            controls.stop_enabled
        );
    }
}
