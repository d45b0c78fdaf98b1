//! chordsmith: headless chord progression workbench

mod args;
mod config;

use std::io::BufRead;
use std::time::Duration;

use anyhow::{bail, Context};
use args::{Command, PlayOptions, USAGE};
use chordsmith_core::{
    resolve_sequence, ArpeggioSettings, Block, PlaybackEvent, SchedulerConfig, SequenceStep, Tempo,
    Tonality, Track,
};
use chordsmith_services::{JsonStore, LogInstrument, LogMetronome, PlaybackEngine};
use config::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("chordsmith=info".parse()?)
            .add_directive("chordsmith_core=info".parse()?)
            .add_directive("chordsmith_services=info".parse()?))
        .init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let command = args::parse(&argv).with_context(|| format!("\n{USAGE}"))?;
    let config = config::load_config();

    match command {
        Command::Help => println!("{USAGE}"),
        Command::Chords { key, sevenths } => print_chords(&Tonality::parse(&key)?, sevenths),
        Command::Play { key, chords, options } => {
            let tonality = Tonality::parse(&key)?;
            let steps = args::parse_steps(&tonality, &chords)?;
            play(&config, &options, &steps)?;
        }
        Command::Export { key, chords, tempo, json } => {
            let tonality = Tonality::parse(&key)?;
            let steps = args::parse_steps(&tonality, &chords)?;
            let tempo = match tempo {
                Some(bpm) => Tempo::new(bpm)?,
                None => config.tempo(),
            };
            let resolved = resolve_sequence(&steps, &tonality, tempo);
            if json {
                println!("{}", serde_json::to_string_pretty(&resolved)?);
            } else {
                print!("{}", resolved.to_text());
            }
        }
        Command::Save { key, name, chords } => {
            let tonality = Tonality::parse(&key)?;
            let steps = args::parse_steps(&tonality, &chords)?;
            save_block(&config, tonality, name, steps)?;
        }
        Command::Track { options } => {
            let store = JsonStore::<Vec<Block>>::project(config.data_dir.as_deref())?;
            let Some(blocks) = store.load()? else {
                bail!("No saved project at {}", store.path().display());
            };
            let track = Track::from_blocks(blocks);
            for block in track.blocks().iter().filter(|b| !b.is_empty()) {
                println!("[{}]", block.name);
                print!("{}", resolve_sequence(&block.steps, &block.tonality, config.tempo()).to_text());
            }
            play(&config, &options, &track.flatten())?;
        }
        Command::Config { init } => {
            if init {
                let path = config::save_config(&config)?;
                println!("Wrote {}", path.display());
            } else {
                println!("# {}", config::config_path().display());
                print!("{}", toml::to_string_pretty(&config)?);
            }
        }
    }
    Ok(())
}

fn print_chords(tonality: &Tonality, sevenths: bool) {
    println!("{tonality}");
    for d in tonality.diatonic_chords() {
        let (chord, numeral) = if sevenths {
            (d.seventh_chord(), &d.seventh_numeral)
        } else {
            (d.chord(), &d.roman_numeral)
        };
        let notes: Vec<String> = chord.notes().iter().map(|p| p.to_string()).collect();
        println!(
            "  {}  {:<6} {:<8} {}  {}",
            d.degree,
            numeral,
            chord.symbol(),
            d.function.short(),
            notes.join(" ")
        );
    }
}

fn play(config: &AppConfig, options: &PlayOptions, steps: &[SequenceStep]) -> anyhow::Result<()> {
    let settings_store = JsonStore::<ArpeggioSettings>::settings(config.data_dir.as_deref())?;
    let mut settings = settings_store.load_or_default()?;
    if let Some(pattern) = options.arp {
        settings.pattern = pattern;
    }
    if let Some(octaves) = options.octaves {
        settings.octave_range = octaves;
    }
    let settings = settings.normalized();

    let mut engine = PlaybackEngine::spawn(LogInstrument::new(), LogMetronome, SchedulerConfig::default())?;
    let tempo = options.tempo.map(Tempo::clamped).transpose()?.unwrap_or_else(|| config.tempo());
    engine.set_tempo(tempo.bpm())?;
    engine.set_arpeggio_settings(settings)?;
    engine.set_arpeggiator_enabled(options.arp.is_some() || config.arpeggiate)?;
    engine.set_metronome_enabled(options.metronome || config.metronome)?;

    let events = engine.events();
    engine.play(steps, options.looping)?;

    if options.looping {
        println!("Looping at {} BPM. Press Enter to stop.", tempo.bpm());
        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        engine.stop()?;
    } else {
        let total_ms: f64 = steps
            .iter()
            .filter(|s| !s.is_boundary())
            .map(|s| tempo.playable_step_ms(s.duration()))
            .sum();
        let deadline = Duration::from_millis(total_ms as u64 + 1000);
        loop {
            match events.recv_timeout(deadline) {
                Ok(PlaybackEvent::StepStarted { index, step }) => match step.as_chord() {
                    Some(chord) => println!("{:>3}  {}", index + 1, chord),
                    None if step.is_boundary() => println!("     |"),
                    None => println!("{:>3}  %", index + 1),
                },
                Ok(PlaybackEvent::PlaybackStopped) => break,
                Err(_) => bail!("Playback did not finish in time"),
            }
        }
    }

    engine.shutdown();
    Ok(())
}

fn save_block(
    config: &AppConfig,
    tonality: Tonality,
    name: String,
    steps: Vec<SequenceStep>,
) -> anyhow::Result<()> {
    let store = JsonStore::<Vec<Block>>::project(config.data_dir.as_deref())?;
    let mut track = match store.load()? {
        Some(blocks) if !blocks.is_empty() => Track::from_blocks(blocks),
        _ => Track::new(tonality),
    };

    // A fresh track starts with one empty block; fill that instead of adding
    let id = if track.blocks().len() == 1 && track.current().is_empty() {
        let id = track.current_id();
        track.rename(id, name.as_str())?;
        track.current_mut().tonality = tonality;
        id
    } else {
        track.add_block(name.as_str(), tonality)
    };
    if let Some(block) = track.block_mut(id) {
        block.steps.extend(steps);
    }

    store.save(&track.blocks().to_vec())?;
    println!("Saved \"{name}\" ({} blocks) to {}", track.blocks().len(), store.path().display());
    Ok(())
}
