use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Input;
use midi_tja::{
    convert, extract_events, render_tja, rescale_smf, ConvertOptions, GridOptions, NoteCode,
    RenderOptions, RescaleParams,
};
use midly::Smf;

#[derive(Parser)]
#[command(name = "tjacli", version, about = "MIDI to TJA chart tools")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert MIDI notes into a TJA chart
    Convert {
        /// Source MIDI file
        input: PathBuf,
        /// TJA note code to convert the MIDI notes into (0 drops notes,
        /// keeping only the timing skeleton)
        #[arg(short, long, default_value_t = '7')]
        note: char,
        /// Minimum length and gap of long notes as a fraction of a whole
        /// note, e.g. 1/192
        #[arg(short = 'g', long, value_name = "N/D", value_parser = parse_fraction)]
        long_gap: Option<(u64, u64)>,
        /// Largest number of grid cells per measure
        #[arg(long, default_value_t = 192)]
        max_resolution: u64,
        /// TITLE header value, defaults to the input file name
        #[arg(long)]
        title: Option<String>,
        /// Output path, defaults to <input>.tja
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Rewrite a MIDI file to a new tick resolution, preserving playback
    Reclock {
        /// Source MIDI file
        input: PathBuf,
        /// New pulses per quarter note (prompted when omitted)
        #[arg(long)]
        ppq: Option<u16>,
        /// BPM rate multiplier (prompted when omitted)
        #[arg(long)]
        bpmrate: Option<f64>,
        /// Output path, defaults to <input>.<ppq>tpb-<rate>xbpm.mid
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Convert {
            input,
            note,
            long_gap,
            max_resolution,
            title,
            output,
        } => run_convert(&input, note, long_gap, max_resolution, title, output),
        Command::Reclock {
            input,
            ppq,
            bpmrate,
            output,
        } => run_reclock(&input, ppq, bpmrate, output),
    }
}

fn run_convert(
    input: &Path,
    note: char,
    long_gap: Option<(u64, u64)>,
    max_resolution: u64,
    title: Option<String>,
    output: Option<PathBuf>,
) -> Result<()> {
    let code = NoteCode::new(note)?;
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let smf = Smf::parse(&bytes).with_context(|| format!("parsing {}", input.display()))?;
    let (notes, context) = extract_events(&smf)?;
    tracing::debug!(notes = notes.len(), ppq = context.ppq, "extracted events");

    // Code 0 keeps only the timing skeleton
    let notes = if note == '0' { Vec::new() } else { notes };

    let options = ConvertOptions {
        code,
        grid: GridOptions { max_resolution },
        long_gap,
        ..Default::default()
    };
    let result = convert(&notes, &context, &options)?;

    for warning in result.warnings() {
        match (warning.measure, warning.tick) {
            (Some(measure), _) => eprintln!("warning: measure {measure}: {}", warning.message),
            (None, Some(tick)) => eprintln!("warning: tick {tick}: {}", warning.message),
            _ => eprintln!("warning: {}", warning.message),
        }
    }

    let render_options = RenderOptions {
        title: title.unwrap_or_else(|| input.display().to_string()),
        comment: Some("tjacli convert".into()),
    };
    let body = render_tja(&result.value, &render_options);

    let out_path = output.unwrap_or_else(|| append_extension(input, "tja"));
    // TJA players expect a UTF-8 BOM
    let mut data = String::from("\u{feff}");
    data.push_str(&body);
    std::fs::write(&out_path, data)
        .with_context(|| format!("writing {}", out_path.display()))?;
    println!("wrote {}", out_path.display());
    Ok(())
}

fn run_reclock(
    input: &Path,
    ppq: Option<u16>,
    bpmrate: Option<f64>,
    output: Option<PathBuf>,
) -> Result<()> {
    let bytes = std::fs::read(input).with_context(|| format!("reading {}", input.display()))?;
    let mut smf = Smf::parse(&bytes).with_context(|| format!("parsing {}", input.display()))?;

    if let midly::Timing::Metrical(old) = smf.header.timing {
        println!("old ticks_per_beat: {}", old.as_int());
    }

    let new_ppq = match ppq {
        Some(value) => value,
        None => Input::<u16>::new()
            .with_prompt("enter new ticks_per_beat")
            .interact_text()
            .context("reading ticks_per_beat")?,
    };
    println!("new ticks_per_beat: {new_ppq}");

    let rate = match bpmrate {
        Some(value) => value,
        None => Input::<f64>::new()
            .with_prompt("enter bpm rate")
            .interact_text()
            .context("reading bpm rate")?,
    };

    rescale_smf(&mut smf, RescaleParams { new_ppq, rate })?;

    let out_path =
        output.unwrap_or_else(|| append_extension(input, &format!("{new_ppq}tpb-{rate}xbpm.mid")));
    let mut buf = Vec::new();
    smf.write_std(&mut buf)
        .with_context(|| format!("encoding {}", out_path.display()))?;
    std::fs::write(&out_path, buf)
        .with_context(|| format!("writing {}", out_path.display()))?;
    println!("wrote {}", out_path.display());
    Ok(())
}

/// `song.mid` + `tja` → `song.mid.tja` (the original tools append, never replace).
fn append_extension(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

fn parse_fraction(raw: &str) -> std::result::Result<(u64, u64), String> {
    let (numerator, denominator) = raw
        .split_once('/')
        .ok_or_else(|| format!("expected N/D, got {raw:?}"))?;
    let numerator: u64 = numerator
        .trim()
        .parse()
        .map_err(|_| format!("bad numerator in {raw:?}"))?;
    let denominator: u64 = denominator
        .trim()
        .parse()
        .map_err(|_| format!("bad denominator in {raw:?}"))?;
    if denominator == 0 {
        return Err("denominator must be positive".into());
    }
    Ok((numerator, denominator))
}
