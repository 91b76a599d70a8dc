use clap::Parser;
use mnemo_segment::{Fragment, Segmenter, fragment_bounds};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};

/// A CLI tool to score and segment text files into JSON output using
/// mnemo-segment.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Minimum number of fragments to produce. Defaults to richness - 2.
    #[arg(long)]
    min: Option<usize>,

    /// Maximum number of fragments to produce. Defaults to richness + 2.
    #[arg(long)]
    max: Option<usize>,
}

#[derive(Serialize)]
struct SegmentReport {
    richness: u8,
    min_fragments: usize,
    max_fragments: usize,
    fragments: Vec<Fragment>,
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    let content = if let Some(input_path) = args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let segmenter = Segmenter::new();
    let richness = segmenter.richness(&content);
    let (auto_min, auto_max) = fragment_bounds(richness);
    let min_fragments = args.min.unwrap_or(auto_min);
    let max_fragments = args.max.unwrap_or(auto_max);

    let fragments: Vec<Fragment> = segmenter
        .segment(&content, min_fragments, max_fragments)
        .into_iter()
        .enumerate()
        .map(|(sequence, text)| Fragment { sequence, text })
        .collect();

    let report = SegmentReport {
        richness,
        min_fragments,
        max_fragments,
        fragments,
    };

    let json_output = serde_json::to_string_pretty(&report)?;
    println!("{json_output}");

    Ok(())
}
