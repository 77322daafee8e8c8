//! PDF Stream Decoder
//!
//! Decodes a file of raw stream bytes through a chain of PDF filters.
//!
//! Usage:
//!   cargo run --bin pdf_decode -- raw.bin --filter FlateDecode
//!   cargo run --bin pdf_decode -- raw.bin --filter AHx --filter Fl --output page.txt
//!   cargo run --bin pdf_decode -- raw.bin --filter Fl --params '{"Predictor": 12, "Columns": 5}'
//!   cargo run --bin pdf_decode -- raw.bin --filter Fl --lenient --max-size 1048576
//!   cargo run --bin pdf_decode -- fax.bin --filter CCF --params '{"K": -1, "Columns": 2480}'
//!
//! `--params` applies to the last filter. Set RUST_LOG=debug to trace the chain.

use pdf_stream_filters::{
    decode_stream_with_specs, CcittParams, DecodeOptions, DecodeParams, Error, FilterSpec, Result,
};
use std::fs;
use std::io::Write;
use std::path::PathBuf;

struct DecodeConfig {
    input: PathBuf,
    output: Option<PathBuf>,
    filters: Vec<String>,
    params: Option<DecodeParams>,
    ccitt: Option<CcittParams>,
    options: DecodeOptions,
}

const USAGE: &str = "usage: pdf_decode INPUT [--filter NAME]... [--params JSON] [--lenient] \
                     [--max-size BYTES] [--output PATH]";

impl DecodeConfig {
    fn from_args() -> std::result::Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();
        let mut input = None;
        let mut output = None;
        let mut filters = Vec::new();
        let mut params = None;
        let mut ccitt = None;
        let mut options = DecodeOptions::strict();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--filter" | "-f" => {
                    i += 1;
                    let name = args.get(i).ok_or("--filter needs a filter name")?;
                    filters.push(name.clone());
                },
                "--params" => {
                    i += 1;
                    let json = args.get(i).ok_or("--params needs a JSON object")?;
                    let value: serde_json::Value = serde_json::from_str(json)
                        .map_err(|e| format!("invalid --params: {}", e))?;
                    let parsed: DecodeParams = serde_json::from_value(value.clone())
                        .map_err(|e| format!("invalid --params: {}", e))?;
                    let fax: CcittParams = serde_json::from_value(value)
                        .map_err(|e| format!("invalid --params: {}", e))?;
                    params = Some(parsed);
                    ccitt = Some(fax);
                },
                "--lenient" => {
                    options = options.with_strict(false);
                },
                "--max-size" => {
                    i += 1;
                    let size = args
                        .get(i)
                        .and_then(|s| s.parse::<usize>().ok())
                        .ok_or("--max-size needs a byte count")?;
                    options = options.with_max_decompressed_size(size);
                },
                "--output" | "-o" => {
                    i += 1;
                    let path = args.get(i).ok_or("--output needs a path")?;
                    output = Some(PathBuf::from(path));
                },
                "--help" | "-h" => return Err(USAGE.to_string()),
                other if other.starts_with('-') => {
                    return Err(format!("unknown option {}\n{}", other, USAGE));
                },
                other => {
                    input = Some(PathBuf::from(other));
                },
            }
            i += 1;
        }

        Ok(Self {
            input: input.ok_or_else(|| USAGE.to_string())?,
            output,
            filters,
            params,
            ccitt,
            options,
        })
    }
}

fn run(config: &DecodeConfig) -> Result<usize> {
    let data = fs::read(&config.input)?;
    log::debug!(
        "Decoding {} ({} bytes) through {:?}",
        config.input.display(),
        data.len(),
        config.filters
    );

    let last = config.filters.len().saturating_sub(1);
    let mut specs = Vec::with_capacity(config.filters.len());
    for (i, name) in config.filters.iter().enumerate() {
        let mut spec = FilterSpec::from_name(name, None)?;
        if i == last {
            spec.params = config.params.clone();
            spec.ccitt = config.ccitt.clone();
        }
        specs.push(spec);
    }

    let decoded = decode_stream_with_specs(&data, &specs, Some(&config.options))?;

    match &config.output {
        Some(path) => fs::write(path, &decoded)?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&decoded)?;
            stdout.flush()?;
        },
    }
    Ok(decoded.len())
}

fn main() {
    env_logger::init();

    let config = match DecodeConfig::from_args() {
        Ok(config) => config,
        Err(message) => {
            eprintln!("{}", message);
            std::process::exit(2);
        },
    };

    match run(&config) {
        Ok(size) => {
            if let Some(path) = &config.output {
                eprintln!("Wrote {} bytes to {}", size, path.display());
            }
        },
        Err(Error::UnsupportedFilter(name)) => {
            eprintln!("Unsupported filter: {}", name);
            std::process::exit(2);
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        },
    }
}
