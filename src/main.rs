// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use log::{error, info, warn};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use pgdump_scrubber::scrub;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogLevel {
    Error,
    Info,
    Debug,
}

impl LogLevel {
    fn as_filter(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "pgdump-scrubber",
    author,
    version,
    about = "Scrub a PostgreSQL plain-text dump using the tags found in its column comments"
)]
struct Args {
    /// Dump to read, `-` or nothing for stdin.
    infile: Option<PathBuf>,

    /// Where to write the scrubbed dump, `-` or nothing for stdout.
    outfile: Option<PathBuf>,

    /// Write log records to this file instead of stderr.
    #[arg(long, value_name = "FILE")]
    log: Option<PathBuf>,

    /// Lowest level that gets logged. RUST_LOG overrides it.
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,
}

fn is_stdio(path: &Option<PathBuf>) -> bool {
    path.as_deref().map_or(true, |path| path == Path::new("-"))
}

fn init_logging(args: &Args) -> Result<()> {
    let env = env_logger::Env::default().default_filter_or(args.log_level.as_filter());
    let mut builder = env_logger::Builder::from_env(env);

    if let Some(path) = &args.log {
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file: {:?}", path))?;
        builder
            .target(env_logger::Target::Pipe(Box::new(file)))
            .format(|buf, record| {
                if record.level() == log::Level::Error {
                    eprintln!("{}", record.args());
                }
                writeln!(
                    buf,
                    "{} [{}] {}",
                    buf.timestamp(),
                    record.level(),
                    record.args()
                )
            });
    }

    builder.init();
    Ok(())
}

fn format_elapsed(elapsed: Duration) -> String {
    let millis = elapsed.as_millis();
    let seconds = elapsed.as_secs();
    let (minutes, hours, days) = (seconds / 60, seconds / 3600, seconds / 86400);

    if seconds == 0 {
        format!("{} ms", millis)
    } else if minutes == 0 {
        format!("{}.{:03} s", seconds, millis % 1000)
    } else if hours == 0 {
        format!("{} min {} s", minutes, seconds % 60)
    } else if days == 0 {
        format!("{} h {} min", hours, minutes % 60)
    } else {
        format!("{} d {} h {} min", days, hours % 24, minutes % 60)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    let reader: Box<dyn BufRead> = if is_stdio(&args.infile) {
        Box::new(io::stdin().lock())
    } else {
        let path = args.infile.as_deref().unwrap_or_else(|| Path::new("-"));
        let file = File::open(path)
            .with_context(|| format!("Failed to open input file: {:?}", path))?;
        Box::new(BufReader::new(file))
    };

    let writer: Box<dyn Write> = if is_stdio(&args.outfile) {
        Box::new(BufWriter::new(io::stdout().lock()))
    } else {
        let path = args.outfile.as_deref().unwrap_or_else(|| Path::new("-"));
        let file = File::create(path)
            .with_context(|| format!("Failed to create output file: {:?}", path))?;
        Box::new(BufWriter::new(file))
    };

    let started = Instant::now();
    let summary = scrub(reader, writer).context("Scrub aborted")?;
    let message = format!("{} in {}.", summary, format_elapsed(started.elapsed()));

    if summary.error_count > 0 {
        error!("{}", message);
    } else if summary.warning_count > 0 {
        warn!("{}", message);
    } else {
        info!("{}", message);
    }
    if !summary.is_clean() {
        info!("Please check the log for more information.");
    }

    Ok(())
}
