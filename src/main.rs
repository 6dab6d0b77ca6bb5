use clap::{ArgAction, Parser};
use log::LevelFilter;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;

use layerbomb::{
    build_bomb,
    io_utils::{bomb_cli_error, io_cli_error, simple_cli_error},
    plan::parse_count,
    BombConfig, Directive, EncodingSpec, PlanBuilder,
};

/// Build a layered compression bomb.
///
/// Directives are applied in order, e.g.
/// `layerbomb -e gzip,gzip -s 1e12 text:<html> fill:0x20 file:tail.html`.
#[derive(Parser)]
#[command(name = "layerbomb", version)]
struct Args {
    /// Content codings in application order, e.g. "gzip, deflate"
    #[arg(short, long)]
    encodings: String,
    /// Count for fill and tile directives without their own: N, AeB or A^B
    #[arg(short, long, default_value = "1e9")]
    size: String,
    /// Output file; stdout when omitted
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// gzip MTIME field
    #[arg(long)]
    mtime: Option<u32>,
    /// gzip FNAME field
    #[arg(long)]
    name: Option<String>,
    /// Largest final output to write, in bytes
    #[arg(long)]
    max_output: Option<usize>,
    /// Print per-layer statistics as JSON on stderr
    #[arg(long)]
    json: bool,
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Content directives: file:PATH, text:STR, hex:HEX, fill:BYTE[*COUNT], tile:STR
    #[arg(required = true)]
    directives: Vec<String>,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        _ => LevelFilter::Debug,
    };
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    builder.parse_default_env();
    builder.format(|buf, record| writeln!(buf, "[{}] {}", record.level(), record.args()));
    let _ = builder.try_init();
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.verbose);
    let start_time = Instant::now();

    let spec: EncodingSpec = args
        .encodings
        .parse()
        .map_err(|e| bomb_cli_error("parsing encodings", e))?;
    let bomb_size = parse_count(&args.size).map_err(|e| bomb_cli_error("parsing size", e))?;

    let mut config = match &args.config {
        Some(path) => BombConfig::load(path).map_err(|e| bomb_cli_error("loading config", e))?,
        None => BombConfig::default(),
    };
    if let Some(mtime) = args.mtime {
        config.header.mtime = mtime;
    }
    if let Some(name) = args.name {
        config.header.file_name = Some(name);
    }
    if let Some(max_output) = args.max_output {
        config.max_output_len = max_output;
    }

    let mut builder = PlanBuilder::new(bomb_size).with_literal_limit(config.max_literal_len);
    for raw in &args.directives {
        let directive: Directive = raw
            .parse()
            .map_err(|e| bomb_cli_error(&format!("directive '{raw}'"), e))?;
        builder
            .apply(directive)
            .map_err(|e| bomb_cli_error(&format!("directive '{raw}'"), e))?;
    }
    let plan = builder.build();
    if plan.is_empty() {
        let msg = "nothing to encode: the directives produced no content";
        return Err(simple_cli_error(msg).into());
    }

    let bomb = build_bomb(plan, &spec, &config).map_err(|e| bomb_cli_error("building bomb", e))?;

    match &args.output {
        Some(path) => {
            fs::write(path, bomb.bytes())
                .map_err(|e| io_cli_error("writing output file", path, e))?
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(bomb.bytes())
                .and_then(|_| stdout.flush())
                .map_err(|e| simple_cli_error(&format!("writing to stdout failed: {e}")))?;
        }
    }

    if args.json {
        let report = serde_json::json!({
            "encodings": spec.to_string(),
            "decoded_bytes": bomb.decoded_len().to_string(),
            "emitted_bytes": bomb.bytes().len(),
            "elapsed_ms": start_time.elapsed().as_millis() as u64,
            "layers": bomb.layers(),
        });
        eprintln!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        log::info!(
            "wrote {} bytes decoding to {} bytes in {:.2?}",
            bomb.bytes().len(),
            bomb.decoded_len(),
            start_time.elapsed()
        );
    }
    Ok(())
}
