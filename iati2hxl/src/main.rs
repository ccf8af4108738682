//! iati2hxl CLI - Convert IATI activity reports to HXL-tagged CSV
//!
//! ```bash
//! iati2hxl https://example.org/activities.xml          # CSV to stdout
//! iati2hxl a.xml b.xml --single-header -o out.csv      # one frontmatter, to a file
//! curl -s "$URL" | iati2hxl -                          # from stdin
//! iati2hxl --list-columns                              # show the column layout
//! ```

use clap::Parser;
use iati2hxl::logs::{log_error, log_info, set_log_format, LogFormat};
use iati2hxl::{
    convert_source, output_spec, CodeTables, ConvertError, ConvertOptions, Fetcher, Source,
};
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "iati2hxl")]
#[command(version, about = "Convert IATI activity XML to HXL-tagged CSV", long_about = None)]
struct Cli {
    /// IATI sources: http(s) URLs, file paths, or - for stdin
    #[arg(required_unless_present = "list_columns", value_parser = Source::parse)]
    sources: Vec<Source>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON file with code table overrides
    #[arg(long)]
    codes: Option<PathBuf>,

    /// Write header and hashtag rows only once, before the first source
    #[arg(long)]
    single_header: bool,

    /// Continue with the remaining sources after a failure
    #[arg(long)]
    keep_going: bool,

    /// Print the column layout and exit
    #[arg(long)]
    list_columns: bool,

    /// No progress output
    #[arg(short, long, conflicts_with = "log_json")]
    quiet: bool,

    /// Progress output as JSON lines
    #[arg(long)]
    log_json: bool,
}

fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    set_log_format(if cli.quiet {
        LogFormat::Silent
    } else if cli.log_json {
        LogFormat::Json
    } else {
        LogFormat::Human
    });

    let result = if cli.list_columns {
        cmd_list_columns()
    } else {
        cmd_convert(&cli)
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn cmd_list_columns() -> Result<(), Box<dyn std::error::Error>> {
    let mut out = io::stdout().lock();
    for rule in output_spec() {
        let source = match &rule.attribute {
            Some(attr) => format!("{}/@{}", rule.locator, attr),
            None => rule.locator.to_string(),
        };
        let codes = rule
            .code_list
            .map(|list| match rule.key_prefix_length {
                Some(n) => format!("{} (first {} chars)", list, n),
                None => list.to_string(),
            })
            .unwrap_or_default();
        writeln!(
            out,
            "{:<20} {:<28} {:>2}  {:<40} {}",
            rule.header,
            rule.tag,
            rule.width(),
            source,
            codes
        )?;
    }
    Ok(())
}

fn cmd_convert(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let codes = match &cli.codes {
        Some(path) => {
            log_info(format!("📋 Loading code table overrides: {}", path.display()));
            CodeTables::with_overrides_file(path)?
        }
        None => CodeTables::builtin(),
    };

    let fetcher = Fetcher::from_env()?;

    let sink: Box<dyn Write> = match &cli.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };
    let mut writer = csv::Writer::from_writer(sink);

    let mut frontmatter_written = false;
    let mut failures = 0;

    for source in &cli.sources {
        let options = ConvertOptions {
            include_frontmatter: !(cli.single_header && frontmatter_written),
        };

        let result = convert_source(source, &fetcher, &mut writer, &codes, &options);

        // Frontmatter precedes parsing, so a parse failure has written it too
        if matches!(result, Ok(_) | Err(ConvertError::Parse(_))) {
            frontmatter_written = true;
        }

        match result {
            Ok(_) => {}
            Err(e) if cli.keep_going => {
                log_error(format!("{}: {}", source, e));
                failures += 1;
            }
            Err(e) => return Err(format!("{}: {}", source, e).into()),
        }
    }

    if failures > 0 {
        return Err(format!("{} of {} sources failed", failures, cli.sources.len()).into());
    }

    if let Some(path) = &cli.output {
        log_info(format!("💾 Output written to: {}", path.display()));
    }
    Ok(())
}
