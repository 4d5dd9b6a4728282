use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use clap::Parser;
use color_eyre::eyre::{bail, WrapErr};
use log::{info, warn};

use bubble_rs::bubble::Bubble;
use bubble_rs::config::{Config, Strategy};
use bubble_rs::net::Network;
use bubble_rs::parse::parse_prs_into;
use bubble_rs::rule::RuleSet;
use bubble_rs::variable::VariableSet;

#[derive(Debug, Parser)]
#[command(author, version, about = "Bubble reshuffling of production rule sets")]
struct Cli {
    /// Input production rule sets (*.prs).
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// Output file.
    #[arg(short, value_name = "FILE", default_value = "bubble.prs")]
    output: PathBuf,

    /// Render every step as `step<N>.<FORMAT>` (dot, png, svg, ...).
    #[arg(short, long, value_name = "FORMAT")]
    render: Option<String>,

    /// How complements are created.
    #[arg(long, value_enum, default_value_t = Strategy::Auto)]
    strategy: Strategy,

    /// Maximum number of terms created by duplication.
    #[arg(long, value_name = "INT", default_value = "4096")]
    budget: usize,

    /// Log progress.
    #[arg(short, long)]
    verbose: bool,

    /// Log every rewrite.
    #[arg(short, long)]
    debug: bool,
}

/// Creates `<dir>/<stem>.<ext>`, or `<stem>-<k>.<ext>` for the first free `k`,
/// never truncating an existing file.
fn create_fresh(dir: &Path, stem: &str, ext: &str) -> std::io::Result<(File, PathBuf)> {
    let mut k = 0;
    loop {
        let name = if k == 0 {
            format!("{}.{}", stem, ext)
        } else {
            format!("{}-{}.{}", stem, k, ext)
        };
        let path = dir.join(name);
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, path)),
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => k += 1,
            Err(err) => return Err(err),
        }
    }
}

fn render(net: &Network, index: usize, format: &str) -> color_eyre::Result<()> {
    let dot = net.to_dot()?;
    if format == "dot" {
        let path = format!("step{}.dot", index);
        std::fs::write(&path, dot).wrap_err_with(|| format!("writing {}", path))?;
        return Ok(());
    }

    // Intermediate graph for the external renderer.
    let (mut file, dot_path) = create_fresh(Path::new("."), &format!(".step{}", index), "dot")?;
    file.write_all(dot.as_bytes())
        .wrap_err_with(|| format!("writing {}", dot_path.display()))?;
    drop(file);

    let out_path = format!("step{}.{}", index, format);
    let output = Command::new("dot")
        .arg(format!("-T{}", format))
        .arg(&dot_path)
        .arg("-o")
        .arg(&out_path)
        .output();
    match output {
        Ok(output) if output.status.success() => {
            std::fs::remove_file(&dot_path)?;
        }
        Ok(output) => {
            warn!(
                "dot failed to render {}: {}",
                out_path,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Err(err) => {
            warn!("could not run dot ({}), leaving {}", err, dot_path.display());
        }
    }
    Ok(())
}

fn is_prs(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "prs")
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    let args = Cli::parse();

    let level = if args.debug {
        simplelog::LevelFilter::Debug
    } else if args.verbose {
        simplelog::LevelFilter::Info
    } else {
        simplelog::LevelFilter::Warn
    };
    simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    let time_total = std::time::Instant::now();

    let mut vars = VariableSet::new();
    let mut rules = RuleSet::new();
    let mut loaded = 0;
    for path in &args.files {
        if !is_prs(path) {
            warn!("unrecognized file '{}', skipping", path.display());
            continue;
        }
        let content = std::fs::read_to_string(path).wrap_err_with(|| format!("reading {}", path.display()))?;
        parse_prs_into(&content, &mut vars, &mut rules).wrap_err_with(|| format!("parsing {}", path.display()))?;
        loaded += 1;
    }
    if loaded == 0 {
        bail!("no production rule set given");
    }
    info!("loaded {} rules over {} variables", rules.len(), vars.len());

    let config = Config {
        strategy: args.strategy,
        duplication_budget: args.budget,
        ..Config::default()
    };
    let mut bub = Bubble::load_with_config(&rules, &vars, config)?;

    match &args.render {
        Some(format) => {
            render(bub.net(), 0, format)?;
            let mut failure = None;
            bub.reshuffle_observed(|index, net| {
                if failure.is_none() {
                    if let Err(err) = render(net, index, format) {
                        failure = Some(err);
                    }
                }
            })?;
            if let Some(err) = failure {
                return Err(err);
            }
        }
        None => {
            bub.reshuffle()?;
        }
    }

    bub.save(&mut rules, &mut vars)?;
    std::fs::write(&args.output, rules.display(&vars).to_string())
        .wrap_err_with(|| format!("writing {}", args.output.display()))?;

    info!(
        "{} rewrites, {} rules written to {} in {:.3} s",
        bub.counter(),
        rules.len(),
        args.output.display(),
        time_total.elapsed().as_secs_f64()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_fresh_keeps_existing_files() {
        let dir = std::env::temp_dir().join(format!("bubble-fresh-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("step3.dot"), "keep").unwrap();

        let (_, first) = create_fresh(&dir, "step3", "dot").unwrap();
        let (_, second) = create_fresh(&dir, "step3", "dot").unwrap();
        assert_eq!(first, dir.join("step3-1.dot"));
        assert_eq!(second, dir.join("step3-2.dot"));
        assert_eq!(std::fs::read_to_string(dir.join("step3.dot")).unwrap(), "keep");

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_strategy_flag() {
        let cli = Cli::try_parse_from(["bubble", "a.prs", "--strategy", "buffer"]).unwrap();
        assert_eq!(cli.strategy, Strategy::Buffer);
        let cli = Cli::try_parse_from(["bubble", "a.prs"]).unwrap();
        assert_eq!(cli.strategy, Strategy::Auto);
        assert!(Cli::try_parse_from(["bubble", "a.prs", "--strategy", "invert"]).is_err());
    }
}
