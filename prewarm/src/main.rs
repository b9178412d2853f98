use anyhow::{Result, bail};
use clap::Parser;
use console::style;
use dialoguer::{Confirm, theme::ColorfulTheme};
use prewarm_core::format::size_pretty;
use prewarm_core::prewarm::Prewarmer;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "prewarm")]
#[command(about = "Prewarm a block device by rewriting every block in place", version)]
struct Cli {
    /// Block device to prewarm (e.g. /dev/xvdf)
    #[arg(required = true)]
    device: PathBuf,

    /// Number of concurrent copy workers, each assigned a disjoint range
    #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    workers: u32,

    /// Seconds between progress polls
    #[arg(short, long, default_value = "5")]
    interval: f64,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    yes: bool,
}

/// Presents a final "Yes/No" confirmation to the user.
fn confirm_operation(prompt: &str) -> Result<bool> {
    let confirmation = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(false)
        .interact()?;

    Ok(confirmation)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if !(cli.interval > 0.0) {
        bail!("Polling interval must be a positive number of seconds");
    }

    // This flag allows for graceful cancellation of the run.
    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();

    // Set up the Ctrl+C handler to toggle the `running` flag.
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })?;

    let prewarmer = Prewarmer::new(
        &cli.device,
        cli.workers,
        Duration::from_secs_f64(cli.interval),
    )?;
    let device = prewarmer.device().clone();

    println!(
        "{} Every block of '{}' will be read and rewritten in place.",
        style("WARNING:").red().bold(),
        device.path.display(),
    );
    let per_worker = prewarmer
        .spans()
        .first()
        .map(|span| span.len_bytes())
        .unwrap_or(0);

    println!("  Device:  {}", style(&device).cyan());
    println!(
        "  Workers: {} ({} each)",
        style(cli.workers).cyan(),
        style(size_pretty(per_worker)).cyan()
    );
    println!();

    if !cli.yes && !confirm_operation("Are you sure you want to proceed?")? {
        println!("Prewarm cancelled.");
        return Ok(());
    }

    println!();

    prewarmer.prewarm(running, |snapshot| {
        println!("{}", snapshot.render());
    })?;

    println!(
        "\n✨ Successfully prewarmed {}.",
        style(device.path.display()).cyan()
    );

    Ok(())
}
