mod cli;

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context};
use fsnorm_core::{plan_layout, run_with_progress, Config, ProgressEvent};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::cli::build_cli;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let matches = build_cli().get_matches();

    let input_path = matches
        .get_one::<PathBuf>("in_scpfile")
        .expect("required argument");
    if !input_path.is_file() {
        return Err(anyhow!(
            "input manifest does not exist: {}",
            input_path.display()
        ));
    }

    let output_manifest = matches
        .get_one::<PathBuf>("out_scpfile")
        .expect("required argument");
    let output_dir = matches
        .get_one::<PathBuf>("outdir")
        .expect("required argument");
    let target_rate = *matches.get_one::<u32>("out_fs").expect("required argument");
    let chunksize = *matches
        .get_one::<NonZeroUsize>("chunksize")
        .expect("defaulted argument");
    let dry_run = matches.get_flag("dry-run");

    let mut builder = Config::builder(input_path, output_manifest, output_dir, target_rate)
        .batch_size(chunksize);
    if let Some(max_files) = matches.get_one::<NonZeroUsize>("max_files") {
        builder = builder.max_items_per_dir(*max_files);
    }
    if let Some(jobs) = matches.get_one::<NonZeroUsize>("nj") {
        builder = builder.workers(*jobs);
    }
    let config = builder.build().with_context(|| {
        format!(
            "failed to create configuration for '{}'",
            input_path.display()
        )
    })?;

    if dry_run {
        let plan = plan_layout(&config)
            .with_context(|| format!("failed to plan layout for '{}'", input_path.display()))?;

        if plan.is_empty() {
            println!("Dry run: the manifest holds no entries.");
        } else {
            let shards: BTreeSet<_> = plan
                .iter()
                .filter_map(|entry| entry.output.parent())
                .collect();
            println!(
                "Dry run: {} entries across {} shard directories; resampled files would be:",
                plan.len(),
                shards.len()
            );
            for entry in &plan {
                println!("  {} {}", entry.id, entry.output.display());
            }
        }

        return Ok(());
    }

    let progress = ProgressBar::new(0);
    progress.set_draw_target(ProgressDrawTarget::stderr());

    let bar_style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ({eta}) {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress.set_style(bar_style);

    let progress_handle = progress.clone();
    let result = run_with_progress(config, move |event| match event {
        ProgressEvent::Start { total } => {
            progress_handle.set_length(total as u64);
            progress_handle.enable_steady_tick(Duration::from_millis(100));
            progress_handle.set_message("resampling");
        }
        ProgressEvent::Advance { completed } => {
            progress_handle.set_position(completed as u64);
        }
        ProgressEvent::Finish => {
            progress_handle.set_message("completed");
        }
    })
    .with_context(|| format!("failed to normalize '{}'", input_path.display()));

    progress.finish_and_clear();

    let report = result?;
    println!(
        "Wrote {} of {} entries to {}",
        report.written(),
        report.total,
        output_manifest.display()
    );
    println!("  {report}");

    Ok(())
}
