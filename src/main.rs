use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use raw_pano::{cli, config, db, error, logging, tools};
use cli::{Cli, Commands, OpenTarget};
use config::Config;
use db::PanoDb;
use error::Result;
use std::path::PathBuf;
use std::time::Duration;
use tools::StitchOptions;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = Config::load()?;

    if let Some(threshold) = cli.time_threshold {
        config.time_threshold = threshold;
    }
    if let Some(backend) = cli.metadata {
        config.metadata_backend = backend;
    }
    config.validate()?;

    logging::init(&config.log_dir(), cli.debug)?;

    if let Commands::Config {
        set_viewer,
        set_editor,
        set_style_dir,
        save,
        show,
    } = &cli.command
    {
        let changed = set_viewer.is_some() || set_editor.is_some() || set_style_dir.is_some();
        if let Some(viewer) = set_viewer {
            config.image_viewer = viewer.clone();
        }
        if let Some(editor) = set_editor {
            config.editor = editor.clone();
        }
        if let Some(dir) = set_style_dir {
            config.style_dir = Some(dir.clone());
        }
        if changed || *save {
            config.save()?;
            println!("✔ Saved config: {}", Config::config_path()?.display());
        }

        if *show || !(changed || *save) {
            println!("Config:");
            println!("  time threshold: {}s", config.time_threshold);
            println!("  raw extensions: {}", config.raw_extensions.join(", "));
            println!("  capture keys: {}", config.capture_keys.len());
            println!("  metadata: {:?}", config.metadata_backend);
            println!("  viewer: {}", config.image_viewer);
            println!("  editor: {}", config.editor);
            println!("  style dir: {}", display_opt(config.style_dir()));
            println!("  log dir: {}", config.log_dir().display());
        }
        return Ok(());
    }

    let mut db = PanoDb::with_tools(&cli.root, &config)?;

    match cli.command {
        Commands::List { sequences } => {
            println!(
                "{:<16} {:>5} {:<16} {:<16} {:>4} {:>4} {:>4}",
                "name", "group", "prev", "next", "jpg", "pano", "xmp"
            );
            for record in db.store().records() {
                if sequences && record.is_standalone() {
                    continue;
                }
                println!(
                    "{:<16} {:>5} {:<16} {:<16} {:>4} {:>4} {:>4}",
                    record.name,
                    record.time_group,
                    record.prev.as_deref().unwrap_or("-"),
                    record.next.as_deref().unwrap_or("-"),
                    mark(record.has_jpeg),
                    mark(record.has_pano),
                    mark(record.has_xmp),
                );
            }
            println!("\n{} photos", db.store().len());
        }

        Commands::Scan { reset } => {
            if reset {
                db.reset()?;
            } else {
                db.scan()?;
                db.save()?;
            }
            let sequences = db
                .store()
                .records()
                .filter(|r| r.prev.is_none() && r.next.is_some())
                .count();
            println!("✔ {} photos, {} sequences", db.store().len(), sequences);
        }

        Commands::Seq { name } => {
            for member in db.get_sequence(&name)? {
                println!("{}", member);
            }
        }

        Commands::Link { from, to } => {
            db.link(&from, &to)?;
            db.save()?;
            println!("✔ {} -> {}", from, to);
        }

        Commands::Unlink { name } => {
            match db.unlink(&name)? {
                Some(next) => println!("✔ {} -/-> {}", name, next),
                None => println!("{} is not linked to a following photo", name),
            }
            db.save()?;
        }

        Commands::Discard { name } => {
            let trash_path = db.discard(&name)?;
            println!("✔ Moved to {}", trash_path.display());
        }

        Commands::Convert {
            names,
            style,
            overwrite,
        } => {
            for name in &names {
                db.convert_jpeg(name, style.as_deref(), overwrite)?;
            }
            finish_jobs(&mut db).await?;
        }

        Commands::Stitch {
            name,
            style,
            adjust,
            projections,
            prefix,
        } => {
            let options = StitchOptions {
                adjust,
                style,
                projections,
                prefix,
                ..Default::default()
            };
            db.create_panorama(&name, options)?;
            finish_jobs(&mut db).await?;
            for panorama in db.find_panoramas(&name)? {
                println!("  {}", panorama.display());
            }
        }

        Commands::Panoramas { name } => {
            let panoramas = db.find_panoramas(&name)?;
            if panoramas.is_empty() {
                println!("No panoramas for {}", name);
            }
            for panorama in panoramas {
                println!("{}", panorama.display());
            }
        }

        Commands::Open { name, target } => {
            let opened = match target {
                OpenTarget::Raw => db.open_photo(&name)?,
                OpenTarget::Jpeg => db.open_jpeg(&name)?,
                OpenTarget::Sequence => db.open_photos(&name)?,
                OpenTarget::Panoramas => db.open_panoramas(&name)?,
            };
            if opened.is_empty() {
                println!("Nothing to open for {}", name);
            }
        }

        Commands::Edit { name } => {
            let has_xmp = db.open_editor(&name)?;
            db.save()?;
            println!("✔ {} edited (sidecar: {})", name, if has_xmp { "yes" } else { "no" });
        }

        Commands::Config { .. } => {}
    }

    Ok(())
}

/// Wait for the queue with a spinner, then record what finished.
///
/// Completed jobs are saved even when a later one failed.
async fn finish_jobs(db: &mut PanoDb) -> Result<()> {
    let waited = wait_with_spinner(db).await;

    let done = db.post_process()?;
    db.save()?;
    for name in &done {
        println!("✔ {}", name);
    }

    if waited.is_err() {
        let left = db.pending_jobs();
        if !left.is_empty() {
            println!("Not processed: {}", left.join(", "));
        }
    }
    waited
}

async fn wait_with_spinner(db: &PanoDb) -> Result<()> {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(120));

    let wait = db.wait_idle();
    tokio::pin!(wait);
    let result = loop {
        spinner.set_message(format!("processing: {}", db.pending_jobs().join(", ")));
        tokio::select! {
            result = &mut wait => break result,
            _ = tokio::time::sleep(Duration::from_millis(250)) => {}
        }
    };
    spinner.finish_and_clear();
    result
}

fn mark(flag: bool) -> &'static str {
    if flag {
        "x"
    } else {
        "-"
    }
}

fn display_opt(path: Option<PathBuf>) -> String {
    path.map(|p| p.display().to_string())
        .unwrap_or_else(|| "-".to_string())
}
