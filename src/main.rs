use anyhow::{anyhow, bail, Context, Result};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use gallerist::config::Config;
use gallerist::logging::{self, LogTarget};
use gallerist::{
    Catalog, GroupOperator, Picture, ScanProgress, ScanResult, SearchCriteria, Tag, TagCategory,
};

#[derive(Debug, Default)]
struct GlobalOptions {
    config_path: Option<PathBuf>,
    verbose: bool,
}

#[derive(Debug, PartialEq)]
enum Command {
    Index(PathBuf),
    WatchAdd { path: PathBuf, name: String, auto_reindex: bool },
    WatchRemove(String),
    WatchUpdate { path: String, name: Option<String>, auto_reindex: Option<bool> },
    WatchList,
    WatchIndex(PathBuf),
    Reindex { auto_only: bool },
    Changes(PathBuf),
    TagCreate { name: String, category: TagCategory, color: String },
    TagUpdate { name: String, category: TagCategory, color: String },
    TagDelete(String),
    TagList { counts: bool },
    TagAdd { picture: String, tag: String },
    TagRemove { picture: String, tag: String },
    TagShow(String),
    Search { criteria: SearchCriteria, json: bool },
    Pictures { json: bool },
    Delete { picture: String, from_disk: bool },
}

const DEFAULT_COLOR: &str = "#3B82F6";

fn parse_args(args: &[String]) -> Result<(GlobalOptions, Command)> {
    let mut options = GlobalOptions::default();
    let mut rest = Vec::new();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("gallerist {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                let path = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow!("--config requires a path argument"))?;
                options.config_path = Some(PathBuf::from(path));
                i += 1;
            }
            "--verbose" | "-v" => options.verbose = true,
            _ => rest.push(args[i].clone()),
        }
        i += 1;
    }

    let command = parse_command(&rest)?;
    Ok((options, command))
}

fn parse_command(args: &[String]) -> Result<Command> {
    let words: Vec<&str> = args.iter().map(String::as_str).collect();

    let command = match words.as_slice() {
        ["index", dir] => Command::Index(PathBuf::from(dir)),
        ["watch", "add", dir, flags @ ..] => {
            let flags = Flags::parse(flags, &["--name"], &["--auto"])?;
            Command::WatchAdd {
                path: PathBuf::from(dir),
                name: flags.value("--name").unwrap_or_default(),
                auto_reindex: flags.switch("--auto"),
            }
        }
        ["watch", "remove", dir] => Command::WatchRemove(dir.to_string()),
        ["watch", "update", dir, flags @ ..] => {
            let flags = Flags::parse(flags, &["--name"], &["--auto", "--no-auto"])?;
            let auto_reindex = match (flags.switch("--auto"), flags.switch("--no-auto")) {
                (true, true) => bail!("--auto and --no-auto are mutually exclusive"),
                (true, false) => Some(true),
                (false, true) => Some(false),
                (false, false) => None,
            };
            Command::WatchUpdate {
                path: dir.to_string(),
                name: flags.value("--name"),
                auto_reindex,
            }
        }
        ["watch", "list"] => Command::WatchList,
        ["watch", "index", dir] => Command::WatchIndex(PathBuf::from(dir)),
        ["reindex", flags @ ..] => {
            let flags = Flags::parse(flags, &[], &["--auto-only"])?;
            Command::Reindex {
                auto_only: flags.switch("--auto-only"),
            }
        }
        ["changes", dir] => Command::Changes(PathBuf::from(dir)),
        ["tag", action @ ("create" | "update"), name, category, flags @ ..] => {
            let flags = Flags::parse(flags, &["--color"], &[])?;
            let name = name.to_string();
            let category: TagCategory = category.parse()?;
            let color = flags.value("--color").unwrap_or_else(|| DEFAULT_COLOR.to_string());
            if *action == "create" {
                Command::TagCreate { name, category, color }
            } else {
                Command::TagUpdate { name, category, color }
            }
        }
        ["tag", "delete", name] => Command::TagDelete(name.to_string()),
        ["tag", "list", flags @ ..] => {
            let flags = Flags::parse(flags, &[], &["--counts"])?;
            Command::TagList {
                counts: flags.switch("--counts"),
            }
        }
        ["tag", "add", picture, tag] => Command::TagAdd {
            picture: picture.to_string(),
            tag: tag.to_string(),
        },
        ["tag", "remove", picture, tag] => Command::TagRemove {
            picture: picture.to_string(),
            tag: tag.to_string(),
        },
        ["tag", "show", picture] => Command::TagShow(picture.to_string()),
        ["search", flags @ ..] => parse_search(flags)?,
        ["pictures", flags @ ..] => {
            let flags = Flags::parse(flags, &[], &["--json"])?;
            Command::Pictures {
                json: flags.switch("--json"),
            }
        }
        ["delete", picture, flags @ ..] => {
            let flags = Flags::parse(flags, &[], &["--from-disk"])?;
            Command::Delete {
                picture: picture.to_string(),
                from_disk: flags.switch("--from-disk"),
            }
        }
        [] => bail!("No command given"),
        _ => bail!("Unknown or incomplete command: {}", words.join(" ")),
    };

    Ok(command)
}

fn parse_search(args: &[&str]) -> Result<Command> {
    const GROUPS: [(&str, &str, TagCategory); 4] = [
        ("--persons", "--persons-op", TagCategory::Person),
        ("--locations", "--locations-op", TagCategory::Location),
        ("--events", "--events-op", TagCategory::Event),
        ("--others", "--others-op", TagCategory::Other),
    ];

    let mut valued: Vec<&str> = vec!["--criteria"];
    for (tags, op, _) in GROUPS {
        valued.push(tags);
        valued.push(op);
    }
    let flags = Flags::parse(args, &valued, &["--json"])?;

    let mut criteria = match flags.value("--criteria") {
        Some(json) => serde_json::from_str(&json).context("Invalid --criteria JSON")?,
        None => SearchCriteria::default(),
    };

    for (tags, op, category) in GROUPS {
        let group = criteria.group_mut(category);
        if let Some(list) = flags.value(tags) {
            group.tags = list
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(operator) = flags.value(op) {
            group.operator = operator.parse::<GroupOperator>()?;
        }
    }

    Ok(Command::Search {
        criteria,
        json: flags.switch("--json"),
    })
}

/// Trailing `--flag value` and `--switch` arguments of one command.
struct Flags {
    values: Vec<(String, String)>,
    switches: Vec<String>,
}

impl Flags {
    fn parse(args: &[&str], valued: &[&str], switches: &[&str]) -> Result<Self> {
        let mut flags = Flags {
            values: Vec::new(),
            switches: Vec::new(),
        };

        let mut i = 0;
        while i < args.len() {
            let arg = args[i];
            if valued.contains(&arg) {
                let value = args
                    .get(i + 1)
                    .ok_or_else(|| anyhow!("{} requires a value", arg))?;
                flags.values.push((arg.to_string(), value.to_string()));
                i += 1;
            } else if switches.contains(&arg) {
                flags.switches.push(arg.to_string());
            } else {
                bail!("Unknown argument: {}", arg);
            }
            i += 1;
        }

        Ok(flags)
    }

    /// Last value given for `name`.
    fn value(&self, name: &str) -> Option<String> {
        self.values
            .iter()
            .rev()
            .find(|(flag, _)| flag == name)
            .map(|(_, value)| value.clone())
    }

    fn switch(&self, name: &str) -> bool {
        self.switches.iter().any(|s| s == name)
    }
}

fn print_help() {
    println!(
        r#"gallerist - picture catalog with tag search

USAGE:
    gallerist [OPTIONS] <COMMAND>

COMMANDS:
    index <dir>                              Index a folder recursively
    watch add <dir> [--name N] [--auto]      Register a watched folder
    watch remove <dir>                       Unregister a watched folder
    watch update <dir> [--name N] [--auto|--no-auto]
    watch list                               List watched folders
    watch index <dir>                        Index a watched folder and save its stats
    reindex [--auto-only]                    Re-index every (or every auto) watched folder
    changes <dir>                            Show files the next index pass would touch
    tag create <name> <category> [--color C] Category: person, location, event, other
    tag update <name> <category> [--color C]
    tag delete <name>
    tag list [--counts]
    tag add <picture> <tag>
    tag remove <picture> <tag>
    tag show <picture>
    search [--persons a,b] [--persons-op and|or]
           [--locations ..] [--events ..] [--others ..]
           [--criteria JSON] [--json]        Groups are intersected with each other
    pictures [--json]                        List indexed pictures
    delete <picture> [--from-disk]           Remove a picture from the catalog

OPTIONS:
    --config, -c PATH   Path to config file
    --verbose, -v       Log to stderr at debug level
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    GALLERIST_CONFIG    Path to config file (overrides default location)
    GALLERIST_LOG       Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/gallerist/config.toml

See also: gallerist-daemon --help"#
    );
}

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (options, command) = match parse_args(&args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Run 'gallerist --help' for usage.");
            std::process::exit(2);
        }
    };

    let target = if options.verbose {
        LogTarget::Stderr
    } else {
        LogTarget::Background
    };
    let _ = logging::init(Some(Config::config_dir().join("logs")), target);

    let config = match options.config_path {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    let catalog = Catalog::open(&config)
        .with_context(|| format!("Failed to open catalog at {}", config.db_path().display()))?;

    run(&catalog, command)
}

fn run(catalog: &Catalog, command: Command) -> Result<()> {
    match command {
        Command::Index(dir) => {
            let result = with_progress(|tx| catalog.index_folder(&dir, Some(tx)))?;
            print_scan(&result);
        }
        Command::WatchAdd { path, name, auto_reindex } => {
            let folder = catalog.add_watched_folder(&path, &name, auto_reindex)?;
            println!("Watching {} as '{}'", folder.path, folder.name);
        }
        Command::WatchRemove(path) => {
            catalog.remove_watched_folder(&path)?;
            println!("Stopped watching {}", path);
        }
        Command::WatchUpdate { path, name, auto_reindex } => {
            let current = catalog
                .watched_folder(&path)?
                .ok_or_else(|| anyhow!("Not found: watched folder {}", path))?;
            catalog.update_watched_folder(
                &current.path,
                &name.unwrap_or(current.name),
                auto_reindex.unwrap_or(current.auto_reindex),
            )?;
            println!("Updated {}", current.path);
        }
        Command::WatchList => {
            for folder in catalog.watched_folders()? {
                let last = folder
                    .last_indexed_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{}\t{}\t{} pictures\tindexed {}{}",
                    folder.name,
                    folder.path,
                    folder.picture_count,
                    last,
                    if folder.auto_reindex { "\tauto" } else { "" }
                );
            }
        }
        Command::WatchIndex(dir) => {
            let outcome = with_progress(|tx| catalog.index_watched_folder(&dir, Some(tx)))?;
            print_scan(&outcome.scan);
            if let Some(e) = outcome.stats_error {
                eprintln!("Warning: folder statistics not saved: {}", e);
            }
        }
        Command::Reindex { auto_only } => {
            let summary = if auto_only {
                catalog.reindex_auto_folders()?
            } else {
                catalog.reindex_all_watched_folders()?
            };
            println!(
                "{} folders re-indexed, {} failed, {} pictures indexed",
                summary.folders_indexed, summary.folders_failed, summary.pictures_indexed
            );
        }
        Command::Changes(dir) => {
            let changes = catalog.pending_changes(&dir)?;
            for path in &changes.new_files {
                println!("new\t{}", path.display());
            }
            for path in &changes.modified_files {
                println!("modified\t{}", path.display());
            }
            println!("{} pending changes", changes.total_count());
        }
        Command::TagCreate { name, category, color } => {
            let tag = catalog.create_tag(&name, category, &color)?;
            println!("Created {} tag '{}'", tag.category, tag.name);
        }
        Command::TagUpdate { name, category, color } => {
            catalog.update_tag(&name, category, &color)?;
            println!("Updated tag '{}'", name);
        }
        Command::TagDelete(name) => {
            catalog.delete_tag(&name)?;
            println!("Deleted tag '{}'", name);
        }
        Command::TagList { counts } => {
            if counts {
                for entry in catalog.all_tags_with_count()? {
                    println!("{}\t{}", format_tag(&entry.tag), entry.picture_count);
                }
            } else {
                for tag in catalog.all_tags()? {
                    println!("{}", format_tag(&tag));
                }
            }
        }
        Command::TagAdd { picture, tag } => {
            catalog.add_tag_to_picture(&picture, &tag)?;
        }
        Command::TagRemove { picture, tag } => {
            catalog.remove_tag_from_picture(&picture, &tag)?;
        }
        Command::TagShow(picture) => {
            for tag in catalog.tags_for_picture(&picture)? {
                println!("{}", format_tag(&tag));
            }
        }
        Command::Search { criteria, json } => {
            let pictures = catalog.search(&criteria)?;
            print_pictures(&pictures, json)?;
        }
        Command::Pictures { json } => {
            let pictures = catalog.pictures()?;
            print_pictures(&pictures, json)?;
        }
        Command::Delete { picture, from_disk } => {
            catalog.delete_picture(&picture, from_disk)?;
            println!("Deleted {}", picture);
        }
    }

    Ok(())
}

/// Run a scan while a helper thread prints its progress to stderr.
fn with_progress<T>(scan: impl FnOnce(&mpsc::Sender<ScanProgress>) -> T) -> T {
    let (tx, rx) = mpsc::channel();

    let printer = thread::spawn(move || {
        for event in rx {
            match event {
                ScanProgress::Started { total_files } => eprintln!("Found {} images", total_files),
                ScanProgress::Scanning { current, total, filename } => {
                    eprint!("\r[{}/{}] {:<40}", current, total, filename)
                }
                ScanProgress::Warning { path, message } => {
                    eprintln!("\nSkipped {}: {}", path.display(), message)
                }
                ScanProgress::Completed { .. } => eprintln!(),
            }
        }
    });

    let result = scan(&tx);
    drop(tx);
    let _ = printer.join();
    result
}

fn print_scan(result: &ScanResult) {
    println!(
        "{} found, {} new, {} updated, {} unchanged, {} skipped{}",
        result.total_found,
        result.new,
        result.updated,
        result.unchanged,
        result.warnings.len(),
        if result.cancelled { " (cancelled)" } else { "" }
    );
}

fn print_pictures(pictures: &[Picture], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(pictures)?);
        return Ok(());
    }

    for picture in pictures {
        println!(
            "{}\t{}x{}\t{}",
            picture.path,
            picture.width,
            picture.height,
            picture.modified_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    println!("{} pictures", pictures.len());
    Ok(())
}

fn format_tag(tag: &Tag) -> String {
    format!("{}\t{}\t{}", tag.name, tag.category, tag.color)
}
