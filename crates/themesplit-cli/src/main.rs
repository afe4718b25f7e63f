use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use themesplit_core::bundle::{Assets, BundleOptions, Bundler};
use themesplit_core::config::{BuildConfig, CliOverrides};
use themesplit_core::fs::{normalize_path, RealFileSystem};
use themesplit_core::ThemeEngine;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Config file names looked up in the working directory, in order
const CONFIG_FILES: [&str; 3] = ["themesplit.yaml", "themesplit.yml", "themesplit.json"];

/// themesplit - build per-theme stylesheets next to the main bundle
#[derive(Parser, Debug, Clone)]
#[command(name = "themesplit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to themesplit.yaml or themesplit.json
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Entry point as name=path (repeatable)
    #[arg(long = "entry", value_name = "NAME=PATH", value_parser = parse_entry)]
    entries: Vec<(String, String)>,

    /// Output directory for emitted assets
    #[arg(long, value_name = "DIR")]
    out_dir: Option<String>,

    /// Key of the theme sources are written against
    #[arg(long, value_name = "KEY")]
    default_theme: Option<String>,

    /// Prefix for per-theme chunk names
    #[arg(long, value_name = "PREFIX")]
    chunk_prefix: Option<String>,

    /// Rebuild when project files change
    #[arg(short, long)]
    watch: bool,

    /// Initialize a new themed project in the current directory
    #[arg(long)]
    init: bool,
}

fn parse_entry(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((name, path)) if !name.is_empty() && !path.is_empty() => Ok((name.to_string(), path.to_string())),
        _ => Err(format!("expected NAME=PATH, got '{}'", value)),
    }
}

fn main() -> anyhow::Result<()> {
    // Set RUST_LOG=debug for fan-out and rewrite details
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli = Cli::parse();

    if cli.init {
        init_project()?;
        return Ok(());
    }

    let project = load_project(&cli)?;
    info!(
        "Building {} entry point(s) from {}",
        project.config.entry.len(),
        project.root.display()
    );

    if cli.watch {
        return watch_mode(project);
    }

    let mut build = ThemedBuild::new(&project)?;
    let assets = build.compile()?;
    write_assets(&project.out_dir, &assets)?;
    Ok(())
}

fn init_project() -> anyhow::Result<()> {
    println!("Initializing new themesplit project...");

    let config_path = Path::new(CONFIG_FILES[0]);
    if config_path.exists() {
        anyhow::bail!("{} already exists", config_path.display());
    }
    BuildConfig::init_file(config_path).context("Failed to write configuration")?;
    println!("Created {}", config_path.display());

    std::fs::create_dir_all("src/themes")?;
    println!("Created src/themes/ directory");

    let files = [
        (
            "src/themes/default.scss",
            "$background: #ffffff;\n$text: #1a1a1a;\n",
        ),
        ("src/themes/dark.scss", "$background: #121212;\n$text: #f5f5f5;\n"),
        (
            "src/App.scss",
            r#"@import './themes/default';

.app {
  background: $background;
  color: $text;
}
"#,
        ),
        (
            "src/index.jsx",
            r#"import styles from './App.scss';

document.body.className = styles.app;
"#,
        ),
    ];
    for (path, content) in files {
        std::fs::write(path, content)?;
        println!("Created {}", path);
    }

    println!("\nProject initialized successfully!");
    println!("Run 'themesplit' to build main.css and one stylesheet per theme.");

    Ok(())
}

/// Resolved configuration plus the directories it refers to
struct Project {
    config: BuildConfig,
    root: PathBuf,
    out_dir: PathBuf,
}

fn load_project(cli: &Cli) -> anyhow::Result<Project> {
    let cwd = std::env::current_dir().context("Failed to read the working directory")?;

    let config_path = match cli.config {
        Some(ref path) => Some(cwd.join(path)),
        None => CONFIG_FILES.iter().map(|name| cwd.join(name)).find(|path| path.exists()),
    };

    let (mut config, root) = match config_path {
        Some(path) => {
            let config = BuildConfig::from_file(&path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?;
            let root = path.parent().map(Path::to_path_buf).unwrap_or_else(|| cwd.clone());
            (config, root)
        }
        None => {
            debug!("No configuration file found, using command line options only");
            (BuildConfig::default(), cwd)
        }
    };

    let overrides = CliOverrides {
        default_theme: cli.default_theme.clone(),
        chunk_prefix: cli.chunk_prefix.clone(),
        out_dir: cli.out_dir.clone(),
        entries: cli.entries.clone(),
    };
    config.merge(&overrides);

    if config.entry.is_empty() {
        anyhow::bail!("No entry points configured. Add an `entry` section or pass --entry NAME=PATH.");
    }

    // Watch events carry canonical paths
    let root = std::fs::canonicalize(&root).unwrap_or_else(|_| normalize_path(&root));
    let out_dir = normalize_path(&root.join(&config.out_dir));

    Ok(Project { config, root, out_dir })
}

/// Engine and bundler for one project, kept across watch rebuilds
struct ThemedBuild {
    engine: ThemeEngine,
    bundler: Bundler,
}

impl ThemedBuild {
    fn new(project: &Project) -> anyhow::Result<Self> {
        let fs = Arc::new(RealFileSystem::new());
        let engine = ThemeEngine::new(&project.config.themes, &project.root, fs.as_ref())
            .context("Invalid theme configuration")?;

        let mut options = BundleOptions::new(project.root.clone());
        options.local_ident_name = project.config.local_ident_name.clone();
        for (name, path) in &project.config.entry {
            options = options.entry(name.clone(), path);
        }

        Ok(Self {
            engine,
            bundler: Bundler::new(fs, options),
        })
    }

    fn compile(&mut self) -> anyhow::Result<Assets> {
        self.bundler.compile(&mut self.engine).context("Build failed")
    }

    fn rebuild(&mut self, changed: &[PathBuf]) -> anyhow::Result<Assets> {
        self.bundler
            .rebuild(changed, &mut self.engine)
            .context("Rebuild failed")
    }
}

fn write_assets(out_dir: &Path, assets: &Assets) -> anyhow::Result<()> {
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;

    for (name, content) in assets {
        let path = out_dir.join(name);
        std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
    }
    Ok(())
}

fn watch_mode(project: Project) -> anyhow::Result<()> {
    use notify::{
        event::{EventKind, ModifyKind},
        Event, RecursiveMode, Watcher,
    };
    use std::sync::mpsc::channel;
    use std::time::{Duration, Instant};

    println!("Watching for changes... (Press Ctrl+C to stop)");

    let mut build = ThemedBuild::new(&project)?;
    match build.compile() {
        Ok(assets) => write_assets(&project.out_dir, &assets)?,
        Err(e) => warn!("{:#}", e),
    }

    let (tx, rx) = channel();
    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
        if let Ok(event) = res {
            let _ = tx.send(event);
        }
    })?;
    watcher.watch(&project.root, RecursiveMode::Recursive)?;

    let debounce = Duration::from_millis(100);
    let mut pending: Vec<PathBuf> = Vec::new();
    let mut last_event = Instant::now();

    loop {
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                let relevant = matches!(
                    event.kind,
                    EventKind::Modify(ModifyKind::Data(_)) | EventKind::Create(_)
                );
                if !relevant {
                    continue;
                }
                // Our own output must not trigger another build
                for path in event.paths {
                    if !path.starts_with(&project.out_dir) && !pending.contains(&path) {
                        pending.push(path);
                    }
                }
                last_event = Instant::now();
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                return Err(anyhow::anyhow!("File watcher disconnected"));
            }
        }

        if pending.is_empty() || last_event.elapsed() < debounce {
            continue;
        }

        let changed = std::mem::take(&mut pending);
        println!("\n{} file(s) changed, rebuilding...", changed.len());
        match build.rebuild(&changed) {
            Ok(assets) => write_assets(&project.out_dir, &assets)?,
            Err(e) => warn!("{:#}", e),
        }
    }
}
