use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use console::style;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tunectl::error_messages::print_error_with_solution;
use tunectl::live_state::SysfsLiveState;
use tunectl::preferences::KEY_VOLTAGE;
use tunectl::profiles::Editability;
use tunectl::voltage::{self, VoltageSpec};
use tunectl::{
    AppConfig, ConfigStore, FileBlobStore, PollController, PrefValue, ProfileManager, TuneError,
    VoltageBounds,
};

#[derive(Parser)]
#[command(name = "tunectl", version, about = "Device tuning control panel", long_about = None)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Directory holding preferences.json
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Prefs {
        #[command(subcommand)]
        subcommand: PrefsSubcommand,
    },
    Profile {
        #[command(subcommand)]
        subcommand: ProfileSubcommand,
    },
    Voltage {
        #[command(subcommand)]
        subcommand: VoltageSubcommand,
    },
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
    /// Poll live values and show the settings summary
    Status,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Write a config file with the default settings
    Init {
        /// Where to write it, defaults to the user config dir
        #[arg(long)]
        path: Option<PathBuf>,
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
    /// Print the settings in effect
    Show,
}

#[derive(Subcommand)]
enum PrefsSubcommand {
    Show,
    Get {
        key: String,
    },
    Set {
        key: String,
        /// Parsed as bool or number when possible, otherwise text
        value: String,
    },
    Reset,
}

#[derive(Subcommand)]
enum ProfileSubcommand {
    List,
    Save {
        name: String,
    },
    Apply {
        name: String,
    },
    Show {
        name: String,
    },
    /// Store an edited voltage string into a saved profile
    SetVoltage {
        name: String,
        /// Space-separated steps, e.g. "38 40 42"
        steps: String,
    },
}

#[derive(Args)]
struct BoundsArgs {
    /// Lowest step the device accepts
    #[arg(long, requires = "max")]
    min: Option<i32>,
    /// Highest step the device accepts
    #[arg(long, requires = "min")]
    max: Option<i32>,
}

impl BoundsArgs {
    fn bounds(&self) -> Option<VoltageBounds> {
        match (self.min, self.max) {
            (Some(min), Some(max)) => Some(VoltageBounds::new(min, max)),
            _ => None,
        }
    }
}

#[derive(Subcommand)]
enum VoltageSubcommand {
    /// Choices around a single step
    Table {
        #[arg(allow_negative_numbers = true)]
        step: i32,
        #[command(flatten)]
        bounds: BoundsArgs,
    },
    /// Choices for every rail of a voltage string (defaults to the stored one)
    Rails {
        steps: Option<String>,
        /// Comma-separated rail labels
        #[arg(long, value_delimiter = ',')]
        labels: Vec<String>,
        #[command(flatten)]
        bounds: BoundsArgs,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::load();

    let log_level = if cli.verbose { Level::DEBUG } else { config.level() };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let storage = match cli.storage_dir.as_ref().or(config.storage_dir.as_ref()) {
        Some(dir) => FileBlobStore::new(dir),
        None => FileBlobStore::default_location(),
    };
    let store = ConfigStore::new(storage);

    if let Err(e) = run(cli.command, &store, &config).await {
        match e.downcast_ref::<TuneError>() {
            Some(tune) => print_error_with_solution(tune),
            None => eprintln!("Error: {e}"),
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(command: Command, store: &ConfigStore, config: &AppConfig) -> Result<()> {
    let profiles = ProfileManager::new(store);

    match command {
        Command::Prefs { subcommand } => match subcommand {
            PrefsSubcommand::Show => {
                for (key, value) in store.get(false) {
                    println!("{key} = {value}");
                }
            }
            PrefsSubcommand::Get { key } => match store.value(&key) {
                Some(value) => println!("{value}"),
                None => println!("{key} is not set"),
            },
            PrefsSubcommand::Set { key, value } => {
                store.put(&key, PrefValue::parse(&value));
                println!("Set {key} = {value}");
            }
            PrefsSubcommand::Reset => {
                store.reset();
                println!("Preferences reset to defaults");
            }
        },
        Command::Profile { subcommand } => match subcommand {
            ProfileSubcommand::List => {
                let names = profiles.list();
                println!("Saved profiles ({}):", names.len());
                for name in names {
                    println!("  {name}");
                }
            }
            ProfileSubcommand::Save { name } => {
                profiles.save(&name)?;
                println!("✅ Profile saved: {name}");
            }
            ProfileSubcommand::Apply { name } => {
                let prefs = profiles.apply(&name)?;
                store.put_all(&prefs);
                println!("✅ Profile applied: {name}");
            }
            ProfileSubcommand::Show { name } => {
                let profile = profiles.load(&name)?;
                println!("{}", style(&profile.name).bold());
                if let Some(saved_at) = profile.saved_at {
                    println!("  saved {}", saved_at.format("%Y-%m-%d %H:%M:%S"));
                }
                for (key, value) in &profile.settings {
                    println!("  {key}: {value}");
                }
            }
            ProfileSubcommand::SetVoltage { name, steps } => {
                profiles.update(&name, KEY_VOLTAGE, steps.clone())?;
                println!("Voltage for {name} set to \"{steps}\"");
            }
        },
        Command::Voltage { subcommand } => match subcommand {
            VoltageSubcommand::Table { step, bounds } => {
                for choice in voltage::generate(step, bounds.bounds()) {
                    let marker = if choice.step == step { "*" } else { " " };
                    println!("{marker} {:>4}  {}", choice.step, choice.label);
                }
            }
            VoltageSubcommand::Rails {
                steps,
                labels,
                bounds,
            } => {
                let steps = steps.unwrap_or_else(|| {
                    store
                        .value(KEY_VOLTAGE)
                        .map(|v| v.to_string())
                        .unwrap_or_default()
                });
                let labels: Vec<&str> = labels.iter().map(String::as_str).collect();
                let spec = VoltageSpec::parse(&steps, &labels, bounds.bounds())?;
                if spec.rails.is_empty() {
                    println!("No voltage rails configured");
                }
                for (label, choices) in spec.tables() {
                    println!("{}", style(label).bold());
                    for choice in choices {
                        println!("  {:>4}  {}", choice.step, choice.label);
                    }
                }
            }
        },
        Command::Config { subcommand } => match subcommand {
            ConfigSubcommand::Init { path, force } => {
                let path = path.unwrap_or_else(AppConfig::config_path);
                if path.exists() && !force {
                    anyhow::bail!("{} already exists, pass --force to replace it", path.display());
                }
                AppConfig::default().save_to(&path)?;
                println!("✅ Wrote {}", path.display());
            }
            ConfigSubcommand::Show => {
                println!("config file: {}", AppConfig::config_path().display());
                println!("{}", toml::to_string_pretty(config)?);
            }
        },
        Command::Status => {
            let controller = PollController::new(SysfsLiveState::with_root("/", &config.block_device));
            if let Some(handle) = controller.on_visible() {
                let timeout = Duration::from_millis(config.poll_timeout_ms);
                if tokio::time::timeout(timeout, handle).await.is_err() {
                    eprintln!("Live state did not respond within {}ms", config.poll_timeout_ms);
                }
            }
            controller.on_invisible();

            println!("Settings:");
            for row in profiles.build_summary(&controller.snapshot()) {
                let value = row.value.unwrap_or_default();
                let value = match row.editability {
                    Editability::Editable => style(value).green(),
                    Editability::Disabled => style(value).yellow(),
                    Editability::Unsupported => style(value).dim(),
                };
                println!("  {:<20} {}", row.name, value);
            }
            if let Some(updated) = controller.last_updated() {
                println!("Updated {}", updated.format("%H:%M:%S"));
            }
        }
    }

    Ok(())
}
