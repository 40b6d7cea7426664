use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use oejb_archive::{Archive, ArchiveClassLoader, ArchiveRegistry, BootstrapLoader, ResourceLoader};
use oejb_config::ContainerConfig;
use oejb_deploy::{AppSummary, DeployableContainer, TestClass};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "oejb", version, about = "Embedded EJB container tooling (archive inspection, resources, JNDI)")]
struct Cli {
    /// Container configuration file (defaults to `oejb.toml` discovery in the current directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble an archive and print its module graph
    Inspect(DeployArgs),
    /// List every URL the archive's class loader reports for a resource
    Resources(ResourcesArgs),
    /// Deploy an archive and print its JNDI tree
    Jndi(DeployArgs),
}

#[derive(Args)]
struct DeployArgs {
    /// Path to a jar, war or ear
    archive: PathBuf,
    /// Binary name of a test class to register as a managed bean
    #[arg(long)]
    test_class: Option<String>,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ResourcesArgs {
    /// Path to a jar, war or ear
    archive: PathBuf,
    /// Resource name, e.g. `META-INF/beans.xml`
    name: String,
    /// Emit JSON suitable for CI
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct ResourcesReport {
    name: String,
    urls: Vec<String>,
}

#[derive(Serialize)]
struct JndiReport {
    archive: String,
    tree: String,
}

/// Log lines repeated on failure when stderr logging is off.
const ERROR_LOG_TAIL: usize = 20;

fn main() {
    let cli = Cli::parse();
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(2);
        }
    };
    let logs = oejb_config::init_tracing(&config.logging);

    let exit_code = match run(cli.command, &config) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{:#}", err);
            if !config.logging.stderr && !logs.is_empty() {
                eprintln!("recent log:");
                for line in logs.tail(ERROR_LOG_TAIL) {
                    eprintln!("  {line}");
                }
            }
            2
        }
    };

    std::process::exit(exit_code);
}

fn run(command: Command, config: &ContainerConfig) -> Result<i32> {
    match command {
        Command::Inspect(args) => {
            let container = DeployableContainer::new(config);
            container.start();
            let info = container.deploy(open_archive(&args.archive)?, test_class(&args).as_ref())?;
            let summary = info.summary();
            if args.json {
                print_json(&summary)?;
            } else {
                print_summary(&summary);
            }
            Ok(0)
        }
        Command::Resources(args) => {
            let archive = open_archive(&args.archive)?;
            let loader = ArchiveClassLoader::new(
                Arc::new(ArchiveRegistry::new()),
                Arc::new(BootstrapLoader),
                [Arc::new(archive)],
                &config.classloader,
            );
            let report = ResourcesReport {
                urls: loader
                    .get_resources(&args.name)
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
                name: args.name,
            };
            let exit = if report.urls.is_empty() { 1 } else { 0 };
            if args.json {
                print_json(&report)?;
            } else if report.urls.is_empty() {
                println!("{}: not found", report.name);
            } else {
                for url in &report.urls {
                    println!("{url}");
                }
            }
            Ok(exit)
        }
        Command::Jndi(args) => {
            let container = DeployableContainer::new(config);
            container.start();
            let info = container.deploy(open_archive(&args.archive)?, test_class(&args).as_ref())?;
            let report = JndiReport {
                archive: info.archive_name().to_owned(),
                tree: info.jndi_context().tree(),
            };
            if args.json {
                print_json(&report)?;
            } else {
                print!("{}", report.tree);
            }
            Ok(0)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ContainerConfig> {
    match path {
        Some(path) => ContainerConfig::load_from_path(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => {
            let cwd = std::env::current_dir().context("failed to read the current directory")?;
            let (config, path) = oejb_config::load_for_dir(&cwd)?;
            if let Some(path) = path {
                tracing::debug!(target: "oejb.cli", config = %path.display(), "loaded config");
            }
            Ok(config)
        }
    }
}

fn open_archive(path: &Path) -> Result<Archive> {
    Archive::open(path).with_context(|| format!("failed to open archive {}", path.display()))
}

fn test_class(args: &DeployArgs) -> Option<TestClass> {
    args.test_class.as_deref().map(TestClass::new)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value)?;
    println!("{out}");
    Ok(())
}

fn print_summary(summary: &AppSummary) {
    println!("app: {} ({})", summary.module_id, summary.archive);
    println!("  standalone: {}", summary.standalone);
    for module in &summary.ejb_modules {
        let mut flags = Vec::new();
        if module.webapp {
            flags.push("webapp");
        }
        if module.test_module {
            flags.push("test");
        }
        if flags.is_empty() {
            println!("  ejb module {}", module.module_id);
        } else {
            println!("  ejb module {} [{}]", module.module_id, flags.join(", "));
        }
        if !module.enterprise_beans.is_empty() {
            println!("    beans: {}", module.enterprise_beans.join(", "));
        }
        println!("    classes: {}", module.scanned_classes);
        for url in &module.beans_urls {
            println!("    beans.xml: {url}");
        }
        for (name, source) in &module.alt_dds {
            println!("    {name}: {source}");
        }
    }
    for module in &summary.web_modules {
        println!(
            "  web module {} /{} ({} servlets)",
            module.module_id, module.context_root, module.servlets
        );
    }
    for library in &summary.additional_libraries {
        println!("  library: {}", library.display());
    }
}
