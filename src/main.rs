//! Thin CLI layer: parse args, styled output, and call into nodelinks-core.
//! Crash-proof: panic caught and reported; all errors return Result.

mod ui;

use std::env;
use std::path::PathBuf;

use clap::{Arg, ArgAction, ArgMatches, Command};
use colored::Colorize;
use nodelinks_core::catalog::looks_like_address;
use nodelinks_core::error_handling::utils::{config_error, io_error, usage_error};
use nodelinks_core::{
    create_link, probe, rank, remove_link, Catalog, LinkOutcome, ListOutcome, NodelinksError,
    NpmBackend, Prompt, Resolved, Selector, SettingsStore, StdinPrompt,
};

use ui::{dim, error, info, success, warning};

type CliResult = Result<(), NodelinksError>;

fn packages_arg() -> Arg {
    Arg::new("package")
        .required(true)
        .num_args(1..)
        .action(ArgAction::Append)
        .help("Package spec(s), e.g. lodash or react@18")
}

fn cli() -> Command {
    Command::new("nodelinks")
        .version(env!("CARGO_PKG_VERSION"))
        .about("One shared node_modules for many projects, with npm mirror ranking")
        .after_help(
            "Examples:\n  nodelinks install lodash\n  nodelinks create\n  nodelinks test-repo\n  nodelinks set-repo tencent\n  nodelinks change-repo",
        )
        .subcommand(Command::new("welcome").about("Show the welcome banner"))
        .subcommand(Command::new("show").about("Show the current settings"))
        .subcommand(
            Command::new("remove-settings")
                .visible_alias("rs")
                .alias("removeSettings")
                .about("Delete settings.json; the next command re-initializes"),
        )
        .subcommand(
            Command::new("reinit")
                .about("Re-run setup, or only change the shared path when one is given")
                .arg(Arg::new("path").required(false).help("New shared dependency path")),
        )
        .subcommand(
            Command::new("set-repo")
                .alias("setRepo")
                .about("Set the npm registry by catalog index, alias, or address")
                .arg(Arg::new("source").required(true).help("Index, alias, or registry address")),
        )
        .subcommand(
            Command::new("test-repo")
                .visible_alias("trp")
                .alias("testRepo")
                .about("Measure latency of one mirror, or of all when no target is given")
                .arg(Arg::new("target").required(false).help("Index, alias, or address; omit or `all` for every mirror")),
        )
        .subcommand(
            Command::new("change-repo")
                .visible_alias("crp")
                .alias("changeRepo")
                .about("Rank mirrors and pick one interactively, or check a single target")
                .arg(Arg::new("target").required(false).help("Index, alias, or address")),
        )
        .subcommand(Command::new("create").about("Link ./node_modules to the shared store"))
        .subcommand(Command::new("del").about("Remove the ./node_modules link (never a real directory)"))
        .subcommand(
            Command::new("install")
                .visible_alias("i")
                .about("Install packages into the shared store")
                .arg(packages_arg()),
        )
        .subcommand(
            Command::new("uninstall")
                .visible_aliases(["ui", "remove", "rm"])
                .about("Uninstall packages from the shared store")
                .arg(packages_arg()),
        )
        .subcommand(
            Command::new("reinstall")
                .visible_alias("ri")
                .about("Uninstall then install packages in the shared store")
                .arg(packages_arg()),
        )
        .subcommand(
            Command::new("list")
                .visible_alias("l")
                .about("List top-level packages of the shared store"),
        )
}

fn packages(m: &ArgMatches) -> Vec<String> {
    m.get_many::<String>("package")
        .map(|v| v.cloned().collect())
        .unwrap_or_default()
}

fn current_dir() -> Result<PathBuf, NodelinksError> {
    env::current_dir().map_err(|e| io_error("read current directory", None, e))
}

fn welcome() {
    if ui::use_color() {
        println!("{} {}", "nodelinks".bright_cyan().bold(), env!("CARGO_PKG_VERSION"));
    } else {
        println!("nodelinks {}", env!("CARGO_PKG_VERSION"));
    }
    dim("One shared node_modules for many projects.");
    dim("\nRun `nodelinks --help` for details.");
}

async fn dispatch(matches: ArgMatches) -> CliResult {
    let home = nodelinks_core::tool_home();
    let catalog = Catalog::load_or_init(&home).await?;
    let store = SettingsStore::new(&home);
    let mut prompt = StdinPrompt;

    match matches.subcommand() {
        Some(("show", _)) => {
            let settings = store.load(&mut prompt, &catalog).await?;
            let json = serde_json::to_string_pretty(&settings)
                .map_err(|e| config_error("show settings", None, e))?;
            info(&format!("Settings ({}):", store.path().display()));
            println!("{}", json);
        }
        Some(("remove-settings", _)) => {
            if store.remove().await? {
                success("Settings removed; the next command will re-initialize.");
            } else {
                dim("No settings file to remove.");
            }
        }
        Some(("reinit", m)) => match m.get_one::<String>("path") {
            Some(path) => {
                let mut settings = store.load(&mut prompt, &catalog).await?;
                settings.folder_path = PathBuf::from(path);
                let saved = store.save(&settings, &catalog).await?;
                success(&format!("Shared path set to {}", saved.folder_path.display()));
            }
            None => {
                store.remove().await?;
                let settings = store.initialize(&mut prompt, &catalog).await?;
                success(&format!(
                    "Initialized: {} via {}",
                    settings.folder_path.display(),
                    settings.repo
                ));
            }
        },
        Some(("set-repo", m)) => {
            let source = m.get_one::<String>("source").map(String::as_str).unwrap_or_default();
            let address = match catalog.resolve_input(source) {
                Resolved::All => {
                    return Err(usage_error("set-repo needs a mirror index, alias, or address"));
                }
                Resolved::Custom => {
                    return Err(usage_error(
                        "the custom entry has no address; pass the registry address itself",
                    ));
                }
                Resolved::Address(a) => a,
            };
            if !looks_like_address(&address) {
                warning(&format!("\"{}\" is not a known alias; saving it as an address.", address));
            }
            let mut settings = store.load(&mut prompt, &catalog).await?;
            settings.repo = address;
            let saved = store.save(&settings, &catalog).await?;
            success(&format!("Registry set to {}", saved.repo));
        }
        Some(("test-repo", m)) => {
            let settings = store.load(&mut prompt, &catalog).await?;
            let target = m.get_one::<String>("target").map(String::as_str).unwrap_or_default();
            match catalog.resolve_input(target) {
                Resolved::All => {
                    let sp = ui::spinner("Measuring mirror latency...");
                    let ranking = rank::rank_all(&catalog, settings.mirror_timeout).await;
                    ui::finish(sp);
                    ui::print_ranking(&ranking);
                }
                Resolved::Custom => {
                    warning("The custom entry has no address; pass the registry address to test it.");
                }
                Resolved::Address(address) => {
                    let sp = ui::spinner(&format!("Probing {}...", address));
                    let result = probe(&address, settings.mirror_timeout).await;
                    ui::finish(sp);
                    ui::print_probe(&result);
                }
            }
        }
        Some(("change-repo", m)) => {
            let mut settings = store.load(&mut prompt, &catalog).await?;
            let target = m.get_one::<String>("target").map(String::as_str).unwrap_or_default();
            let choice = match catalog.resolve_input(target) {
                Resolved::Address(address) => {
                    let sp = ui::spinner(&format!("Probing {}...", address));
                    let result = probe(&address, settings.mirror_timeout).await;
                    ui::finish(sp);
                    ui::print_probe(&result);
                    if result.is_ok() {
                        let answer = prompt.ask(&format!("Use {} as the registry? (y/n): ", address))?;
                        answer.eq_ignore_ascii_case("y").then_some(address)
                    } else {
                        warning(&format!("{} did not answer; not offering it as the registry.", address));
                        None
                    }
                }
                Resolved::All | Resolved::Custom => {
                    let sp = ui::spinner("Measuring mirror latency...");
                    let ranking = rank::rank_all(&catalog, settings.mirror_timeout).await;
                    ui::finish(sp);
                    Selector::new(&ranking.entries).run(&mut prompt)?
                }
            };
            match choice {
                Some(address) => {
                    settings.repo = address;
                    let saved = store.save(&settings, &catalog).await?;
                    success(&format!("Registry set to {}", saved.repo));
                }
                None => dim("Registry unchanged."),
            }
        }
        Some(("create", _)) => {
            let settings = store.load(&mut prompt, &catalog).await?;
            let project = current_dir()?;
            match create_link(&project, &settings.folder_path).await? {
                LinkOutcome::Created { link, target } => {
                    success(&format!("Linked {} -> {}", link.display(), target.display()));
                }
                LinkOutcome::AlreadyLinked { link } => {
                    info(&format!("{} is already a link; nothing to do.", link.display()));
                }
            }
        }
        Some(("del", _)) => match remove_link(&current_dir()?).await? {
            Some(link) => success(&format!("Removed link {}", link.display())),
            None => dim("No node_modules link here; nothing to remove."),
        },
        Some(("install", m)) => {
            let settings = store.load(&mut prompt, &catalog).await?;
            NpmBackend::new(&settings).install(&packages(m)).await?;
            success("Install finished.");
        }
        Some(("uninstall", m)) => {
            let settings = store.load(&mut prompt, &catalog).await?;
            NpmBackend::new(&settings).uninstall(&packages(m)).await?;
            success("Uninstall finished.");
        }
        Some(("reinstall", m)) => {
            let settings = store.load(&mut prompt, &catalog).await?;
            NpmBackend::new(&settings).reinstall(&packages(m)).await?;
            success("Reinstall finished.");
        }
        Some(("list", _)) => {
            let settings = store.load(&mut prompt, &catalog).await?;
            let backend = NpmBackend::new(&settings);
            match backend.list().await? {
                ListOutcome::Packages(pkgs) if pkgs.is_empty() => {
                    dim(&format!("No top-level packages in {}", backend.store().display()));
                }
                ListOutcome::Packages(pkgs) => {
                    info(&format!("Top-level packages in {}:", backend.store().display()));
                    for (i, pkg) in pkgs.iter().enumerate() {
                        println!("  {}. {}", i + 1, pkg);
                    }
                }
                ListOutcome::Unparseable(preview) => {
                    warning("Could not parse the npm list output.");
                    dim(&preview);
                }
            }
        }
        _ => welcome(),
    }
    Ok(())
}

fn run() -> CliResult {
    let matches = cli().get_matches();
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_error("start runtime", None, e))?;
    runtime.block_on(dispatch(matches))
}

fn main() {
    if !ui::use_color() {
        colored::control::set_override(false);
    }

    let code = match std::panic::catch_unwind(run) {
        Ok(Ok(())) => 0,
        Ok(Err(e)) => {
            nodelinks_core::utils::trace(&format!("ERROR {}", e));
            error(&e.to_string());
            e.exit_code()
        }
        Err(_) => {
            error("An unexpected error occurred. Please report this issue.");
            1
        }
    };
    std::process::exit(code);
}
