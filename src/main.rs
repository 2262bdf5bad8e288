use erreur::{Context, Help, Result};
use osa_toolkit::{
    bugtriage::{self, LaunchpadClient},
    cli::{Cli, Command},
    confirm::{AssumeYes, Confirm, Interactive},
    git, maturity, release, requirements,
    role_requirements::{self, FreezeOptions},
    upstream, Config, Resolver,
};
use std::fs;
use structopt::StructOpt;

fn main() -> Result<()> {
    erreur::install_panic_handler()?;

    let args = Cli::from_args();
    setup_logging(args.verbose);

    log::debug!("{:?}", args);
    let config = Config::load(args.config.as_deref())
        .context("load configuration")
        .note("Every setting has a default, the file only needs what differs.")?;
    let confirm: Box<dyn Confirm> = if args.yes {
        Box::new(AssumeYes)
    } else {
        Box::new(Interactive)
    };

    match run(args, &config, confirm.as_ref()) {
        Err(e) if erreur::is_user_aborted(&e) => {
            eprintln!("Aborted!");
            std::process::exit(1);
        }
        res => res,
    }
}

fn run(args: Cli, config: &Config, confirm: &dyn Confirm) -> Result<()> {
    let workdir = args.workdir;

    match args.cmd {
        Command::BugTriage { statuses, order_by } => {
            let statuses: Vec<&str> = if statuses.is_empty() {
                bugtriage::DEFAULT_STATUSES.to_vec()
            } else {
                statuses.iter().map(String::as_str).collect()
            };
            let client = LaunchpadClient::new(&config.launchpad_api)?;
            for task in client.search_tasks(&config.launchpad_project, &statuses, &order_by)? {
                println!("{}", bugtriage::format_task(&task));
            }
        }
        Command::MaturityMatrix { commit } => {
            create_workdir(&workdir)?;
            let path = maturity::update_role_maturity_matrix(config, &workdir, commit)?;
            log::info!("wrote `{}`", path.display());
        }
        Command::UpdateOsReleaseFile {
            branch,
            version,
            commit,
        } => {
            let path =
                release::update_os_release_file(config, &workdir, &branch, &version, commit, confirm)?;
            log::info!("wrote `{}`", path.display());
        }
        Command::BumpUpstreamSources { message } => {
            upstream::bump_upstream_sources(config, &workdir, &config.resolver(true))?;
            println!(
                "{}",
                release::suggested_commit_message(&message.new_version, &message.release_change_id)
            );
        }
        Command::CheckGlobalRequirements => {
            let pypi = requirements::PypiClient::new(&config.pypi_url)?;
            log::info!("Displaying results");
            for report in requirements::check_global_requirement_pins(&workdir, &pypi, confirm)? {
                println!("{}", report);
            }
        }
        Command::BumpArr {
            external_roles,
            no_release_notes,
            message,
        } => {
            let options = FreezeOptions {
                external_roles,
                release_notes: !no_release_notes,
            };
            role_requirements::freeze_role_requirements(config, &workdir, options, confirm)?;
            println!(
                "{}",
                release::suggested_commit_message(&message.new_version, &message.release_change_id)
            );
        }
        Command::BumpReleaseNumber { version, commit } => {
            let new = release::bump_release_number(&workdir, &version, commit, confirm)?;
            println!("{}", new);
        }
        Command::ResolveRef {
            url,
            reference,
            no_guess,
            ordering,
        } => {
            let resolver = Resolver::new(!no_guess, ordering.unwrap_or(config.patch_ordering));
            println!("{}", git::find_latest_remote_ref(&url, &reference, &resolver)?);
        }
    }

    Ok(())
}

fn create_workdir(workdir: &std::path::Path) -> Result<()> {
    fs::create_dir_all(workdir)
        .with_context(|| format!("create work directory `{}`", workdir.display()))
}

fn setup_logging(verbose: bool) {
    let mut log = pretty_env_logger::formatted_timed_builder();
    log.target(env_logger::Target::Stderr);

    if verbose {
        log.filter(None, log::LevelFilter::Info)
            .filter(Some("osa_toolkit"), log::LevelFilter::Debug)
            .filter(Some("osa"), log::LevelFilter::Debug);
    } else {
        log.filter(None, log::LevelFilter::Warn)
            .filter(Some("osa_toolkit"), log::LevelFilter::Info)
            .filter(Some("osa"), log::LevelFilter::Info);
    }

    if let Ok(s) = std::env::var("RUST_LOG") {
        log.parse_filters(&s);
    }

    log.init();
}
