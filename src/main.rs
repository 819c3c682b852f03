use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use console::Term;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use shopfloor::actions::TimerActions;
use shopfloor::cli::{Cli, Command, TeamCommand, TimerCommand};
use shopfloor::config::ShopfloorConfig;
use shopfloor::error::{ShopfloorError, WriteError};
use shopfloor::feed::PollingFeed;
use shopfloor::roles::{Module, Role};
use shopfloor::store::RestRowStore;
use shopfloor::ui;
use shopfloor::view::{Applied, ViewController, drive};

fn init_tracing(verbose: bool, json: bool) {
    let default = if verbose {
        "shopfloor=debug"
    } else {
        "shopfloor=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn connect(config: &ShopfloorConfig) -> Result<RestRowStore> {
    let base_url = config.require_backend()?.to_string();
    let store = RestRowStore::with_timeouts(
        base_url,
        config.api_key.clone(),
        config.connect_timeout(),
        config.request_timeout(),
    )?;
    Ok(store)
}

async fn board(store: &RestRowStore) -> Result<()> {
    let mut controller = ViewController::new();
    let spinner = ui::FetchProgress::start("Loading shop floor");
    let applied = controller.refresh(store).await;
    spinner.finish();

    if applied == Applied::Failed {
        ui::print_notices(&controller.take_notices());
        anyhow::bail!("could not load the shop floor");
    }
    print!("{}", ui::render_board(controller.snapshots(), Utc::now()));
    Ok(())
}

async fn watch(store: RestRowStore, config: &ShopfloorConfig) -> Result<()> {
    let store = Arc::new(store);
    let feed = PollingFeed::new(Arc::clone(&store), config.poll_interval());
    let mut controller = ViewController::mount(&feed)?;
    let term = Term::stdout();

    info!(interval_ms = config.poll_interval_ms, "watching shop floor");
    drive(
        store.as_ref(),
        &mut controller,
        async {
            let _ = tokio::signal::ctrl_c().await;
        },
        |view| {
            let mut header = ui::render_status_line(view.state(), view.refreshed_at());
            if let Some(notice) = view.notices().last() {
                header.push_str(&format!("  ! {}", notice.message));
            }
            let board = ui::render_board(view.snapshots(), Utc::now());
            if let Err(err) = ui::redraw(&term, &header, &board) {
                debug!(error = %err, "redraw failed");
            }
        },
    )
    .await;
    Ok(())
}

async fn act(store: &RestRowStore, command: Command) -> Result<()> {
    let actions = TimerActions::new(store);
    let (label, result): (String, Result<(), WriteError>) = match command {
        Command::Timer { action } => match action {
            TimerCommand::Start { workstation, order } => (
                format!("start timer on {workstation}"),
                actions.start(workstation, order).await,
            ),
            TimerCommand::Pause { timer } => {
                (format!("pause {timer}"), actions.pause(timer).await)
            }
            TimerCommand::Resume { timer } => {
                (format!("resume {timer}"), actions.resume(timer).await)
            }
            TimerCommand::Stop { timer } => (format!("stop {timer}"), actions.stop(timer).await),
        },
        Command::Log { timer, units } => (
            format!("log {units} units on {timer}"),
            actions.log_progress(timer, units).await,
        ),
        Command::Team { action } => match action {
            TeamCommand::Add { timer, employee } => (
                format!("add {employee} to {timer}"),
                actions.add_team_member(timer, employee).await,
            ),
            TeamCommand::Remove { timer, employee } => (
                format!("remove {employee} from {timer}"),
                actions.remove_team_member(timer, employee).await,
            ),
        },
        Command::Board | Command::Watch | Command::Modules => return Ok(()),
    };
    ui::print_write_result(&label, &result);
    result.map_err(ShopfloorError::from)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let config = match &cli.config {
        Some(path) => ShopfloorConfig::load_from(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ShopfloorConfig::load()?,
    };
    let role: Role = match &cli.role {
        Some(name) => name.parse()?,
        None => config.role()?,
    };
    debug!(%role, "resolved role");

    if cli.command.needs_shop_floor() && !role.can_access(Module::ShopFloor) {
        return Err(ShopfloorError::AccessDenied {
            role,
            module: Module::ShopFloor,
        }
        .into());
    }

    match cli.command {
        Command::Modules => {
            print!("{}", ui::render_modules(role));
            Ok(())
        }
        Command::Board => board(&connect(&config)?).await,
        Command::Watch => watch(connect(&config)?, &config).await,
        command => act(&connect(&config)?, command).await,
    }
}
