use std::io::{self, BufRead, Write};

use anyhow::{Context, anyhow};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, instrument, warn};

use crate::cli::Invocation;
use crate::config::Config;
use crate::controller::{Dashboard, TaskForm};
use crate::datetime::parse_due_input;
use crate::projection::FilterState;
use crate::render::Renderer;
use crate::task::Priority;

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "dashboard",
        "list",
        "add",
        "modify",
        "toggle",
        "delete",
        "stats",
        "help",
        "version",
    ]
}

pub fn expand_command_abbrev<'a>(token: &'a str, known: &[&'a str]) -> Option<&'a str> {
    if known.contains(&token) {
        return Some(token);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

#[instrument(skip(dashboard, cfg, renderer, inv))]
pub async fn dispatch(
    dashboard: &mut Dashboard,
    cfg: &Config,
    renderer: &mut Renderer,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Utc::now();
    dashboard.filters = FilterState::parse(&inv.filter_terms)?;

    debug!(
        command = %inv.command,
        filter = ?inv.filter_terms,
        args = ?inv.command_args,
        "dispatching command"
    );

    match inv.command.as_str() {
        "dashboard" => cmd_dashboard(dashboard, renderer, now).await,
        "list" => cmd_list(dashboard, renderer, now).await,
        "add" => cmd_add(dashboard, &inv.command_args, now).await,
        "modify" => cmd_modify(dashboard, &inv.command_args, now).await,
        "toggle" => cmd_toggle(dashboard, &inv.command_args).await,
        "delete" => cmd_delete(dashboard, cfg, &inv.command_args).await,
        "stats" => cmd_stats(dashboard, renderer).await,
        "help" => {
            print_help();
            Ok(())
        }
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(dashboard, renderer, now))]
async fn cmd_dashboard(
    dashboard: &mut Dashboard,
    renderer: &mut Renderer,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command dashboard");

    dashboard.load().await;
    renderer.print_stats(&dashboard.stats)?;
    println!();
    renderer.print_task_table(&dashboard.projected(), dashboard.tasks.len(), now)?;

    // A failed initial fetch leaves a usable empty dashboard.
    if let Some(message) = dashboard.take_error() {
        renderer.print_banner(&message)?;
    }
    Ok(())
}

#[instrument(skip(dashboard, renderer, now))]
async fn cmd_list(
    dashboard: &mut Dashboard,
    renderer: &mut Renderer,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command list");

    dashboard.load().await;
    renderer.print_task_table(&dashboard.projected(), dashboard.tasks.len(), now)?;

    if let Some(message) = dashboard.take_error() {
        renderer.print_banner(&message)?;
    }
    Ok(())
}

#[instrument(skip(dashboard, args, now))]
async fn cmd_add(
    dashboard: &mut Dashboard,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command add");

    let (title_words, mods) = parse_form_mods(args, now)?;
    if title_words.is_empty() {
        return Err(anyhow!("add: title is required"));
    }

    dashboard.open_create();
    dashboard.form.title = title_words.join(" ");
    apply_form_mods(&mut dashboard.form, &mods);

    if dashboard.submit_form().await {
        let id = dashboard.tasks.first().map(|t| t.id).unwrap_or_default();
        println!("Created task {id}.");
        Ok(())
    } else {
        Err(banner_error(dashboard, "Failed to create task"))
    }
}

#[instrument(skip(dashboard, args, now))]
async fn cmd_modify(
    dashboard: &mut Dashboard,
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    info!("command modify");

    let id = parse_task_id(args, "modify")?;

    dashboard.load().await;
    if let Some(message) = dashboard.take_error() {
        return Err(anyhow!(message));
    }
    if !dashboard.open_edit(id) {
        return Err(anyhow!("task {id} is not in the current task list"));
    }

    let (title_words, mods) = parse_form_mods(&args[1..], now)?;
    if !title_words.is_empty() {
        dashboard.form.title = title_words.join(" ");
    }
    apply_form_mods(&mut dashboard.form, &mods);

    if dashboard.submit_form().await {
        println!("Updated task {id}.");
        Ok(())
    } else {
        Err(banner_error(dashboard, "Failed to update task"))
    }
}

#[instrument(skip(dashboard, args))]
async fn cmd_toggle(dashboard: &mut Dashboard, args: &[String]) -> anyhow::Result<()> {
    info!("command toggle");

    let id = parse_task_id(args, "toggle")?;

    dashboard.load().await;
    if let Some(message) = dashboard.take_error() {
        return Err(anyhow!(message));
    }

    if dashboard.toggle_completed(id).await {
        let completed = dashboard
            .tasks
            .iter()
            .find(|t| t.id == id)
            .is_some_and(|t| t.completed);
        if completed {
            println!("Completed task {id}.");
        } else {
            println!("Reopened task {id}.");
        }
        Ok(())
    } else {
        Err(banner_error(dashboard, "Failed to update task"))
    }
}

#[instrument(skip(dashboard, cfg, args))]
async fn cmd_delete(
    dashboard: &mut Dashboard,
    cfg: &Config,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command delete");

    let id = parse_task_id(args, "delete")?;

    let needs_confirmation = cfg.get_bool("confirmation").unwrap_or(true);
    if needs_confirmation && !confirm(&format!("Permanently delete task {id}? (y/N) "))? {
        println!("Task not deleted.");
        return Ok(());
    }

    dashboard.load().await;
    if let Some(message) = dashboard.take_error() {
        return Err(anyhow!(message));
    }

    if dashboard.delete(id).await {
        println!("Deleted task {id}.");
        Ok(())
    } else {
        Err(banner_error(dashboard, "Failed to delete task"))
    }
}

#[instrument(skip(dashboard, renderer))]
async fn cmd_stats(dashboard: &mut Dashboard, renderer: &mut Renderer) -> anyhow::Result<()> {
    info!("command stats");

    dashboard.load().await;
    renderer.print_stats(&dashboard.stats)?;

    if let Some(message) = dashboard.take_error() {
        renderer.print_banner(&message)?;
    }
    Ok(())
}

pub fn print_help() {
    println!("usage: td [filter terms] <command> [args]");
    println!();
    println!("filter terms: search words, status:pending|completed|all,");
    println!("              priority:low|medium|high|all, sort:FIELD[+|-]");
    println!();
    println!("commands:");
    println!("  dashboard          stats plus the filtered task list (default)");
    println!("  list               the filtered task list");
    println!("  add <title> [mods] create a task");
    println!("  modify <id> [mods] edit a task (mods: title words, desc:, priority:, due:)");
    println!("  toggle <id>        flip a task's completion");
    println!("  delete <id>        delete a task (asks for confirmation)");
    println!("  stats              server-side aggregate counts");
    println!("  help, version");
}

fn parse_task_id(args: &[String], command: &str) -> anyhow::Result<u64> {
    let raw = args
        .first()
        .ok_or_else(|| anyhow!("{command}: task id is required"))?;
    raw.parse::<u64>()
        .map_err(|_| anyhow!("{command}: invalid task id: {raw}"))
}

fn banner_error(dashboard: &mut Dashboard, fallback: &str) -> anyhow::Error {
    anyhow!(
        dashboard
            .take_error()
            .unwrap_or_else(|| fallback.to_string())
    )
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt}");
    io::stdout().flush().context("failed to flush stdout")?;

    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read confirmation")?;

    Ok(matches!(
        answer.trim().to_ascii_lowercase().as_str(),
        "y" | "yes"
    ))
}

#[derive(Debug, Clone)]
enum FormMod {
    Description(String),
    Priority(Priority),
    Due(Option<NaiveDate>),
}

/// Split command args into bare title words and `key:value` modifiers.
/// A literal `--` makes everything after it part of the title.
#[instrument(skip(args, now))]
fn parse_form_mods(
    args: &[String],
    now: DateTime<Utc>,
) -> anyhow::Result<(Vec<String>, Vec<FormMod>)> {
    let mut title_words = Vec::new();
    let mut mods = Vec::new();

    let mut literal = false;
    for arg in args {
        if arg == "--" {
            literal = true;
            continue;
        }

        if !literal && let Some(one_mod) = parse_one_mod(arg, now)? {
            mods.push(one_mod);
            continue;
        }

        title_words.push(arg.clone());
    }

    Ok((title_words, mods))
}

fn parse_one_mod(tok: &str, now: DateTime<Utc>) -> anyhow::Result<Option<FormMod>> {
    let Some((key, value)) = tok.split_once(':') else {
        return Ok(None);
    };

    match key.to_ascii_lowercase().as_str() {
        "desc" | "description" => Ok(Some(FormMod::Description(value.to_string()))),
        "pri" | "priority" => {
            let priority = Priority::parse(value)
                .ok_or_else(|| anyhow!("invalid priority: {value}"))?;
            Ok(Some(FormMod::Priority(priority)))
        }
        "due" => Ok(Some(FormMod::Due(parse_due_input(value, now)?))),
        _ => {
            warn!(token = %tok, "unrecognized modifier treated as title text");
            Ok(None)
        }
    }
}

fn apply_form_mods(form: &mut TaskForm, mods: &[FormMod]) {
    for one_mod in mods {
        match one_mod {
            FormMod::Description(text) => form.description = text.clone(),
            FormMod::Priority(priority) => form.priority = *priority,
            FormMod::Due(date) => form.due_date = *date,
        }
    }
}
