use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{ArgAction, Parser, Subcommand};

use crate::model::stats::Stats;
use crate::model::work_item::{SourceKind, WorkItem};
use crate::rank::{apply_filter, Filter};
use crate::service::{IssuesView, TodoService};
use crate::store::overrides::RankChange;

/// Merge the issues and pull requests assigned to you across trackers.
#[derive(Debug, Parser)]
#[command(name = "todo-merger", version)]
pub struct Cli {
    /// Path to the config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log more (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log file used by the interactive dashboard
    #[arg(long, global = true)]
    pub logfile: Option<PathBuf>,

    /// Without a command the interactive dashboard starts
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the ranked list of work items
    List {
        /// Refetch from all sources instead of using the cache
        #[arg(long)]
        no_cache: bool,
        /// Only show items on the todo list
        #[arg(long)]
        todo: bool,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Set the rank of an item; repeating the same rank resets it
    Rank {
        id: String,
        /// pin, high, normal or low
        rank: String,
    },
    /// Toggle whether an item is on the todo list
    Todo { id: String },
    /// Mark items as seen
    Seen {
        ids: Vec<String>,
        /// Mark every current item as seen
        #[arg(long, conflicts_with_all = ["ids", "reset"])]
        all: bool,
        /// Forget all seen items
        #[arg(long, conflicts_with = "ids")]
        reset: bool,
    },
    /// Drop the cache timestamp so the next view refetches
    Reload,
    /// List the labels of the personal todo repository
    Labels,
    /// Create a task in the personal todo repository
    Add {
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,
        /// Label to attach (repeatable)
        #[arg(short, long = "label")]
        labels: Vec<String>,
    },
}

pub async fn run(command: Command, service: &TodoService) -> Result<()> {
    match command {
        Command::List { no_cache, todo, json } => {
            if !service.has_sources() {
                bail!("No services configured. Add [services.<name>] sections to the config file");
            }
            let view = service.get_issues_and_stats(!no_cache).await;
            let filter = if todo { Filter::TodoList } else { Filter::All };
            if json {
                print_json(&view, filter)?;
            } else {
                print_list(&view, filter);
            }
        }
        Command::Rank { id, rank } => match service.set_ranking(&id, &rank)? {
            RankChange::Set(rank) => println!("{id}: rank set to {}", rank.as_str()),
            RankChange::Reset => println!("{id}: rank reset to normal"),
        },
        Command::Todo { id } => {
            if service.toggle_todo(&id)? {
                println!("{id}: added to todo list");
            } else {
                println!("{id}: removed from todo list");
            }
        }
        Command::Seen { ids, all, reset } => {
            if reset {
                service.reset_seen()?;
                println!("Seen items reset");
                return Ok(());
            }
            let ids = if all {
                service.get_issues_and_stats(true).await.new_ids
            } else {
                ids
            };
            let added = service.mark_seen(&ids)?;
            println!("Marked {added} item(s) as seen");
        }
        Command::Reload => {
            service.invalidate_cache().await;
            println!("Cache invalidated; the next view refetches");
        }
        Command::Labels => {
            for label in service.get_labels().await? {
                if label.color.is_empty() {
                    println!("{}", label.name);
                } else {
                    println!("{} ({})", label.name, label.color);
                }
            }
        }
        Command::Add { title, labels } => {
            let title = title.join(" ");
            let url = service.create_item(&title, &labels).await?;
            println!("Created: {title}");
            println!("  {url}");
        }
    }
    Ok(())
}

fn print_json(view: &IssuesView, filter: Filter) -> Result<()> {
    let items = apply_filter(view.items.clone(), filter);
    let out = serde_json::json!({
        "items": items,
        "stats": view.stats,
        "new_ids": view.new_ids,
        "from_cache": view.from_cache,
        "fetched_at": view.fetched_at,
        "warnings": view.warnings,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn print_list(view: &IssuesView, filter: Filter) {
    for warning in &view.warnings {
        eprintln!("warning: {warning}");
    }
    for item in apply_filter(view.items.clone(), filter) {
        println!("{}", format_item_line(&item, view.is_new(&item.id)));
    }
    println!();
    println!("{}", format_stats(&view.stats));
}

/// One line per item: markers, reference, title and secondary fields.
pub fn format_item_line(item: &WorkItem, is_new: bool) -> String {
    let new = if is_new { '*' } else { ' ' };
    let todo = if item.todolist { '✓' } else { ' ' };
    let rank = match item.rank_name() {
        Some("normal") => String::new(),
        Some(name) => format!("[{name}] "),
        None => format!("[{}] ", item.rank),
    };
    let kind = if item.pull { " [PR]" } else { "" };

    let mut line = format!("{new}{todo} {rank}{} {}{kind}", item.reference, item.title);
    let extras: Vec<String> = [
        (!item.assignee_users.is_empty()).then(|| item.assignee_users.clone()),
        (!item.due_date.is_empty()).then(|| format!("due {}", item.due_date)),
        (!item.milestone_title.is_empty()).then(|| format!("milestone {}", item.milestone_title)),
        (!item.epic_title.is_empty()).then(|| format!("epic {}", item.epic_title)),
        Some(item.updated_at_display.clone()).filter(|s| !s.is_empty()),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !extras.is_empty() {
        line.push_str(&format!("  ({})", extras.join(", ")));
    }
    line.push_str(&format!("  {}", item.id));
    line
}

pub fn format_stats(stats: &Stats) -> String {
    let sources: Vec<String> = SourceKind::ALL
        .iter()
        .filter(|s| stats.source_count(**s) > 0)
        .map(|s| format!("{} {}", s.display_name(), stats.source_count(*s)))
        .collect();
    let mut line = format!(
        "{} items ({} issues, {} pull requests)",
        stats.total, stats.issues, stats.pulls
    );
    if !sources.is_empty() {
        line.push_str(&format!(" | {}", sources.join(", ")));
    }
    line.push_str(&format!(
        " | {} with due date, {} with milestone, {} with epic",
        stats.due_dates_total, stats.milestones_total, stats.epics_total
    ));
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::work_item::Rank;
    use chrono::Utc;

    fn item() -> WorkItem {
        let mut item = WorkItem::new("github-42".into(), SourceKind::GitHub, "Fix login".into(), Utc::now());
        item.reference = "org/repo#42".into();
        item.updated_at_display = "2 days ago".into();
        item
    }

    #[test]
    fn parse_no_command_starts_dashboard() {
        let cli = Cli::try_parse_from(["todo-merger", "-vv"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn parse_rank_command() {
        let cli = Cli::try_parse_from(["todo-merger", "rank", "github-1", "pin"]).unwrap();
        match cli.command {
            Some(Command::Rank { id, rank }) => {
                assert_eq!(id, "github-1");
                assert_eq!(rank, "pin");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parse_add_with_labels() {
        let cli = Cli::try_parse_from([
            "todo-merger", "add", "Buy", "milk", "-l", "errand", "--label", "home",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Add { title, labels }) => {
                assert_eq!(title.join(" "), "Buy milk");
                assert_eq!(labels, ["errand", "home"]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn parse_add_requires_title() {
        assert!(Cli::try_parse_from(["todo-merger", "add"]).is_err());
    }

    #[test]
    fn parse_seen_all_conflicts_with_ids() {
        assert!(Cli::try_parse_from(["todo-merger", "seen", "--all", "github-1"]).is_err());
        assert!(Cli::try_parse_from(["todo-merger", "seen", "--all"]).is_ok());
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["todo-merger", "list", "--json", "-c", "/tmp/c.toml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.toml")));
    }

    #[test]
    fn item_line_shows_markers_and_fields() {
        let mut item = item();
        item.rank = Rank::Pin.value();
        item.todolist = true;
        item.pull = true;
        item.assignee_users = "Me, bob".into();
        item.due_date = "2024-02-01".into();
        let line = format_item_line(&item, true);
        assert!(line.starts_with("*✓ [pin] org/repo#42 Fix login [PR]"));
        assert!(line.contains("Me, bob"));
        assert!(line.contains("due 2024-02-01"));
        assert!(line.ends_with("github-42"));
    }

    #[test]
    fn normal_rank_has_no_badge() {
        let line = format_item_line(&item(), false);
        assert!(line.starts_with("   org/repo#42 Fix login  (2 days ago)"));
    }

    #[test]
    fn stats_line_lists_present_sources() {
        let mut stats = Stats::default();
        stats.total = 3;
        stats.issues = 2;
        stats.pulls = 1;
        stats.per_source.insert(SourceKind::GitLab, 3);
        let line = format_stats(&stats);
        assert!(line.starts_with("3 items (2 issues, 1 pull requests) | GitLab 3 |"));
        assert!(!line.contains("GitHub"));
    }
}
