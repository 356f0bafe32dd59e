use std::path::PathBuf;

use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};

use railroad::cli::{self, GraphSelection, OutputFormat, ViewOptions};
use railroad::client::FilterQuery;
use railroad::downtime::DowntimeScope;
use railroad::render::RangePreset;
use railroad::store::{ServiceState, SortKey};

#[derive(Debug, Parser)]
#[command(name = "railroad")]
#[command(about = "Browse, zoom and page through monitoring graphs from the terminal")]
struct App {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load graphs for a filter or snapshot and print one page
    Show {
        #[command(flatten)]
        select: SelectArgs,
        #[command(flatten)]
        view: ViewArgs,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Print a page and keep refreshing live graphs
    Watch {
        #[command(flatten)]
        select: SelectArgs,
        #[command(flatten)]
        view: ViewArgs,
        /// Seconds between refreshes (default: [refresh] interval_secs)
        #[arg(long)]
        interval: Option<u64>,
        /// Stop after this many refreshes
        #[arg(long)]
        count: Option<usize>,
    },
    /// Store the selected graph set server-side and print its link
    Permalink {
        #[command(flatten)]
        select: SelectArgs,
        /// Description saved with the link
        #[arg(long)]
        description: Option<String>,
    },
    /// Schedule or cancel downtime
    Downtime {
        #[command(subcommand)]
        action: DowntimeAction,
    },
    /// Inspect or edit client-local state (preferences, saved forms)
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },
    /// Show or edit configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show recent activity journal entries
    History {
        /// Number of entries to show
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
        /// Output format: table (default), json, csv
        #[arg(long, default_value = "table")]
        format: String,
    },
}

#[derive(Debug, Subcommand)]
enum DowntimeAction {
    /// Schedule downtime for the selected graphs
    Schedule {
        #[command(flatten)]
        select: SelectArgs,
        /// Only target rows in these states (comma separated)
        #[arg(long, value_delimiter = ',')]
        state: Vec<String>,
        /// Cover whole hosts instead of single services
        #[arg(long)]
        hosts: bool,
        /// Start: epoch seconds, RFC 3339 or "YYYY-MM-DD HH:MM" (UTC)
        #[arg(long)]
        from: Option<String>,
        /// End: same formats as --from
        #[arg(long)]
        to: Option<String>,
        /// Reason shown on the monitoring server
        #[arg(long, default_value = "")]
        comment: String,
    },
    /// Cancel a downtime by the code printed when it was scheduled
    Cancel { code: String },
}

#[derive(Debug, Subcommand)]
enum PrefsAction {
    /// Print all saved values
    Show,
    /// Print one value (`form.field` or a top-level key)
    Get { key: String },
    /// Set a value; JSON values are parsed, anything else is a string
    Set { key: String, value: String },
    /// Remove one value
    Delete { key: String },
    /// Remove everything
    Clear,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Show the effective configuration
    Show,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Set a value, e.g. `backend.url http://nagios:8000`
    Set { key: String, value: String },
    /// Reset the global config file to defaults
    Reset,
}

#[derive(Debug, Args)]
struct SelectArgs {
    #[arg(long, default_value = "")]
    host: String,
    #[arg(long, default_value = "")]
    service: String,
    #[arg(long, default_value = "")]
    group: String,
    /// Free-text search
    #[arg(long, default_value = "")]
    search: String,
    /// Load descriptors from a saved snapshot instead of a filter
    #[arg(long)]
    snapshot: Option<PathBuf>,
    /// Sort by service, host, status or duration
    #[arg(long)]
    sort: Option<String>,
    /// Reverse the sort order
    #[arg(long)]
    reverse: bool,
    /// Initial window: day, week, month, year or reset
    #[arg(long)]
    range: Option<String>,
}

#[derive(Debug, Args)]
struct ViewArgs {
    /// Page number (1-based)
    #[arg(long, default_value = "1")]
    page: usize,
    /// Graphs per page (default: saved preference, then config)
    #[arg(long)]
    per_page: Option<usize>,
    /// Apply zoom and ranges to every graph at once
    #[arg(long)]
    sync: bool,
    /// Only print rows in these states (comma separated)
    #[arg(long, value_delimiter = ',')]
    state: Vec<String>,
}

impl SelectArgs {
    fn into_selection(self) -> Result<GraphSelection> {
        let sort = self
            .sort
            .as_deref()
            .map(|name| SortKey::from_name(name).ok_or_else(|| anyhow!("unknown sort key '{name}'")))
            .transpose()?;
        let range = self
            .range
            .as_deref()
            .map(|name| RangePreset::from_name(name).ok_or_else(|| anyhow!("unknown range '{name}'")))
            .transpose()?;
        Ok(GraphSelection {
            query: FilterQuery {
                host: self.host,
                service: self.service,
                group: self.group,
                search: self.search,
            },
            snapshot: self.snapshot,
            sort,
            reverse: self.reverse,
            range,
        })
    }
}

impl ViewArgs {
    fn into_options(self) -> Result<ViewOptions> {
        Ok(ViewOptions {
            page: self.page,
            per_page: self.per_page,
            sync: self.sync,
            states: parse_states(&self.state)?,
        })
    }
}

fn parse_states(names: &[String]) -> Result<Vec<ServiceState>> {
    names
        .iter()
        .map(|name| {
            ServiceState::from_name(name.trim()).ok_or_else(|| anyhow!("unknown state '{name}'"))
        })
        .collect()
}

fn main() -> Result<()> {
    let app = App::parse();

    match app.command {
        Commands::Show {
            select,
            view,
            format,
        } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_show(&select.into_selection()?, &view.into_options()?, fmt)
        }
        Commands::Watch {
            select,
            view,
            interval,
            count,
        } => cli::run_watch(
            &select.into_selection()?,
            &view.into_options()?,
            interval,
            count,
        ),
        Commands::Permalink {
            select,
            description,
        } => cli::run_permalink(&select.into_selection()?, description.as_deref()),
        Commands::Downtime { action } => match action {
            DowntimeAction::Schedule {
                select,
                state,
                hosts,
                from,
                to,
                comment,
            } => {
                let scope = if hosts {
                    DowntimeScope::Host
                } else {
                    DowntimeScope::Service
                };
                cli::run_downtime_schedule(
                    &select.into_selection()?,
                    &parse_states(&state)?,
                    scope,
                    from.as_deref(),
                    to.as_deref(),
                    &comment,
                )
            }
            DowntimeAction::Cancel { code } => cli::run_downtime_cancel(&code),
        },
        Commands::Prefs { action } => match action {
            PrefsAction::Show => cli::run_prefs_show(),
            PrefsAction::Get { key } => cli::run_prefs_get(&key),
            PrefsAction::Set { key, value } => cli::run_prefs_set(&key, &value),
            PrefsAction::Delete { key } => cli::run_prefs_delete(&key),
            PrefsAction::Clear => cli::run_prefs_clear(),
        },
        Commands::Config { action } => match action {
            ConfigAction::Show => cli::run_config_show(),
            ConfigAction::Init { force } => cli::run_config_init(force),
            ConfigAction::Set { key, value } => cli::run_config_set(&key, &value),
            ConfigAction::Reset => cli::run_config_reset(),
        },
        Commands::History { limit, format } => {
            let fmt = OutputFormat::from_str_opt(Some(&format));
            cli::run_history(limit, fmt)
        }
    }
}
