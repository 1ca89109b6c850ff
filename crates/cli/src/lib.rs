pub mod commands;

use clap::{Parser, Subcommand};
use ratecard_core::pricing::{CustomResourceSelection, Selection, SwatTeamSelection};
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "ratecard",
    about = "Rate card operator CLI",
    long_about = "Prepare the rate card database, inspect configuration and exchange rates, and price quotes from the terminal.",
    after_help = "Examples:\n  ratecard seed\n  ratecard doctor --json\n  ratecard quotes --limit 5\n  ratecard quote custom-resource --region middle-east --role full-stack-developer --seniority advanced --currency USD"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the built-in lookup rows (idempotent, keeps edited rows)")]
    Seed,
    #[command(
        about = "Inspect effective configuration values with source attribution and redaction"
    )]
    Config,
    #[command(about = "Validate config, DB connectivity, lookup tables and exchange rate freshness")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Price a selection and print the monthly rate")]
    Quote {
        #[command(subcommand)]
        calculator: QuoteCommand,
    },
    #[command(about = "List the stored exchange rates")]
    Rates,
    #[command(about = "List stored quotes, newest first, or show one by id")]
    Quotes {
        #[arg(long, default_value_t = commands::quotes::DEFAULT_LIMIT)]
        limit: u32,
        #[arg(long, help = "Show a single stored quote")]
        id: Option<i64>,
    },
}

#[derive(Debug, Subcommand)]
enum QuoteCommand {
    #[command(about = "Role rate adjusted for region and seniority")]
    CustomResource {
        #[arg(long)]
        region: String,
        #[arg(long)]
        role: String,
        #[arg(long)]
        seniority: String,
        #[arg(long, help = "Display currency (defaults to the reference currency)")]
        currency: Option<String>,
    },
    #[command(about = "Team rate with workload, duration and SWAT discounts")]
    SwatTeam {
        #[arg(long)]
        role: String,
        #[arg(long)]
        seniority: String,
        #[arg(long)]
        workload: String,
        #[arg(long)]
        duration: String,
        #[arg(long, help = "Display currency (defaults to the reference currency)")]
        currency: Option<String>,
    },
}

impl QuoteCommand {
    fn into_selection(self) -> (Selection, Option<String>) {
        match self {
            Self::CustomResource { region, role, seniority, currency } => (
                Selection::CustomResource(CustomResourceSelection {
                    region_id: region,
                    role_id: role,
                    seniority_id: seniority,
                }),
                currency,
            ),
            Self::SwatTeam { role, seniority, workload, duration, currency } => (
                Selection::SwatTeam(SwatTeamSelection {
                    role_id: role,
                    seniority_id: seniority,
                    workload_id: workload,
                    duration_id: duration,
                }),
                currency,
            ),
        }
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Quote { calculator } => {
            let (selection, currency) = calculator.into_selection();
            commands::quote::run(selection, currency)
        }
        Command::Rates => commands::rates::run(),
        Command::Quotes { limit, id } => commands::quotes::run(limit, id),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
