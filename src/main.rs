use clap::{CommandFactory, Parser, Subcommand};
use kina::AppCommand;
use kina::cli::ui::{StyleType, style_text};
use kina::core::RateError;
use kina::core::log::init_logging;
use std::process::ExitCode;

const FAILURE_EXIT: u8 = 1;
const USAGE_EXIT: u8 = 2;

#[derive(Parser)]
#[command(
    version,
    about,
    args_conflicts_with_subcommands = true,
    after_help = "Example:\n    kina usd 1999.19"
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file (also where `setup` writes it)
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,

    /// Currency code of the amount, e.g. usd
    #[arg(requires = "amount")]
    code: Option<String>,

    /// Amount in the foreign currency
    #[arg(value_parser = parse_amount)]
    amount: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// List valid currency codes
    Codes,
}

fn parse_amount(s: &str) -> Result<f64, String> {
    let amount: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a number"))?;
    if !amount.is_finite() || amount <= 0.0 {
        return Err(format!("amount must be a positive number, got {s}"));
    }
    Ok(amount)
}

/// What a parsed command line asks for.
#[derive(Debug, PartialEq)]
enum Action {
    Setup(Option<String>),
    Run(AppCommand),
    Usage,
}

fn action(cli: &Cli) -> Action {
    match (&cli.command, &cli.code, cli.amount) {
        (Some(Commands::Setup), _, _) => Action::Setup(cli.config_path.clone()),
        (Some(Commands::Codes), _, _) => Action::Run(AppCommand::Codes),
        (None, Some(code), Some(amount)) => Action::Run(AppCommand::Convert {
            code: code.clone(),
            amount,
        }),
        _ => Action::Usage,
    }
}

fn usage() -> String {
    Cli::command().render_help().to_string()
}

/// Exit code and stderr text for a failed run. Unknown codes also get the
/// usage line and a pointer to `kina codes`.
fn error_report(e: &anyhow::Error) -> (u8, String) {
    let mut message = format!("{} {e:#}", style_text("error:", StyleType::Error));

    if let Some(RateError::UnknownCode(_)) = e.downcast_ref::<RateError>() {
        message.push_str(&format!(
            "\n\n{}\n\nTo get valid currency codes, run: kina codes",
            Cli::command().render_usage()
        ));
    }
    (FAILURE_EXIT, message)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match action(&cli) {
        Action::Setup(Some(path)) => kina::cli::setup::setup_at_path(path),
        Action::Setup(None) => kina::cli::setup::setup(),
        Action::Run(command) => kina::run_command(command, cli.config_path.as_deref()).await,
        Action::Usage => {
            eprintln!("{}", usage());
            return ExitCode::from(USAGE_EXIT);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Application failed");
            let (code, message) = error_report(&e);
            eprintln!("{message}");
            ExitCode::from(code)
        }
    }
}
