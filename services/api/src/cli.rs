use crate::inspect::{run_inspect, InspectArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use emri::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Early Math Risk Identifier",
    about = "Serve the EMRI questionnaire or inspect questionnaire schemas",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Work with questionnaire schema exports offline
    Schema {
        #[command(subcommand)]
        command: SchemaCommand,
    },
}

#[derive(Subcommand, Debug)]
enum SchemaCommand {
    /// Parse a local schema file and print the resulting question model
    Inspect(InspectArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Schema {
            command: SchemaCommand::Inspect(args),
        } => run_inspect(args),
    }
}
