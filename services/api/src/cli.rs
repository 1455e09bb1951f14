use crate::commands::{run_predict, run_train, PredictArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use neuroguard::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "NeuroGuard",
    about = "Serve and manage the NeuroGuard mental state predictor",
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
    /// Train or query the mental state model without starting the server
    Model {
        #[command(subcommand)]
        command: ModelCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ModelCommand {
    /// Retrain from the dataset and overwrite the model artifact
    Train,
    /// Score a JSON object of feature values
    Predict(PredictArgs),
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
        Command::Model {
            command: ModelCommand::Train,
        } => run_train(),
        Command::Model {
            command: ModelCommand::Predict(args),
        } => run_predict(args),
    }
}
