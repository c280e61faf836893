use std::io::{self, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use expense_core::{
    register, AuthError, ClientConfig, ConfigError, CredentialPolicy, LoginForm, Session,
    SignupForm,
};

mod shell;
mod transport;

use transport::UreqTransport;

/// Terminal client for the expense tracker API.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Base URL of the API, e.g. http://127.0.0.1:4000/api/v1. Overrides EXPENSE_API_URL.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// How the session credential is carried: "cookie" or "bearer". Overrides EXPENSE_CREDENTIAL.
    #[arg(long, global = true)]
    credential: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an account. The password is prompted for.
    Signup {
        #[arg(long)]
        fullname: String,

        #[arg(long)]
        email: String,
    },
    /// Sign in and open the interactive expense dashboard.
    Dashboard {
        #[arg(long)]
        email: String,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("could not read from the terminal: {0}")]
    Io(#[from] io::Error),
}

fn main() -> ExitCode {
    setup_logging();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("\x1b[31;1m{error}\x1b[0m");
            ExitCode::FAILURE
        }
    }
}

/// Log to stderr so shell output on stdout stays clean. `RUST_LOG` overrides the default.
fn setup_logging() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("expense_cli=warn,expense_core=warn")),
        )
        .init();
}

fn load_config(args: &Args) -> Result<ClientConfig, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &args.api_url {
        config = config.with_base_url(url)?;
    }
    if let Some(credential) = &args.credential {
        config.credential = credential.parse::<CredentialPolicy>().map_err(ConfigError::from)?;
    }
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn run(args: Args) -> Result<(), CliError> {
    let config = load_config(&args)?;
    let transport = UreqTransport::new();

    match args.command {
        Command::Signup { fullname, email } => {
            let password = rpassword::prompt_password("Password: ")?;
            let confirm_password = rpassword::prompt_password("Confirm password: ")?;
            let form = SignupForm {
                fullname,
                email,
                password,
                confirm_password,
            };
            register(&config, &transport, &form)?;
            println!("Account created. Sign in with `expenses dashboard --email {}`.", form.email);
        }
        Command::Dashboard { email } => {
            let password = rpassword::prompt_password("Password: ")?;
            let form = LoginForm { email, password };
            let session = Session::sign_in(&config, transport, &form)?;

            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut out = io::stdout().lock();
            let exit = shell::run(session, &mut input, &mut out)?;
            tracing::info!(?exit, "shell closed");
            out.flush()?;
        }
    }
    Ok(())
}
