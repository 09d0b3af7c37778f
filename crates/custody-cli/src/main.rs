use custody_cli::{
    actions::{
        clear_dummy, generate_dummy, holders, interactive, list, load_config, open_service,
        recommend, register, retrieve, submit,
    },
    opts::{Command, CustodyOpts},
};

use gumdrop::Options;
use std::{io, process};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("custody_core=info,custody_cli=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let opts = CustodyOpts::parse_args_default_or_exit();

    let command = opts.command.clone().unwrap_or_else(|| {
        eprintln!("No command was provided.");
        eprintln!("{}", CustodyOpts::usage());
        process::exit(2)
    });

    let config = load_config(opts.config.as_deref())?;
    let service = open_service(&opts.data_dir, config)?;

    match command {
        Command::Register(opts) => register(&service, opts),
        Command::Submit(opts) => submit(&service, opts).await,
        Command::Interactive(opts) => {
            interactive(&service, opts, io::stdin().lock(), io::stdout()).await
        }
        Command::List(opts) => list(&service, opts),
        Command::Retrieve(opts) => retrieve(&service, opts),
        Command::Holders(opts) => holders(&service, opts),
        Command::Recommend(opts) => recommend(&service, opts),
        Command::GenerateDummy(opts) => generate_dummy(&service, opts),
        Command::ClearDummy(opts) => clear_dummy(&service, opts),
    }
}
