use crate::{opts::*, CliError, CliResult};
use anyhow::{anyhow, Result};
use custody_core::{
    primitives::SecretId, CustodyConfig, CustodyService, JsonFile, Outbox, Session, Step,
    Submission,
};
use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufRead, Read, Write},
    path::Path,
};
use tracing::info;

pub const CUSTODIANS_FILE: &str = "custodians.json";
pub const SECRETS_FILE: &str = "secrets.json";
pub const OUTBOX_FILE: &str = "outbox.jsonl";

pub type Service = CustodyService<JsonFile, JsonFile, Outbox<File>>;

pub fn load_config(path: Option<&str>) -> CliResult<CustodyConfig> {
    match path {
        Some(path) => {
            let f = File::open(path)?;
            Ok(serde_json::from_reader(f)?)
        }
        None => Ok(CustodyConfig::default()),
    }
}

/// Opens the records kept under `data_dir`, creating the directory if needed.
pub fn open_service<P: AsRef<Path>>(data_dir: P, config: CustodyConfig) -> CliResult<Service> {
    let dir = data_dir.as_ref();
    fs::create_dir_all(dir)?;

    let outbox = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(OUTBOX_FILE))?;

    let service = CustodyService::open(
        config,
        JsonFile::new(dir.join(CUSTODIANS_FILE)),
        JsonFile::new(dir.join(SECRETS_FILE)),
        Outbox::new(outbox),
    )?;
    info!(data_dir = %dir.display(), "records loaded");
    Ok(service)
}

fn parse_secret_id(s: &str) -> CliResult<SecretId> {
    s.parse()
        .map_err(|_| CliError::InvalidSecretId(s.to_string()))
}

// drops a single trailing line ending, as left by `echo` or a terminal
fn strip_line_ending(mut bytes: Vec<u8>) -> Vec<u8> {
    if bytes.ends_with(b"\n") {
        bytes.pop();
        if bytes.ends_with(b"\r") {
            bytes.pop();
        }
    }
    bytes
}

fn print_submission<W: Write>(out: &mut W, submission: &Submission) -> io::Result<()> {
    let secret = &submission.secret;
    writeln!(out, "Your secret has been split and distributed.")?;
    writeln!(out, "Secret ID: {}", secret.secret_id)?;
    writeln!(out, "Total shares: {}", secret.total_shares)?;
    writeln!(out, "Threshold: {}", secret.threshold)?;
    writeln!(out, "Status: {}", secret.status)
}

// waits until every custodian was notified, so that nothing is lost on exit
async fn finish(submission: Submission) -> Result<()> {
    let expected = submission.report.holders.len();
    let delivered = submission.report.notifications.await?;
    if delivered < expected {
        eprintln!(
            "warning: only {} of {} custodians could be notified",
            delivered, expected
        );
    }
    Ok(())
}

pub fn register(service: &Service, opts: RegisterOpts) -> Result<()> {
    let custodian = service.register_custodian(opts.id, opts.username)?;
    println!("Registered custodian {}", custodian.id);
    Ok(())
}

pub async fn submit(service: &Service, opts: SubmitOpts) -> Result<()> {
    let secret = match opts.secret {
        Some(secret) => secret.into_bytes(),
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            strip_line_ending(buf)
        }
    };

    let submission = match (opts.shares, opts.threshold) {
        (None, None) => service.submit_secret(opts.owner, opts.owner_name, &secret)?,
        (Some(shares), Some(threshold)) => {
            service.submit_secret_with(opts.owner, opts.owner_name, &secret, shares, threshold)?
        }
        _ => return Err(anyhow!("--shares and --threshold must be given together")),
    };

    print_submission(&mut io::stdout(), &submission)?;
    finish(submission).await
}

/// Runs a [`Session`] over `input`, writing its questions to `out`, and
/// submits the secret once every answer is given. Typing `cancel` abandons
/// the submission.
pub async fn interactive<B, W>(
    service: &Service,
    opts: InteractiveOpts,
    input: B,
    mut out: W,
) -> Result<()>
where
    B: BufRead,
    W: Write,
{
    let mut session = Session::new();
    writeln!(out, "{}", session.start())?;

    for line in input.lines() {
        let line = line?;
        if line.trim() == "cancel" {
            session.cancel();
            writeln!(out, "Submission cancelled.")?;
            return Ok(());
        }

        match session.handle(&line)? {
            Step::Prompt(text) | Step::Retry(text) => writeln!(out, "{}", text)?,
            Step::Ready(request) => {
                let submission = service.submit_secret_with(
                    opts.owner,
                    opts.owner_name,
                    &request.secret,
                    request.total_shares,
                    request.threshold,
                )?;
                print_submission(&mut out, &submission)?;
                return finish(submission).await;
            }
        }
    }

    Err(CliError::Abandoned.into())
}

pub fn list(service: &Service, opts: OwnerOpts) -> Result<()> {
    let secrets = service.list_secrets(opts.owner)?;
    if secrets.is_empty() {
        println!("You have no secrets stored.");
        return Ok(());
    }

    for secret in secrets {
        println!(
            "{} ({}) {} of {} shares, {}, created {}",
            secret.secret_id,
            secret.secret_id.short(),
            secret.threshold,
            secret.total_shares,
            secret.status,
            secret.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
    }
    Ok(())
}

pub fn retrieve(service: &Service, opts: RetrieveOpts) -> Result<()> {
    let secret_id = parse_secret_id(&opts.secret_id)?;
    let secret = service.retrieve_secret(&secret_id, opts.owner)?;

    if let Some(path) = opts.output {
        fs::write(path, &secret)?;
    } else {
        let mut stdout = io::stdout();
        stdout.write_all(&secret)?;
        writeln!(stdout)?;
    }
    Ok(())
}

pub fn holders(service: &Service, opts: SecretOpts) -> Result<()> {
    let secret_id = parse_secret_id(&opts.secret_id)?;
    for (id, username) in service.secret_custodians(&secret_id, opts.owner)? {
        match username {
            Some(name) => println!("{} (@{})", id, name),
            None => println!("{}", id),
        }
    }
    Ok(())
}

pub fn recommend(service: &Service, opts: OwnerOpts) -> Result<()> {
    let available = service.available_custodians(opts.owner)?;
    let allocation = service.recommended_allocation(opts.owner)?;
    println!("Available custodians: {}", available);
    println!(
        "Recommended: {} shares, {} needed to reconstruct ({})",
        allocation.total_shares, allocation.threshold, allocation.reason
    );
    Ok(())
}

pub fn generate_dummy(service: &Service, opts: GenerateDummyOpts) -> Result<()> {
    let added = service.generate_dummy_custodians(opts.count)?;
    println!("Registered {} dummy custodians", added);
    Ok(())
}

pub fn clear_dummy(service: &Service, opts: ClearDummyOpts) -> Result<()> {
    if !opts.yes
        && !clt::confirm(
            "\nThis removes every dummy custodian and the shares they hold. Continue?",
            false,
            "\n",
            true,
        )
    {
        return Err(anyhow!("User aborted."));
    }

    let removed = service.clear_dummy_custodians()?;
    println!("Removed {} dummy custodians", removed);
    Ok(())
}
