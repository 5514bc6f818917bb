use crate::cli::{exit_status, CliContext};
use crate::constants;
use crate::core::audit_log::AuditEvent;
use crate::core::keyring::BoundKeyring;
use crate::core::keyring_store;
use crate::error::Error;
use crate::models::role::Role;
use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Table};
use dialoguer::{Confirm, Password};
use std::io::Read;
use std::process::ExitCode;
use zeroize::Zeroizing;

#[derive(Subcommand, Debug)]
pub enum KeyringCommand {
    /// List every role with its keyring path and presence
    List,
    /// Exit 0 if the role's keyring exists, 1 otherwise
    Present(RoleArgs),
    /// Print the canonical keyring path of a role
    Path(RoleArgs),
    /// Show principal and capabilities of a stored keyring
    Show(ShowArgs),
    /// Generate the role's keyring unless one exists
    Create(CreateArgs),
    /// Store keyring text read from stdin unless one exists
    Write(RoleArgs),
    /// Build the role's keyring around a known secret unless one exists
    WriteSecret(SecretArgs),
    /// Delete the role's keyring
    Remove(RemoveArgs),
}

impl KeyringCommand {
    pub fn is_mutating(&self) -> bool {
        matches!(
            self,
            KeyringCommand::Create(_)
                | KeyringCommand::Write(_)
                | KeyringCommand::WriteSecret(_)
                | KeyringCommand::Remove(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            KeyringCommand::List => "keyring list",
            KeyringCommand::Present(_) => "keyring present",
            KeyringCommand::Path(_) => "keyring path",
            KeyringCommand::Show(_) => "keyring show",
            KeyringCommand::Create(_) => "keyring create",
            KeyringCommand::Write(_) => "keyring write",
            KeyringCommand::WriteSecret(_) => "keyring write-secret",
            KeyringCommand::Remove(_) => "keyring remove",
        }
    }
}

#[derive(Args, Debug)]
pub struct RoleArgs {
    /// admin, mon, osd, mds or rgw
    pub role: String,
}

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub role: String,

    /// Print the secret key as well
    #[arg(long)]
    pub reveal: bool,
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    pub role: String,

    /// Import the secret read from stdin instead of generating one
    #[arg(long)]
    pub secret_from_stdin: bool,
}

#[derive(Args, Debug)]
pub struct SecretArgs {
    pub role: String,

    /// Read secret from stdin instead of interactive prompt
    #[arg(long)]
    pub from_stdin: bool,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    pub role: String,

    /// Skip confirmation
    #[arg(long)]
    pub yes: bool,
}

pub fn run(ctx: &CliContext, cmd: KeyringCommand) -> Result<ExitCode> {
    let done = match cmd {
        KeyringCommand::Present(args) => return run_present(ctx, args),
        KeyringCommand::List => run_list(ctx),
        KeyringCommand::Path(args) => run_path(ctx, args),
        KeyringCommand::Show(args) => run_show(ctx, args),
        KeyringCommand::Create(args) => run_create(ctx, args),
        KeyringCommand::Write(args) => run_write(ctx, args),
        KeyringCommand::WriteSecret(args) => run_write_secret(ctx, args),
        KeyringCommand::Remove(args) => run_remove(ctx, args),
    };
    done.map(|()| ExitCode::SUCCESS)
}

fn run_list(ctx: &CliContext) -> Result<()> {
    let identity = ctx.identity()?;
    let manager = ctx.keyrings();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Role").add_attribute(Attribute::Bold),
        Cell::new("Principal").add_attribute(Attribute::Bold),
        Cell::new("Path").add_attribute(Attribute::Bold),
        Cell::new("Present").add_attribute(Attribute::Bold),
    ]);

    for role in Role::ALL {
        let (path, present) = match manager.bind(role, &identity) {
            Ok(keyring) => (
                keyring.path().display().to_string(),
                if keyring.present() { "yes" } else { "no" }.to_string(),
            ),
            // mon needs a host name; show why instead of failing the listing
            Err(e) => ("-".to_string(), e.to_string()),
        };
        table.add_row(vec![
            role.name().to_string(),
            role.principal().to_string(),
            path,
            present,
        ]);
    }

    println!("{}", table);
    Ok(())
}

fn run_present(ctx: &CliContext, args: RoleArgs) -> Result<ExitCode> {
    Ok(exit_status(check_present(ctx, &args)?))
}

fn check_present(ctx: &CliContext, args: &RoleArgs) -> Result<bool> {
    let identity = ctx.identity()?;
    let manager = ctx.keyrings();
    let keyring = manager.bind_name(&args.role, &identity)?;
    let present = keyring.present();
    let label = if present { "present" } else { "absent" };
    println!("{}: {}", label, keyring.path().display());
    Ok(present)
}

fn run_path(ctx: &CliContext, args: RoleArgs) -> Result<()> {
    let identity = ctx.identity()?;
    let manager = ctx.keyrings();
    let keyring = manager.bind_name(&args.role, &identity)?;
    println!("{}", keyring.path().display());
    Ok(())
}

fn run_show(ctx: &CliContext, args: ShowArgs) -> Result<()> {
    let identity = ctx.identity()?;
    let manager = ctx.keyrings();
    let keyring = manager.bind_name(&args.role, &identity)?;
    let text = Zeroizing::new(keyring.read()?);
    let stanza = keyring_store::decode(&text)?;

    println!("path: {}", keyring.path().display());
    println!("principal: {}", stanza.principal);
    match (&stanza.key, args.reveal) {
        (Some(key), true) => println!("key: {}", key),
        (Some(_), false) => println!("key: <hidden, use --reveal>"),
        (None, _) => println!("key: <none>"),
    }
    if stanza.caps.is_empty() {
        println!("caps: none");
    } else {
        println!("caps:");
        for (subsystem, permission) in &stanza.caps {
            println!("  {} = \"{}\"", subsystem, permission);
        }
    }
    if stanza.principal != keyring.principal() {
        println!(
            "warning: expected principal {} for role {}",
            keyring.principal(),
            keyring.role()
        );
    }
    Ok(())
}

fn run_create(ctx: &CliContext, args: CreateArgs) -> Result<()> {
    let identity = ctx.identity()?;
    let manager = ctx.keyrings();
    let keyring = manager.bind_name(&args.role, &identity)?;

    let secret = if args.secret_from_stdin {
        Some(read_stdin("secret", constants::MAX_KEYRING_SIZE)?)
    } else {
        None
    };
    let existed = keyring.present();
    let result = keyring.create(secret.as_deref().map(|s| s.as_str()));
    audit(ctx, "keyring-create", &keyring, identity.cluster_name.as_deref(), &result);
    result?;

    if existed {
        println!("Kept existing {} keyring at {}", keyring.role(), keyring.path().display());
    } else {
        println!("Created {} keyring at {}", keyring.role(), keyring.path().display());
    }
    Ok(())
}

fn run_write(ctx: &CliContext, args: RoleArgs) -> Result<()> {
    let identity = ctx.identity()?;
    let manager = ctx.keyrings();
    let keyring = manager.bind_name(&args.role, &identity)?;

    let content = read_stdin("keyring", constants::MAX_KEYRING_SIZE)?;
    if content.trim().is_empty() {
        bail!("no keyring text on stdin");
    }
    // refuse text that is not a keyring at all
    keyring_store::decode(&content)?;

    let existed = keyring.present();
    let result = keyring.write_content(&content);
    audit(ctx, "keyring-write", &keyring, identity.cluster_name.as_deref(), &result);
    result?;
    report_write(&keyring, existed);
    Ok(())
}

fn run_write_secret(ctx: &CliContext, args: SecretArgs) -> Result<()> {
    if ctx.non_interactive && !args.from_stdin {
        bail!("--non-interactive requires --from-stdin for write-secret");
    }
    let identity = ctx.identity()?;
    let manager = ctx.keyrings();
    let keyring = manager.bind_name(&args.role, &identity)?;

    let existed = keyring.present();
    let secret = if existed {
        // nothing will be written; don't ask for a secret
        None
    } else if args.from_stdin {
        Some(read_stdin("secret", constants::MAX_KEYRING_SIZE)?)
    } else {
        Some(Zeroizing::new(
            Password::new()
                .with_prompt(format!("Secret for {}", keyring.principal()))
                .allow_empty_password(false)
                .interact()
                .context("read secret from prompt")?,
        ))
    };

    let result = if existed {
        keyring.write_secret(None)
    } else {
        keyring.write_secret(secret.as_deref().map(|s| s.as_str()))
    };
    audit(ctx, "keyring-write-secret", &keyring, identity.cluster_name.as_deref(), &result);
    result?;
    report_write(&keyring, existed);
    Ok(())
}

fn run_remove(ctx: &CliContext, args: RemoveArgs) -> Result<()> {
    let identity = ctx.identity()?;
    let manager = ctx.keyrings();
    let keyring = manager.bind_name(&args.role, &identity)?;

    if !keyring.present() {
        println!("No {} keyring at {}", keyring.role(), keyring.path().display());
        return Ok(());
    }
    if !args.yes {
        if ctx.non_interactive {
            bail!("--non-interactive requires --yes for remove");
        }
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete {}?", keyring.path().display()))
            .default(false)
            .interact()
            .context("read confirmation")?;
        if !confirmed {
            println!("Aborted.");
            return Ok(());
        }
    }

    let result = keyring.remove();
    audit(ctx, "keyring-remove", &keyring, identity.cluster_name.as_deref(), &result);
    result?;
    println!("Deleted {}", keyring.path().display());
    Ok(())
}

fn report_write(keyring: &BoundKeyring<'_>, existed: bool) {
    if existed {
        println!("Kept existing {} keyring at {}", keyring.role(), keyring.path().display());
    } else {
        println!("Wrote {} keyring to {}", keyring.role(), keyring.path().display());
    }
}

fn audit<T>(
    ctx: &CliContext,
    action: &str,
    keyring: &BoundKeyring<'_>,
    cluster: Option<&str>,
    result: &std::result::Result<T, Error>,
) {
    let mut event = AuditEvent::new(action, keyring.role().name())
        .cluster(cluster)
        .target(keyring.path());
    if let Err(e) = result {
        event = event.failed(e);
    }
    ctx.audit(event);
}

fn read_stdin(what: &str, max: usize) -> Result<Zeroizing<String>> {
    let mut buf = Zeroizing::new(String::new());
    std::io::stdin()
        .take(max as u64 + 1)
        .read_to_string(&mut buf)
        .with_context(|| format!("read {} from stdin", what))?;
    if buf.len() > max {
        bail!("{} exceeds maximum size ({} bytes)", what, max);
    }
    Ok(buf)
}
