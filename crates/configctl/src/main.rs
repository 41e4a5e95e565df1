mod cli;
mod logging;

use crate::cli::{Cli, Cmd, ScopeArg};
use app_config::{
    AppConfiguration, ConfigurationFacade, Field, FieldValue, StartupOptions, open_file_stores,
};
use certificate::{CancelToken, CertificateManager, ProvisionOutcome};
use clap::Parser;
use color_eyre::eyre::{WrapErr, bail, eyre};
use color_eyre::{Report, Result};
use paths::ScopeDirs;
use settings::ConfigScope;
use std::str::FromStr;
use strum::IntoEnumIterator;
use tracing::error;

type Facade = ConfigurationFacade;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let dirs = match &cli.config_dir {
        Some(dir) => ScopeDirs::with_base_path(dir),
        None => ScopeDirs::platform(),
    };
    let reset = std::env::var(StartupOptions::RESET_ENV_VAR).ok();
    let startup = StartupOptions::from_env_value(reset.as_deref(), cli.no_reset);

    let (system, user) = open_file_stores(&dirs).wrap_err("failed to open settings files")?;
    let mut facade = ConfigurationFacade::open(
        Box::new(system),
        Box::new(user),
        CertificateManager::default(),
        dirs,
        startup,
    )?;
    let config = load(&mut facade)?;

    match cli.cmd {
        Cmd::Show { toml, client } => show(&config, toml, client)?,
        Cmd::Set { field, value } => set(&mut facade, config, &field, &value)?,
        Cmd::Scope { scope } => scope_cmd(&mut facade, scope)?,
        Cmd::EnsureCert => ensure_cert(&mut facade)?,
        Cmd::RegenCert { yes, key_length } => regen_cert(&mut facade, yes, key_length)?,
        Cmd::CertInfo => cert_info(&facade)?,
    }
    Ok(())
}

fn load(facade: &mut Facade) -> Result<AppConfiguration> {
    facade.load().map_err(|err| {
        if err.is_fatal() {
            error!("{err}");
            Report::new(err).wrap_err("settings are unavailable, refusing to continue")
        } else {
            Report::new(err)
        }
    })
}

fn show(config: &AppConfiguration, as_toml: bool, client_mode: bool) -> Result<()> {
    if as_toml {
        print!("{}", toml::to_string_pretty(&config.values)?);
        return Ok(());
    }

    let read_only = if config.is_writable() { "" } else { " (read-only)" };
    println!("scope: {}{read_only}", config.active_scope());
    for field in Field::iter() {
        let status = if config.is_field_locked(field) {
            "locked"
        } else if !config.is_field_writable(field) {
            "read-only"
        } else if !config.is_field_enabled(field, client_mode) {
            "disabled"
        } else {
            ""
        };
        println!(
            "{:<24} {:<32} {status}",
            field.lock_name(),
            config.get(field).to_string()
        );
    }

    let cert = config.certificate();
    match (cert.exists, cert.key_length) {
        (false, _) => println!("certificate: {} (missing)", cert.path.display()),
        (true, Some(bits)) => println!("certificate: {} ({bits} bit)", cert.path.display()),
        (true, None) => println!("certificate: {} (unreadable)", cert.path.display()),
    }
    Ok(())
}

fn set(facade: &mut Facade, mut config: AppConfiguration, field: &str, value: &str) -> Result<()> {
    let field = Field::from_str(field).map_err(|_| eyre!("unknown field {field:?}"))?;
    let value = FieldValue::parse(field, value).map_err(|msg| eyre!("{field}: {msg}"))?;

    config.set(field, value)?;
    let changed = facade.commit(&config)?;
    facade.sync()?;
    if changed.is_empty() {
        println!("{field} unchanged");
        return Ok(());
    }
    println!("{field} = {}", config.get(field));

    if !changed.iter().any(|f| f.is_tls()) || !config.values.tls_enabled {
        return Ok(());
    }
    report_provision(facade.persist_certificate_if_absent()?);

    let wanted = config.values.tls_key_length;
    if let Some(on_file) = facade
        .certificate_descriptor()?
        .key_length
        .filter(|bits| *bits != wanted)
    {
        println!(
            "note: the certificate on disk has {on_file} bit and its length wins on the next start; \
             run `configctl regen-cert --yes --key-length {wanted}` to replace it"
        );
    }
    Ok(())
}

fn scope_cmd(facade: &mut Facade, scope: Option<ScopeArg>) -> Result<()> {
    let Some(scope) = scope else {
        for label in facade.scope_labels() {
            let marker = if facade.requested_scope() == label.scope {
                "*"
            } else {
                " "
            };
            println!("{marker} {:<28} {}", label.label, label.tooltip);
        }
        return Ok(());
    };

    let requested = match scope {
        ScopeArg::System => ConfigScope::System,
        ScopeArg::User => ConfigScope::User,
    };
    let config = facade.set_scope(requested)?;
    if config.active_scope() == requested {
        println!("active scope: {requested}");
    } else {
        println!(
            "active scope: {} ({requested} settings are read-only)",
            config.active_scope()
        );
    }
    Ok(())
}

fn ensure_cert(facade: &mut Facade) -> Result<()> {
    report_provision(facade.persist_certificate_if_absent()?);
    Ok(())
}

fn report_provision(outcome: ProvisionOutcome) {
    match outcome {
        ProvisionOutcome::AlreadyPresent(path) => {
            println!("certificate present: {}", path.display())
        }
        ProvisionOutcome::Generated(cert) => {
            println!("certificate created: {}", cert.path.display());
            println!("fingerprint (SHA-256): {}", cert.fingerprint);
        }
    }
}

fn regen_cert(facade: &mut Facade, confirmed: bool, key_length: Option<u32>) -> Result<()> {
    if !confirmed {
        bail!("regenerating invalidates the fingerprint every peer trusts; re-run with --yes");
    }
    let cert = facade.regenerate_certificate(key_length, &CancelToken::new())?;
    facade.sync()?;
    println!("certificate regenerated: {} ({} bit)", cert.path.display(), cert.key_length);
    println!("fingerprint (SHA-256): {}", cert.fingerprint);
    println!("all clients must trust the new fingerprint before they can connect again");
    Ok(())
}

fn cert_info(facade: &Facade) -> Result<()> {
    let descriptor = facade.certificate_descriptor()?;
    println!("path:        {}", descriptor.path.display());
    if !descriptor.exists {
        println!("status:      missing");
        return Ok(());
    }
    match descriptor.key_length {
        Some(bits) => println!("key length:  {bits} bit"),
        None => println!("key length:  unreadable"),
    }
    match facade.certificate_fingerprint() {
        Ok(fingerprint) => println!("fingerprint: {fingerprint}"),
        Err(err) => println!("fingerprint: unavailable ({err})"),
    }
    Ok(())
}
