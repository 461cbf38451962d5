//! OCI runtime hook injecting host resources into containers.
//!
//! The container runtime starts the hook with the container state on stdin. The
//! hook loads every feature config, checks each config's activation flag
//! against the container process environment and copies the declared devices,
//! binaries, libraries, directories and other paths of every active feature
//! into the container root filesystem.
//!
//! Configs are processed in name order, so when two features declare the same
//! destination the feature whose name sorts last wins.
use std::collections::HashMap;
use std::io::Read;
use std::path::PathBuf;

use activation::EnvironmentSource;
use config::{Category, ConfigSource, ConfigStore};
use inject::{InjectionReport, Injector};
use state::ContainerState;

pub mod activation;
pub mod bundle;
pub mod config;
pub mod error;
pub mod inject;
pub mod settings;
pub mod state;

pub use error::{Error, Result};

/// Runs one hook invocation.
///
/// Reads the container state from `input`, loads all configs from `configs` and
/// injects every active feature into the bundle root filesystem. The target
/// environment is only read if at least one config carries an activation flag.
///
/// # Returns
///
/// The report of all injected paths if every path succeeded.
///
/// # Errors
///
/// - State, config, bundle and environment errors abort before anything is injected.
/// - [`Error::Injection`] if any path failed; all other paths were still injected.
pub fn run_hook(
    input: impl Read,
    configs: &impl ConfigSource,
    environment: &impl EnvironmentSource,
) -> Result<InjectionReport> {
    let state = ContainerState::from_reader(input)?;
    log::debug!("state.ociVersion={}", state.oci_version());
    log::debug!("state.id={}", state.id());
    log::debug!("state.status={}", state.status());
    log::debug!("state.pid={:?}", state.pid());
    log::debug!("state.bundle={}", state.bundle().display());
    log::debug!("state.annotations={:?}", state.annotations());

    let store = ConfigStore::load(configs)?;
    for config in store.iter() {
        log::debug!(
            "configs[{}].activation_flag={:?}",
            config.name(),
            config.activation_flag().map(|f| f.as_ref())
        );
        for category in Category::ALL {
            log::debug!(
                "configs[{}].{}={:?}",
                config.name(),
                category,
                config.paths(category)
            );
        }
    }

    let bundle = bundle::Bundle::open(state.bundle())?;

    let env = if store.needs_environment() {
        let pid = state
            .pid()
            .ok_or_else(|| activation::Error::MissingPid(state.id().to_owned()))?;
        environment.environment(pid)?
    } else {
        Vec::new()
    };

    let injector = Injector::new(bundle.rootfs());
    let mut claimed: HashMap<PathBuf, String> = HashMap::new();
    let mut report = InjectionReport::default();

    for config in store.iter() {
        if config.activation_flag().is_none() {
            log::debug!("feature `{}` has no activation flag, skipping", config.name());
            continue;
        }
        if !activation::is_active(config.activation_flag(), &env) {
            log::debug!("feature `{}` is not active", config.name());
            continue;
        }
        log::debug!(
            "feature `{}` is active, injecting {} paths",
            config.name(),
            config.path_count()
        );

        let feature_report = injector.inject(config);
        for injected in feature_report.injected() {
            let previous = claimed
                .insert(injected.destination.clone(), config.name().to_owned())
                .filter(|previous| previous != config.name());
            if let Some(previous) = previous {
                log::warn!(
                    "feature `{}` overwrites `{}` injected by feature `{}`",
                    config.name(),
                    injected.destination.display(),
                    previous
                );
            }
        }
        report.merge(feature_report);
    }

    log::debug!(
        "injected {} of {} paths into container `{}`",
        report.injected().len(),
        report.total(),
        state.id()
    );

    if !report.is_success() {
        return Err(Error::Injection {
            failed: report.failures().len(),
            total: report.total(),
        });
    }

    Ok(report)
}
