use std::process::ExitCode;

use oci_injector_hook::activation::ProcEnvironment;
use oci_injector_hook::config::DirectorySource;
use oci_injector_hook::settings::Settings;

/// Entry point of the OCI injector hook.
///
/// The container runtime invokes the binary at a lifecycle hook and passes the
/// container state on stdin. Feature configs are read from
/// `OCI_INJECTOR_CONFIG_DIR` (default `/etc/oci-injector-hook`).
///
/// Exits with `0` on success, `1` if the hook could not run at all and `2` if
/// some resources could not be injected.
///
/// # Examples
///
/// ```bash
/// DEBUG=true OCI_INJECTOR_CONFIG_DIR=./hooks.d oci-injector-hook < state.json
/// ```
fn main() -> ExitCode {
    let settings = Settings::from_env();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(settings.log_filter()),
    )
    .init();
    log::debug!("oci-injector-hook: starting with {:?}", settings);

    let configs = DirectorySource::new(&settings.config_dir);
    let environment = ProcEnvironment::new(&settings.proc_path);

    match oci_injector_hook::run_hook(std::io::stdin().lock(), &configs, &environment) {
        Ok(report) => {
            log::debug!("oci-injector-hook: injected {} paths", report.total());
            ExitCode::SUCCESS
        }
        Err(err) => {
            log::error!("oci-injector-hook: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}
