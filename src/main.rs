use std::process::ExitCode;
use tracing::{error, info};

use pfs_verify::{HarnessConfig, IsolationVerifier, VerificationReport};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    pfs_verify::init_tracing()?;

    dotenvy::dotenv().ok();

    let config = match HarnessConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            println!("{}", pfs_verify::Verdict::Fail);
            return Ok(ExitCode::FAILURE);
        }
    };
    info!(
        "Verifying {} ({} strategy, mount root {}, timeout {}s)",
        config.launcher.display(),
        config.strategy,
        config.probe.mount_root.display(),
        config.timeout_secs
    );

    let verifier = match IsolationVerifier::from_config(&config, |key| std::env::var(key).ok()) {
        Ok(verifier) => verifier,
        Err(e) => {
            error!("Precondition failed: {}", e);
            let report = VerificationReport::rejected(
                config.strategy,
                config.launcher.to_string_lossy(),
                &e,
            );
            println!("{}", report.render(config.report));
            return Ok(ExitCode::FAILURE);
        }
    };

    let report = verifier.run().await;
    println!("{}", report.render(config.report));

    Ok(ExitCode::from(report.verdict.exit_code()))
}
