use anyhow::Result;
use contracts_core::VerificationContext;
use contracts_validator::ContractVerification;
use std::path::PathBuf;
use tracing::info;

use crate::config::{self, DataSourceConfig};
use crate::output::{self, OutputFormat};

pub struct VerifyArgs {
    pub contracts: Vec<PathBuf>,
    pub data_source: Option<PathBuf>,
    pub vars: Vec<String>,
    pub strict: bool,
    pub format: OutputFormat,
}

pub async fn execute(args: VerifyArgs) -> Result<()> {
    info!(contracts = args.contracts.len(), strict = args.strict, "Verifying contracts");

    let context = VerificationContext::new()
        .with_variables(config::variables(&args.vars)?)
        .with_strict(args.strict);
    let mut verification = ContractVerification::new().with_context(context);

    match DataSourceConfig::resolve(args.data_source.as_deref())? {
        Some(config) => {
            if args.format == OutputFormat::Text {
                output::print_info(&format!(
                    "Data source '{}' with {} table(s)",
                    config.name,
                    config.tables.len()
                ));
            }
            verification = verification.with_data_source(config.connect().await?);
        }
        None => output::print_error(&format!(
            "No data source configured, pass --data-source or set {}",
            config::DATA_SOURCE_ENV
        )),
    }

    for contract in args.contracts {
        verification = verification.with_contract_file(contract);
    }

    let report = verification.execute().await;
    output::print_report(&report, args.format)?;

    if !report.is_ok() {
        std::process::exit(1);
    }

    Ok(())
}
