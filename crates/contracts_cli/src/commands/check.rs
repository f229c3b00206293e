use anyhow::{Result, anyhow};
use contracts_core::{DiagnosticsLog, VerificationContext};
use contracts_parser::parse_file;
use contracts_sql::dialect_for;
use contracts_validator::{CheckTypeRegistry, Contract, ContractVerification};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

use crate::config;
use crate::output::{self, OutputFormat};

pub async fn execute(
    contracts: &[PathBuf],
    dialect: Option<&str>,
    vars: &[String],
    format: OutputFormat,
) -> Result<()> {
    info!(contracts = contracts.len(), "Checking contracts");

    let variables = config::variables(vars)?;
    let registry = CheckTypeRegistry::with_defaults();
    let log = DiagnosticsLog::new();

    let mut parsed = Vec::new();
    for path in contracts {
        let root = match parse_file(path, &variables, &log) {
            Ok(Some(root)) => root,
            Ok(None) => continue,
            Err(err) => {
                log.error(err.to_string(), None);
                continue;
            }
        };
        match Contract::parse(&root, &registry, &log) {
            Ok(contract) => parsed.push(contract),
            Err(err) => log.error(err.to_string(), err.location()),
        }
    }

    let compiled = match dialect {
        Some(name) => {
            let dialect = dialect_for(name).ok_or_else(|| anyhow!("Unknown dialect '{}'", name))?;
            let mut verification = ContractVerification::new()
                .with_context(VerificationContext::new().with_variables(variables.clone()));
            for path in contracts {
                verification = verification.with_contract_file(path);
            }
            Some(verification.compile_sql(dialect.as_ref()).await)
        }
        None => None,
    };

    let diagnostics = log.sorted();
    match format {
        OutputFormat::Json => {
            let contracts_json: Vec<_> = parsed
                .iter()
                .map(|contract| {
                    json!({
                        "source": contract.source,
                        "dataset": contract.dataset.to_string(),
                        "data_source": contract.data_source,
                        "checks": contract
                            .checks
                            .iter()
                            .map(|check| {
                                let header = check.header();
                                json!({
                                    "type": header.type_name,
                                    "name": header.name,
                                    "column": header.column_name(),
                                    "location": header.location,
                                })
                            })
                            .collect::<Vec<_>>(),
                    })
                })
                .collect();
            output::print_json(&json!({
                "contracts": contracts_json,
                "diagnostics": diagnostics,
                "statements": compiled.as_ref().map(|compiled| &compiled.statements),
            }))?;
        }
        OutputFormat::Text => {
            for contract in &parsed {
                output::print_info(&format!(
                    "{}: dataset {} with {} check(s)",
                    contract.source,
                    contract.dataset,
                    contract.checks.len()
                ));
                for check in &contract.checks {
                    let header = check.header();
                    match header.column_name() {
                        Some(column) => println!(
                            "  - {} on '{}' ({})",
                            header.type_name, column, header.location
                        ),
                        None => println!("  - {} ({})", header.type_name, header.location),
                    }
                }
            }
            output::print_diagnostics(&diagnostics);
            if let Some(compiled) = &compiled {
                output::print_compiled_sql(compiled);
            }
        }
    }

    if diagnostics.iter().any(|diagnostic| diagnostic.is_error()) {
        if format == OutputFormat::Text {
            output::print_error("Contracts have errors");
        }
        std::process::exit(1);
    }
    if format == OutputFormat::Text {
        output::print_success("Contracts are valid");
    }

    Ok(())
}
