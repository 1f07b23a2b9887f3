// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Simple CLI for formula evaluation
//!
//! Evaluates, parses and validates formulas from the command line.

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use octofhir_formula::{EvaluateOptions, Expression, Value, parse};
use std::process;

#[derive(Parser)]
#[command(name = "octofhir-formula")]
#[command(about = "Evaluate formula expressions from the command line")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a formula
    Evaluate {
        /// Formula to evaluate
        expression: String,
        /// Parameter as name=value; the value is read as JSON, else as a string
        #[arg(short, long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,
        /// Evaluate once per element of the list parameters
        #[arg(long)]
        iterate: bool,
        /// Match parameter and function names case-insensitively
        #[arg(long)]
        ignore_case: bool,
        /// Bypass the expression cache
        #[arg(long)]
        no_cache: bool,
        /// Pretty-print JSON output
        #[arg(long)]
        pretty: bool,
    },
    /// Parse a formula and print its canonical form
    Parse {
        /// Formula to parse
        expression: String,
    },
    /// Validate formula syntax
    Validate {
        /// Formula to validate
        expression: String,
    },
}

fn main() {
    // Setup human-panic for better error messages
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let outcome = match cli.command {
        Commands::Evaluate {
            expression,
            params,
            iterate,
            ignore_case,
            no_cache,
            pretty,
        } => {
            let mut options = EvaluateOptions::empty();
            options.set(EvaluateOptions::ITERATE_PARAMETERS, iterate);
            options.set(EvaluateOptions::IGNORE_CASE, ignore_case);
            options.set(EvaluateOptions::NO_CACHE, no_cache);
            handle_evaluate(&expression, &params, options, pretty)
        }
        Commands::Parse { expression } => handle_parse(&expression),
        Commands::Validate { expression } => handle_validate(&expression),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.init();
}

/// Split `name=value`, reading the value as JSON and falling back to a string
fn parse_param(param: &str) -> Result<(String, Value)> {
    let (name, raw) = param
        .split_once('=')
        .ok_or_else(|| anyhow!("parameter '{param}' must look like name=value"))?;
    let value = match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(json) => Value::from_json(json)
            .with_context(|| format!("unsupported value for parameter '{name}'"))?,
        Err(_) => Value::String(raw.to_string()),
    };
    Ok((name.trim().to_string(), value))
}

fn handle_evaluate(
    expression: &str,
    params: &[String],
    options: EvaluateOptions,
    pretty: bool,
) -> Result<()> {
    let mut formula = Expression::with_options(expression, options)?;
    for param in params {
        let (name, value) = parse_param(param)?;
        formula.set_parameter(name, value);
    }

    let result = formula
        .evaluate()
        .with_context(|| format!("failed to evaluate '{expression}'"))?;

    let output = if pretty {
        serde_json::to_string_pretty(&result)?
    } else {
        serde_json::to_string(&result)?
    };
    println!("{output}");
    Ok(())
}

fn handle_parse(expression: &str) -> Result<()> {
    let ast = parse(expression).context("failed to parse expression")?;
    println!("{ast}");
    let parameters = ast.parameter_names();
    if !parameters.is_empty() {
        println!("Parameters: {}", parameters.join(", "));
    }
    log::debug!("AST: {ast:?}");
    Ok(())
}

fn handle_validate(expression: &str) -> Result<()> {
    match parse(expression) {
        Ok(_) => {
            println!("VALID");
            Ok(())
        }
        Err(e) => Err(anyhow!("INVALID\n{e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param("a=1").unwrap(), ("a".to_string(), Value::Integer(1)));
        assert_eq!(
            parse_param("xs=[1,2]").unwrap(),
            ("xs".to_string(), Value::list([1, 2]))
        );
        assert_eq!(
            parse_param("name=bob").unwrap(),
            ("name".to_string(), Value::from("bob"))
        );
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("o={\"k\":1}").is_err());
    }
}
