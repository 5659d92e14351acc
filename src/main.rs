//! Entry point for the RuNeGrid application.
//! Handles CLI parsing and logging, opens the files and dispatches to the library operations.

use clap::Parser;
use log::{error, info};
use ru_ne_grid::concat::ConcatSources;
use ru_ne_grid::config::TransferConfig;
use ru_ne_grid::copy::GraphCopier;
use ru_ne_grid::dataset::{DatasetReader, Flavor, NcDataset, VariableOptions};
use ru_ne_grid::errors::{Result, RuNeGridError};
use ru_ne_grid::history::append_history;
use ru_ne_grid::metadata::{describe_variable, summarize_dataset};
use ru_ne_grid::parallel::get_parallel_info;
use ru_ne_grid::spatial::{get_crs, Projection};
use ru_ne_grid::statistics::collect_statistics;
use ru_ne_grid::warp::Warper;
use std::ops::Range;
use std::process::ExitCode;

mod cli;

use cli::{Args, Command, DimSlice, OutputArgs};

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    args.parallel_config().setup_global_pool()?;
    if args.verbose {
        get_parallel_info().print_info();
    }
    let command_line = std::env::args().collect::<Vec<_>>().join(" ");
    let transfer = TransferConfig::default();
    let copier = GraphCopier::new(transfer.fill_policy.clone());

    match &args.command {
        Command::Info {
            file,
            variable,
            json,
        } => {
            let dataset = NcDataset::open(file)?;
            info!("Successfully opened NetCDF file: {}", file.display());
            match (variable, json) {
                (Some(name), _) => describe_variable(&dataset, name)?,
                (None, true) => {
                    let summary = summarize_dataset(&dataset).to_json();
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
                (None, false) => summarize_dataset(&dataset).print(),
            }
        }

        Command::Copy {
            input,
            output,
            variables,
            overwrite,
        } => {
            let source = NcDataset::open(input)?;
            let mut target = open_output(output)?;
            let options = variable_options(output);
            for name in variables {
                copier.copy_variable(&source, &mut target, name, *overwrite, &options)?;
            }
            append_history(&mut target, &command_line)?;
            info!("Saved {} variable(s) to {}", variables.len(), output.output.display());
        }

        Command::Subset {
            input,
            output,
            variable,
            slices,
            output_name,
            blocksize,
        } => {
            let source = NcDataset::open(input)?;
            let slices = resolve_slices(&source, variable, slices)?;
            let mut target = open_output(output)?;
            let info = copier.extract_subset(
                &source,
                &mut target,
                variable,
                &slices,
                output_name.as_deref(),
                *blocksize,
                &variable_options(output),
            )?;
            append_history(&mut target, &command_line)?;
            info!("Saved '{}' {:?} to {}", info.name, info.shape, output.output.display());
        }

        Command::Concat {
            inputs,
            output,
            variable,
            dimension,
            labels,
        } => {
            let datasets = inputs
                .iter()
                .map(NcDataset::open)
                .collect::<Result<Vec<_>>>()?;
            let sources = match labels {
                Some(labels) => {
                    if labels.len() != datasets.len() {
                        return Err(RuNeGridError::Generic(format!(
                            "{} label(s) given for {} input file(s)",
                            labels.len(),
                            datasets.len()
                        )));
                    }
                    ConcatSources::Labeled(labels.iter().cloned().zip(datasets.iter()).collect())
                }
                None => ConcatSources::Unlabeled(datasets.iter().collect()),
            };
            let mut target = open_output(output)?;
            let info = copier.concat_variable_along_dimension(
                &sources,
                &mut target,
                variable,
                dimension,
                &variable_options(output),
            )?;
            append_history(&mut target, &command_line)?;
            info!("Saved '{}' {:?} to {}", info.name, info.shape, output.output.display());
        }

        Command::Warp {
            input,
            output,
            variables,
            source_crs,
            template,
            template_variable,
            resampling,
        } => {
            let source = NcDataset::open(input)?;
            let template = NcDataset::open(template)?;
            let names: Vec<&str> = variables.iter().map(String::as_str).collect();
            let projection = match source_crs {
                Some(definition) => Projection::parse(definition)?,
                None => source_projection(&source, &names)?,
            };
            let mut target = open_output(output)?;
            let warper = Warper::new(args.warp_config(*resampling));
            let outputs = warper.warp_like(
                &source,
                &projection,
                &names,
                &mut target,
                &template,
                template_variable,
            )?;
            append_history(&mut target, &command_line)?;
            info!("Warped {} variable(s) into {}", outputs.len(), output.output.display());
        }

        Command::Stats { inputs, variables } => {
            let datasets = inputs
                .iter()
                .map(NcDataset::open)
                .collect::<Result<Vec<_>>>()?;
            let refs: Vec<&NcDataset> = datasets.iter().collect();
            let names: Vec<&str> = variables.iter().map(String::as_str).collect();
            for (name, stats) in collect_statistics(&refs, &names)? {
                stats.print(&name);
            }
        }
    }
    Ok(())
}

fn open_output(output: &OutputArgs) -> Result<NcDataset> {
    if output.append && output.output.exists() {
        return NcDataset::append(&output.output);
    }
    let flavor = if output.classic {
        Flavor::Classic
    } else {
        Flavor::Extended
    };
    NcDataset::create(&output.output, flavor)
}

fn variable_options(output: &OutputArgs) -> VariableOptions {
    VariableOptions {
        compression: output.compression.map(|level| level.min(9)),
        ..VariableOptions::default()
    }
}

/// One optional range per dimension of `variable`, in dimension order
fn resolve_slices(
    source: &NcDataset,
    variable: &str,
    slices: &[DimSlice],
) -> Result<Vec<Option<Range<usize>>>> {
    let info = source
        .variable(variable)
        .ok_or_else(|| RuNeGridError::MissingVariable {
            var: variable.to_string(),
        })?;
    if let Some(unknown) = slices
        .iter()
        .find(|s| !info.dimensions.contains(&s.dimension))
    {
        return Err(RuNeGridError::InvalidSlice {
            message: format!(
                "'{variable}' has no dimension '{}' (dimensions: {:?})",
                unknown.dimension, info.dimensions
            ),
        });
    }
    Ok(info
        .dimensions
        .iter()
        .map(|dim| {
            slices
                .iter()
                .find(|s| &s.dimension == dim)
                .map(|s| s.start..s.end)
        })
        .collect())
}

/// CRS recorded on the first variable to be warped
fn source_projection(source: &NcDataset, names: &[&str]) -> Result<Projection> {
    let first = names
        .first()
        .ok_or_else(|| RuNeGridError::Generic("no variables to warp".to_string()))?;
    get_crs(source, first)?.ok_or_else(|| {
        RuNeGridError::ReprojectionFailed(format!(
            "'{first}' in {} has no CRS; pass --source-crs",
            source.path().display()
        ))
    })
}
