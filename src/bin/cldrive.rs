//! cldrive: run the kernels of an OpenCL program and compare their outputs
//!
//! Usage:
//!   cldrive [OPTIONS] <INPUT>
//!
//! Examples:
//!   cldrive kernel.cl --gsize 8 --lsize 1 --lsize 2 --lsize 4
//!   cldrive kernel.cl --random --seed 42 --json
//!   cldrive kernel.cl --input 3 --input "1;2;3;4"
//!   cldrive instance.json
//!   cldrive --list-devices

use std::fs;
use std::io::{self, Read};
use std::process::ExitCode;

use clap::Parser;

use cldrive::{
    DeviceSelector, DynamicParams, FacadeLogger, Instance, JsonLinesLogger, Logger, OpenClEnv,
    ValuePolicy, run_or_die,
};

/// Differential OpenCL kernel driver
///
/// Runs every kernel of a program under each global/local size pair and
/// reports nondeterministic and divergent kernels.
#[derive(Parser, Debug)]
#[command(name = "cldrive")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// OpenCL source file, or a JSON instance ending in .json (use "-" for stdin)
    #[arg(value_name = "INPUT", required_unless_present = "list_devices")]
    input: Option<String>,

    /// Global size; repeat for several values
    #[arg(short, long = "gsize", value_name = "N", default_value = "8")]
    gsize: Vec<usize>,

    /// Local size; repeat for several values
    #[arg(short, long = "lsize", value_name = "N", default_value = "1")]
    lsize: Vec<usize>,

    /// Extra OpenCL compiler options
    #[arg(short, long, value_name = "OPTS", default_value = "", allow_hyphen_values = true)]
    build_opts: String,

    /// Device index, or a substring of the device name
    #[arg(short, long, default_value = "0")]
    device: String,

    /// Fill value for constant inputs, or the seed for random inputs
    #[arg(short, long, default_value = "1", allow_negative_numbers = true)]
    seed: i64,

    /// Draw inputs from a seeded generator
    #[arg(long)]
    random: bool,

    /// Explicit value for the next non-local parameter; buffer elements are
    /// separated by ';'. Repeat once per parameter.
    #[arg(short = 'i', long = "input", value_name = "VALUES", allow_hyphen_values = true)]
    inputs: Vec<String>,

    /// Skip the input-sensitivity rerun
    #[arg(long)]
    no_input_check: bool,

    /// Print one JSON record per outcome on stdout
    #[arg(long)]
    json: bool,

    /// List available devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if args.list_devices {
        for (index, name) in OpenClEnv::list_devices().iter().enumerate() {
            println!("{}: {}", index, name);
        }
        return ExitCode::SUCCESS;
    }

    let instance = match load_instance(&args) {
        Ok(instance) => instance,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut logger: Box<dyn Logger> = if args.json {
        Box::new(JsonLinesLogger::new(io::stdout()))
    } else {
        Box::new(FacadeLogger)
    };

    let result = run_or_die(&instance, logger.as_mut());
    if !args.json {
        println!("{}", result.outcome);
    }

    if result.is_pass() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    }
}

fn load_instance(args: &Args) -> Result<Instance, Box<dyn std::error::Error>> {
    let input = args.input.as_deref().unwrap_or("-");
    if input.ends_with(".json") {
        return Ok(Instance::from_json_file(input)?);
    }

    let source = if input == "-" {
        let mut source = String::new();
        io::stdin().read_to_string(&mut source)?;
        source
    } else {
        fs::read_to_string(input)?
    };

    let device = match args.device.parse::<usize>() {
        Ok(index) => DeviceSelector::Index(index),
        Err(_) => DeviceSelector::Name(args.device.clone()),
    };

    let policy = if args.random {
        ValuePolicy::Random {
            seed: args.seed as u64,
        }
    } else {
        ValuePolicy::Constant(args.seed)
    };

    let mut instance = Instance::new(source)
        .with_build_opts(args.build_opts.as_str())
        .with_device(device)
        .with_value_policy(policy)
        .with_input_sensitivity_check(!args.no_input_check);

    if !args.inputs.is_empty() {
        instance = instance.with_inputs(args.inputs.iter().map(|values| split_values(values)).collect());
    }

    for &global in &args.gsize {
        for &local in &args.lsize {
            instance = instance.with_dynamic_params(DynamicParams::new(global, local));
        }
    }

    Ok(instance)
}

fn split_values(values: &str) -> Vec<String> {
    values
        .split(';')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
