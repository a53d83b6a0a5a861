//! Differential runner
//!
//! Builds the program of an [`Instance`], enumerates its kernels and drives
//! each one across the configured size matrix. The overall verdict is a
//! [`RunOutcome`]; per-kernel detail is kept in the returned [`RunResult`].

use crate::config::Instance;
use crate::device::OpenClEnv;
use crate::error::{CldriveError, Result};
use crate::kernel_driver::{KernelDriver, KernelResult, KernelRun, KernelRunOutcome};
use crate::logger::{LogRecord, Logger};
use crate::profiling::{ProfilingData, ProfilingStage};
use ocl::Program;
use ocl::core::{ProgramInfo, ProgramInfoResult};
use serde::Serialize;
use std::fmt;
use std::time::Instant;

/// Always passed to the compiler so kernel signatures can be queried
pub const KERNEL_ARG_INFO_OPTION: &str = "-cl-kernel-arg-info";

/// Verdict for a whole program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    Pass,
    ProgramCompilationFailure,
    NoKernelsInProgram,
    RuntimeFailure,
}

impl RunOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            RunOutcome::Pass => "PASS",
            RunOutcome::ProgramCompilationFailure => "PROGRAM_COMPILATION_FAILURE",
            RunOutcome::NoKernelsInProgram => "NO_KERNELS_IN_PROGRAM",
            RunOutcome::RuntimeFailure => "RUNTIME_FAILURE",
        }
    }

    /// Outcomes that end the run before any kernel is driven
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            RunOutcome::ProgramCompilationFailure | RunOutcome::NoKernelsInProgram
        )
    }

    /// Combine with a later outcome; terminal outcomes and the first runtime
    /// failure are never replaced
    pub fn escalate(self, next: RunOutcome) -> RunOutcome {
        if self.is_terminal() || self == RunOutcome::RuntimeFailure {
            self
        } else {
            next
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a run produced
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub outcome: RunOutcome,
    /// Compiler output when the build failed
    pub build_log: Option<String>,
    pub kernels: Vec<KernelResult>,
    /// Program-level timings (compile)
    pub profiling: ProfilingData,
}

impl RunResult {
    fn new(outcome: RunOutcome, profiling: ProfilingData) -> Self {
        Self {
            outcome,
            build_log: None,
            kernels: Vec::new(),
            profiling,
        }
    }

    pub fn kernel(&self, name: &str) -> Option<&KernelResult> {
        self.kernels.iter().find(|k| k.name == name)
    }

    pub fn is_pass(&self) -> bool {
        self.outcome == RunOutcome::Pass
    }
}

/// Drives one [`Instance`] on one device
pub struct Runner<'a> {
    env: &'a OpenClEnv,
    instance: &'a Instance,
}

impl<'a> Runner<'a> {
    pub fn new(env: &'a OpenClEnv, instance: &'a Instance) -> Self {
        Self { env, instance }
    }

    /// Compiler options with kernel argument info forced on
    pub fn build_options(&self) -> String {
        let extra = self.instance.build_opts.trim();
        if extra.is_empty() {
            KERNEL_ARG_INFO_OPTION.to_string()
        } else {
            format!("{} {}", KERNEL_ARG_INFO_OPTION, extra)
        }
    }

    /// Build the instance's program for the runner's device
    pub fn build_program(&self) -> std::result::Result<Program, ocl::Error> {
        Program::builder()
            .src(self.instance.opencl_src.as_str())
            .devices(self.env.device())
            .cmplr_opt(self.build_options())
            .build(self.env.context())
    }

    fn kernel_names(program: &Program) -> Result<Vec<String>> {
        let names = match program.info(ProgramInfo::KernelNames)? {
            ProgramInfoResult::KernelNames(names) => names,
            _ => String::new(),
        };
        Ok(names
            .split(';')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect())
    }

    fn program_record(&self, outcome: RunOutcome, message: Option<String>) -> LogRecord {
        LogRecord {
            device: self.env.device_name(),
            kernel: None,
            params: None,
            outcome: outcome.to_string(),
            message,
        }
    }

    /// Every configuration of a kernel that could not be driven at all
    fn failed_kernel(&self, name: &str, e: &CldriveError) -> KernelResult {
        log::error!("Kernel '{}' could not be driven: {}", name, e);
        let runs = self
            .instance
            .dynamic_params
            .iter()
            .map(|params| KernelRun {
                params: *params,
                outcome: KernelRunOutcome::RuntimeFailure,
                message: Some(e.to_string()),
            })
            .collect();
        KernelResult {
            name: name.to_string(),
            runs,
            profiling: ProfilingData::new(),
        }
    }

    /// Drive kernel `name` of `program` across every configuration
    ///
    /// A kernel that cannot be set up at all has every configuration marked
    /// `RuntimeFailure`.
    pub fn drive_kernel(&self, program: &Program, name: &str) -> KernelResult {
        KernelDriver::new(self.env, program, name)
            .and_then(|driver| driver.run(self.instance))
            .unwrap_or_else(|e| self.failed_kernel(name, &e))
    }

    /// Build the program and drive every kernel
    ///
    /// Build failures and empty programs are outcomes, not errors. Errors
    /// returned here prevented the run from completing.
    pub fn run(&self, logger: &mut dyn Logger) -> Result<RunResult> {
        let mut profiling = ProfilingData::new();

        let started = Instant::now();
        let built = self.build_program();
        profiling.record_duration(ProfilingStage::Compile, started.elapsed());

        let program = match built {
            Ok(program) => program,
            Err(e) => {
                let outcome = RunOutcome::ProgramCompilationFailure;
                log::error!("Program build failed: {}", e);
                logger.log(&self.program_record(outcome, Some(e.to_string())));
                let mut result = RunResult::new(outcome, profiling);
                result.build_log = Some(e.to_string());
                return Ok(result);
            }
        };

        let names = Self::kernel_names(&program)?;
        if names.is_empty() {
            let outcome = RunOutcome::NoKernelsInProgram;
            log::warn!("Program contains no kernels");
            logger.log(&self.program_record(outcome, None));
            return Ok(RunResult::new(outcome, profiling));
        }
        log::debug!("Program kernels: {}", names.join(", "));

        let device = self.env.device_name();
        let mut result = RunResult::new(RunOutcome::Pass, profiling);
        for name in &names {
            let kernel = self.drive_kernel(&program, name);

            for run in &kernel.runs {
                logger.log(&LogRecord {
                    device: device.clone(),
                    kernel: Some(kernel.name.clone()),
                    params: Some(run.params),
                    outcome: run.outcome.to_string(),
                    message: run.message.clone(),
                });
            }

            if kernel.has_failure() || kernel.has_divergence() {
                result.outcome = result.outcome.escalate(RunOutcome::RuntimeFailure);
            }
            result.kernels.push(kernel);
        }

        log::info!("Run finished: {}", result.outcome);
        Ok(result)
    }
}

/// Resolve the device, run `instance` and return the result
///
/// Any error escaping the run is logged with its context and the process
/// exits with status 1.
pub fn run_or_die(instance: &Instance, logger: &mut dyn Logger) -> RunResult {
    let result = OpenClEnv::from_selector(&instance.device)
        .and_then(|env| Runner::new(&env, instance).run(logger));

    match result {
        Ok(result) => result,
        Err(e) => {
            report_fatal(&e, instance);
            std::process::exit(1);
        }
    }
}

fn report_fatal(e: &CldriveError, instance: &Instance) {
    match e.status() {
        Some((code, name)) => log::error!("Fatal OpenCL error {} ({}): {}", name, code, e),
        None => log::error!("Fatal error: {}", e),
    }
    log::error!(
        "device={:?} build_opts={:?} dynamic_params={:?}",
        instance.device,
        instance.build_opts,
        instance.dynamic_params
    );
}
