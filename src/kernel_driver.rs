//! Drive one kernel across a matrix of launch configurations
//!
//! For every [`DynamicParams`] entry the driver synthesizes inputs, copies
//! them to the device, binds and enqueues the kernel, then reads the outputs
//! back into a fresh [`KernelArgValuesSet`]. Each configuration is checked
//! for nondeterminism, for leaving its inputs unchanged and, optionally, for
//! ignoring its inputs. Completed configurations are compared against the
//! first completed configuration of the same global size.

use crate::arg_value::{KernelArgValuesSet, ValueGenerator};
use crate::config::{DynamicParams, Instance, ValuePolicy};
use crate::device::OpenClEnv;
use crate::error::{CldriveError, Result};
use crate::kernel_arg::{KernelArg, kernel_signature};
use crate::profiling::{ProfilingData, ProfilingStage};
use ocl::core::{Kernel as KernelCore, KernelWorkGroupInfo, KernelWorkGroupInfoResult};
use ocl::{Event, Program};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Outcomes
// ============================================================================

/// Result of one kernel under one launch configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KernelRunOutcome {
    Pass,
    /// Outputs equal inputs
    NoOutput,
    /// Different inputs produced the same outputs
    InputInsensitive,
    /// Two runs with identical inputs disagree
    Nondeterministic,
    /// Outputs differ from the reference configuration
    Divergent,
    /// The size configuration cannot be launched; skipped
    InvalidDynamicParams,
    /// An argument type is outside the catalog; skipped
    UnsupportedArguments,
    /// A device API call failed
    RuntimeFailure,
}

impl KernelRunOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            KernelRunOutcome::Pass => "PASS",
            KernelRunOutcome::NoOutput => "NO_OUTPUT",
            KernelRunOutcome::InputInsensitive => "INPUT_INSENSITIVE",
            KernelRunOutcome::Nondeterministic => "NONDETERMINISTIC",
            KernelRunOutcome::Divergent => "DIVERGENT",
            KernelRunOutcome::InvalidDynamicParams => "INVALID_DYNAMIC_PARAMS",
            KernelRunOutcome::UnsupportedArguments => "UNSUPPORTED_ARGUMENTS",
            KernelRunOutcome::RuntimeFailure => "RUNTIME_FAILURE",
        }
    }

    pub fn is_divergence(self) -> bool {
        matches!(
            self,
            KernelRunOutcome::Nondeterministic | KernelRunOutcome::Divergent
        )
    }

    pub fn is_failure(self) -> bool {
        self == KernelRunOutcome::RuntimeFailure
    }

    pub fn is_skip(self) -> bool {
        matches!(
            self,
            KernelRunOutcome::InvalidDynamicParams | KernelRunOutcome::UnsupportedArguments
        )
    }

    /// Map an error raised while running a configuration to its outcome
    fn from_error(error: &CldriveError) -> Self {
        match error {
            CldriveError::InvalidDynamicParams(_) => KernelRunOutcome::InvalidDynamicParams,
            CldriveError::UnsupportedArgument { .. }
            | CldriveError::InputCount { .. }
            | CldriveError::ParseValue { .. } => KernelRunOutcome::UnsupportedArguments,
            _ => KernelRunOutcome::RuntimeFailure,
        }
    }
}

impl fmt::Display for KernelRunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One kernel under one configuration
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KernelRun {
    pub params: DynamicParams,
    pub outcome: KernelRunOutcome,
    pub message: Option<String>,
}

impl KernelRun {
    fn new(params: DynamicParams, outcome: KernelRunOutcome) -> Self {
        Self {
            params,
            outcome,
            message: None,
        }
    }

    fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// All configurations of one kernel
#[derive(Debug, Clone, Serialize)]
pub struct KernelResult {
    pub name: String,
    pub runs: Vec<KernelRun>,
    pub profiling: ProfilingData,
}

impl KernelResult {
    pub fn has_failure(&self) -> bool {
        self.runs.iter().any(|run| run.outcome.is_failure())
    }

    pub fn has_divergence(&self) -> bool {
        self.runs.iter().any(|run| run.outcome.is_divergence())
    }

    pub fn outcomes(&self) -> impl Iterator<Item = KernelRunOutcome> + '_ {
        self.runs.iter().map(|run| run.outcome)
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Work-group constraints of one kernel on one device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkGroupLimits {
    /// Smaller of the device limit and the kernel's `CL_KERNEL_WORK_GROUP_SIZE`
    pub max_size: usize,
    /// Set by `__attribute__((reqd_work_group_size(x, y, z)))`
    pub required_size: Option<[usize; 3]>,
}

impl WorkGroupLimits {
    pub fn check(&self, params: &DynamicParams) -> Result<()> {
        params.validate(self.max_size)?;
        match self.required_size {
            Some(required) if required != [params.local_size_x, 1, 1] => {
                Err(CldriveError::InvalidDynamicParams(format!(
                    "kernel requires work-group size {:?}, got local size {}",
                    required, params.local_size_x
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Where the values of one execution come from
#[derive(Clone, Copy)]
enum InputSource<'i> {
    Generated(ValuePolicy),
    Explicit(&'i [Vec<String>]),
}

impl InputSource<'_> {
    fn generator(self) -> ValueGenerator {
        match self {
            InputSource::Generated(policy) => ValueGenerator::new(policy),
            InputSource::Explicit(inputs) => ValueGenerator::from_inputs(inputs),
        }
    }
}

/// Inputs and read-back outputs of one execution
struct Execution {
    inputs: KernelArgValuesSet,
    outputs: KernelArgValuesSet,
}

/// Compare two executions with identical inputs, and the first against the
/// reference of its global size
fn consistency(
    first: &KernelArgValuesSet,
    second: &KernelArgValuesSet,
    reference: Option<&KernelArgValuesSet>,
) -> Option<(KernelRunOutcome, &'static str)> {
    if first != second {
        Some((
            KernelRunOutcome::Nondeterministic,
            "outputs differ between runs with identical inputs",
        ))
    } else if reference.is_some_and(|reference| reference != first) {
        Some((
            KernelRunOutcome::Divergent,
            "outputs differ from the reference configuration",
        ))
    } else {
        None
    }
}

/// Runs a single kernel of a built program
pub struct KernelDriver<'a> {
    env: &'a OpenClEnv,
    name: String,
    kernel: KernelCore,
    profiling: ProfilingData,
}

impl<'a> KernelDriver<'a> {
    /// Create the kernel `name` from a program built on `env`'s context
    pub fn new(env: &'a OpenClEnv, program: &Program, name: &str) -> Result<Self> {
        let kernel = ocl::core::create_kernel(program.as_core(), name)?;
        Ok(Self {
            env,
            name: name.to_string(),
            kernel,
            profiling: ProfilingData::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signature(&self) -> Result<Vec<KernelArg>> {
        kernel_signature(&self.kernel, self.env.version()?)
    }

    pub fn profiling(&self) -> &ProfilingData {
        &self.profiling
    }

    fn work_group_info(&self, request: KernelWorkGroupInfo) -> Result<KernelWorkGroupInfoResult> {
        Ok(ocl::core::get_kernel_work_group_info(
            &self.kernel,
            self.env.device(),
            request,
        )?)
    }

    /// Query the kernel's work-group constraints on the driver's device
    pub fn work_group_limits(&self) -> Result<WorkGroupLimits> {
        let kernel_max = match self.work_group_info(KernelWorkGroupInfo::WorkGroupSize)? {
            KernelWorkGroupInfoResult::WorkGroupSize(size) => size,
            other => return Err(CldriveError::UnexpectedInfo(format!("{:?}", other))),
        };
        let required_size = match self.work_group_info(KernelWorkGroupInfo::CompileWorkGroupSize)? {
            KernelWorkGroupInfoResult::CompileWorkGroupSize([0, 0, 0]) => None,
            KernelWorkGroupInfoResult::CompileWorkGroupSize(size) => Some(size),
            other => return Err(CldriveError::UnexpectedInfo(format!("{:?}", other))),
        };
        Ok(WorkGroupLimits {
            max_size: kernel_max.min(self.env.max_work_group_size()?),
            required_size,
        })
    }

    /// Every configuration of `instance` skipped for the same reason
    fn skip_all(self, instance: &Instance, outcome: KernelRunOutcome, e: &CldriveError) -> KernelResult {
        log::warn!("Skipping kernel '{}': {}", self.name, e);
        let runs = instance
            .dynamic_params
            .iter()
            .map(|params| KernelRun::new(*params, outcome).with_message(e.to_string()))
            .collect();
        self.into_result(runs)
    }

    /// Run the kernel under every configuration of `instance`
    ///
    /// Per-configuration failures are recorded as outcomes. Only errors that
    /// prevent driving the kernel at all are returned.
    pub fn run(mut self, instance: &Instance) -> Result<KernelResult> {
        let signature = match self.signature() {
            Ok(signature) => signature,
            Err(e @ CldriveError::UnsupportedArgument { .. }) => {
                return Ok(self.skip_all(instance, KernelRunOutcome::UnsupportedArguments, &e));
            }
            Err(e) => return Err(e),
        };

        log::debug!(
            "Kernel '{}' signature: ({})",
            self.name,
            signature
                .iter()
                .map(|arg| arg.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let source = match instance.inputs.as_deref() {
            None => InputSource::Generated(instance.value_policy),
            Some(inputs) => {
                let expected = signature.iter().filter(|arg| arg.takes_input()).count();
                if inputs.len() != expected {
                    let e = CldriveError::InputCount {
                        expected,
                        provided: inputs.len(),
                    };
                    return Ok(self.skip_all(instance, KernelRunOutcome::UnsupportedArguments, &e));
                }
                InputSource::Explicit(inputs)
            }
        };

        let limits = self.work_group_limits()?;
        log::debug!("Kernel '{}' work-group limits: {:?}", self.name, limits);

        let mut references: HashMap<usize, KernelArgValuesSet> = HashMap::new();
        let mut runs = Vec::with_capacity(instance.dynamic_params.len());

        for params in &instance.dynamic_params {
            let run = match limits.check(params) {
                Err(e) => {
                    log::warn!("Kernel '{}' {}: {}", self.name, params, e);
                    KernelRun::new(*params, KernelRunOutcome::InvalidDynamicParams)
                        .with_message(e.to_string())
                }
                Ok(()) => {
                    self.run_configuration(&signature, params, instance, source, &mut references)
                }
            };
            log::info!("Kernel '{}' {}: {}", self.name, params, run.outcome);
            runs.push(run);
        }

        Ok(self.into_result(runs))
    }

    fn into_result(self, runs: Vec<KernelRun>) -> KernelResult {
        KernelResult {
            name: self.name,
            runs,
            profiling: self.profiling,
        }
    }

    /// Run one configuration and classify it
    fn run_configuration(
        &mut self,
        signature: &[KernelArg],
        params: &DynamicParams,
        instance: &Instance,
        source: InputSource<'_>,
        references: &mut HashMap<usize, KernelArgValuesSet>,
    ) -> KernelRun {
        match self.check_configuration(signature, params, instance, source, references) {
            Ok(run) => run,
            Err(e) => {
                let outcome = KernelRunOutcome::from_error(&e);
                match e.status() {
                    Some((code, name)) => log::error!(
                        "Kernel '{}' {} failed with {} ({}): {}",
                        self.name,
                        params,
                        name,
                        code,
                        e
                    ),
                    None => log::error!("Kernel '{}' {} failed: {}", self.name, params, e),
                }
                KernelRun::new(*params, outcome).with_message(e.to_string())
            }
        }
    }

    fn check_configuration(
        &mut self,
        signature: &[KernelArg],
        params: &DynamicParams,
        instance: &Instance,
        source: InputSource<'_>,
        references: &mut HashMap<usize, KernelArgValuesSet>,
    ) -> Result<KernelRun> {
        let first = self.execute(signature, params, source)?;
        let second = self.execute(signature, params, source)?;

        let reference = references.get(&params.global_size_x);
        if let Some((outcome, message)) = consistency(&first.outputs, &second.outputs, reference) {
            return Ok(KernelRun::new(*params, outcome).with_message(message));
        }

        if reference.is_none() {
            log::debug!("Kernel '{}' {} is the reference", self.name, params);
            references.insert(params.global_size_x, first.outputs);
            return self.classify_outputs(signature, params, instance, second);
        }

        self.classify_outputs(signature, params, instance, first)
    }

    /// Informational checks on a completed, consistent configuration
    fn classify_outputs(
        &mut self,
        signature: &[KernelArg],
        params: &DynamicParams,
        instance: &Instance,
        execution: Execution,
    ) -> Result<KernelRun> {
        if execution.outputs == execution.inputs {
            return Ok(KernelRun::new(*params, KernelRunOutcome::NoOutput)
                .with_message("kernel did not modify its arguments"));
        }

        if instance.check_input_sensitivity {
            let policy = InputSource::Generated(instance.value_policy.alternate());
            let alternate = self.execute(signature, params, policy)?;
            if alternate.outputs == execution.outputs {
                return Ok(KernelRun::new(*params, KernelRunOutcome::InputInsensitive)
                    .with_message("different inputs produced the same outputs"));
            }
        }

        Ok(KernelRun::new(*params, KernelRunOutcome::Pass))
    }

    /// Synthesize inputs, run the kernel once and read back the outputs
    fn execute(
        &mut self,
        signature: &[KernelArg],
        params: &DynamicParams,
        source: InputSource<'_>,
    ) -> Result<Execution> {
        let queue = self.env.queue();
        let mut generator = source.generator();

        let mut inputs = KernelArgValuesSet::new();
        for arg in signature {
            inputs.add_value(arg.create_value(queue, params, &mut generator)?);
        }

        inputs.copy_to_device(queue, &mut self.profiling)?;
        inputs.bind(&self.kernel)?;

        let mut event = Event::empty();
        unsafe {
            ocl::core::enqueue_kernel(
                queue.as_core(),
                &self.kernel,
                1,
                None,
                &[params.global_size_x, 1, 1],
                Some([params.local_size_x, 1, 1]),
                None::<&ocl::core::Event>,
                Some(&mut event),
            )?;
        }
        self.profiling.record_event(ProfilingStage::Execution, &event)?;

        let outputs = inputs.copy_outputs_from_device(queue, &mut self.profiling)?;
        Ok(Execution { inputs, outputs })
    }
}
