//! End-to-end runs of small OpenCL programs

mod common;

use cldrive::{
    DynamicParams, KernelDriver, KernelRunOutcome, RecordingLogger, RunOutcome, Runner,
    ValuePolicy,
};
use ocl::Program;

const SCALE_KERNEL: &str = r#"
kernel void A(global float* a, global float* b) {
    int i = get_global_id(0);
    b[i] = a[i] * 2.0f + 1.0f;
}
"#;

#[test]
fn test_deterministic_kernel_passes_across_local_sizes() {
    let Some(env) = common::setup_env() else {
        return;
    };
    let instance = common::instance(SCALE_KERNEL, 8, &[1, 2, 4]);
    let mut logger = RecordingLogger::new();

    let result = Runner::new(&env, &instance).run(&mut logger).unwrap();

    assert_eq!(result.outcome, RunOutcome::Pass);
    let kernel = result.kernel("A").unwrap();
    assert_eq!(kernel.runs.len(), 3);
    assert!(kernel.outcomes().all(|o| o == KernelRunOutcome::Pass));
    assert_eq!(logger.records.len(), 3);
    assert!(logger.records.iter().all(|r| r.kernel.as_deref() == Some("A")));
}

#[test]
fn test_invalid_source_is_compilation_failure() {
    let Some(env) = common::setup_env() else {
        return;
    };
    let instance = common::instance("kernel void A(global int* a) { syntax error }", 8, &[1]);
    let mut logger = RecordingLogger::new();

    let result = Runner::new(&env, &instance).run(&mut logger).unwrap();

    assert_eq!(result.outcome, RunOutcome::ProgramCompilationFailure);
    assert!(result.kernels.is_empty());
    assert!(result.build_log.is_some());
    assert_eq!(logger.records.len(), 1);
    assert_eq!(logger.records[0].outcome, "PROGRAM_COMPILATION_FAILURE");
    assert!(logger.records[0].kernel.is_none());
}

#[test]
fn test_program_without_kernels() {
    let Some(env) = common::setup_env() else {
        return;
    };
    let instance = common::instance("int helper(int x) { return x + 1; }", 8, &[1]);
    let mut logger = RecordingLogger::new();

    let result = Runner::new(&env, &instance).run(&mut logger).unwrap();

    assert_eq!(result.outcome, RunOutcome::NoKernelsInProgram);
    assert_eq!(logger.records.len(), 1);
}

#[test]
fn test_local_id_kernel_diverges() {
    let Some(env) = common::setup_env() else {
        return;
    };
    let source = r#"
kernel void A(global int* a) {
    a[get_global_id(0)] = get_local_id(0);
}
"#;
    let instance = common::instance(source, 8, &[1, 2]);

    let result = Runner::new(&env, &instance)
        .run(&mut RecordingLogger::new())
        .unwrap();

    let outcomes: Vec<_> = result.kernel("A").unwrap().outcomes().collect();
    assert_eq!(outcomes[1], KernelRunOutcome::Divergent);
    assert_eq!(result.outcome, RunOutcome::RuntimeFailure);
}

#[test]
fn test_kernel_without_stores_has_no_output() {
    let Some(env) = common::setup_env() else {
        return;
    };
    let source = "kernel void A(global int* a, const int b) { }";
    let instance = common::instance(source, 4, &[1]);

    let result = Runner::new(&env, &instance)
        .run(&mut RecordingLogger::new())
        .unwrap();

    let kernel = result.kernel("A").unwrap();
    assert_eq!(kernel.runs[0].outcome, KernelRunOutcome::NoOutput);
    assert_eq!(result.outcome, RunOutcome::Pass);
}

#[test]
fn test_input_insensitive_kernel() {
    let Some(env) = common::setup_env() else {
        return;
    };
    let source = "kernel void A(global int* a) { a[get_global_id(0)] = 42; }";
    let instance = common::instance(source, 4, &[1]);

    let result = Runner::new(&env, &instance)
        .run(&mut RecordingLogger::new())
        .unwrap();

    assert_eq!(
        result.kernel("A").unwrap().runs[0].outcome,
        KernelRunOutcome::InputInsensitive
    );
    assert_eq!(result.outcome, RunOutcome::Pass);
}

#[test]
fn test_invalid_dynamic_params_are_skipped() {
    let Some(env) = common::setup_env() else {
        return;
    };
    let instance = common::instance(SCALE_KERNEL, 8, &[3, 0, 2]);

    let result = Runner::new(&env, &instance)
        .run(&mut RecordingLogger::new())
        .unwrap();

    let outcomes: Vec<_> = result.kernel("A").unwrap().outcomes().collect();
    assert_eq!(
        outcomes,
        vec![
            KernelRunOutcome::InvalidDynamicParams,
            KernelRunOutcome::InvalidDynamicParams,
            KernelRunOutcome::Pass,
        ]
    );
    assert_eq!(result.outcome, RunOutcome::Pass);
}

#[test]
fn test_local_memory_kernel() {
    let Some(env) = common::setup_env() else {
        return;
    };
    let source = r#"
kernel void A(global int* a, local int* scratch) {
    int l = get_local_id(0);
    scratch[l] = a[get_global_id(0)];
    barrier(CLK_LOCAL_MEM_FENCE);
    a[get_global_id(0)] = scratch[l] + 1;
}
"#;
    let instance = common::instance(source, 8, &[1, 2, 4])
        .with_value_policy(ValuePolicy::Random { seed: 5 });

    let result = Runner::new(&env, &instance)
        .run(&mut RecordingLogger::new())
        .unwrap();

    assert_eq!(result.outcome, RunOutcome::Pass);
    assert!(
        result
            .kernel("A")
            .unwrap()
            .outcomes()
            .all(|o| o == KernelRunOutcome::Pass)
    );
}

#[test]
fn test_struct_argument_is_unsupported() {
    let Some(env) = common::setup_env() else {
        return;
    };
    let source = r#"
typedef struct { int x; } S;
kernel void A(global S* a) { a[get_global_id(0)].x = 1; }
"#;
    let instance = common::instance(source, 4, &[1]);

    let result = Runner::new(&env, &instance)
        .run(&mut RecordingLogger::new())
        .unwrap();

    assert_eq!(
        result.kernel("A").unwrap().runs[0].outcome,
        KernelRunOutcome::UnsupportedArguments
    );
    assert_eq!(result.outcome, RunOutcome::Pass);
}

#[test]
fn test_driver_reads_signature() {
    let Some(env) = common::setup_env() else {
        return;
    };
    let program = Program::builder()
        .src("kernel void B(const int n, global float4* x, local uint* s) { }")
        .devices(env.device())
        .cmplr_opt("-cl-kernel-arg-info")
        .build(env.context())
        .unwrap();

    let driver = KernelDriver::new(&env, &program, "B").unwrap();
    let signature: Vec<String> = driver
        .signature()
        .unwrap()
        .iter()
        .map(|arg| arg.to_string())
        .collect();
    assert_eq!(signature, vec!["int", "global float4*", "local uint*"]);

    let instance = common::instance("", 4, &[1]).with_dynamic_params(DynamicParams::new(4, 2));
    let result = driver.run(&instance).unwrap();
    assert_eq!(result.name, "B");
    assert_eq!(result.runs.len(), 2);
    assert!(result.outcomes().all(|o| o == KernelRunOutcome::NoOutput));
    assert!(!result.profiling.samples(cldrive::ProfilingStage::Execution).is_empty());
}

#[test]
fn test_identity_kernel_sized_five_seed_three() {
    let Some(env) = common::setup_env() else {
        return;
    };
    let source = r#"
kernel void A(const int n, global int* a) {
    int i = get_global_id(0);
    a[i] = a[i];
}
"#;
    let instance = common::instance(source, 5, &[1]).with_value_policy(ValuePolicy::Constant(3));

    let result = Runner::new(&env, &instance)
        .run(&mut RecordingLogger::new())
        .unwrap();

    assert_eq!(result.kernel("A").unwrap().runs[0].outcome, KernelRunOutcome::NoOutput);
    assert_eq!(result.outcome, RunOutcome::Pass);
}

#[test]
fn test_state_kept_between_launches_is_nondeterministic() {
    let Some(env) = common::setup_env() else {
        return;
    };
    let source = r#"
global int launches = 0;
kernel void A(global int* a) {
    a[0] = launches;
    launches += 1;
}
"#;
    let instance = common::instance(source, 1, &[1]).with_build_opts("-cl-std=CL2.0");

    let result = Runner::new(&env, &instance)
        .run(&mut RecordingLogger::new())
        .unwrap();
    if result.outcome == RunOutcome::ProgramCompilationFailure {
        println!("Program-scope globals not supported, skipping test");
        return;
    }

    let kernel = result.kernel("A").unwrap();
    assert_eq!(kernel.runs[0].outcome, KernelRunOutcome::Nondeterministic);
    assert!(kernel.has_divergence());
    assert_eq!(result.outcome, RunOutcome::RuntimeFailure);
}

#[test]
fn test_each_global_size_has_its_own_reference() {
    let Some(env) = common::setup_env() else {
        return;
    };
    let instance = common::instance(SCALE_KERNEL, 8, &[1, 2])
        .with_dynamic_params(DynamicParams::new(16, 1))
        .with_dynamic_params(DynamicParams::new(16, 4));

    let result = Runner::new(&env, &instance)
        .run(&mut RecordingLogger::new())
        .unwrap();

    let kernel = result.kernel("A").unwrap();
    assert_eq!(kernel.runs.len(), 4);
    assert!(kernel.outcomes().all(|o| o == KernelRunOutcome::Pass));
    assert_eq!(result.outcome, RunOutcome::Pass);
}

#[test]
fn test_kernel_that_cannot_be_created_fails_every_configuration() {
    let Some(env) = common::setup_env() else {
        return;
    };
    let instance = common::instance(SCALE_KERNEL, 8, &[1, 2]);
    let runner = Runner::new(&env, &instance);
    let program = runner.build_program().unwrap();

    let kernel = runner.drive_kernel(&program, "missing");

    assert_eq!(kernel.name, "missing");
    assert_eq!(kernel.runs.len(), 2);
    assert!(kernel.outcomes().all(|o| o == KernelRunOutcome::RuntimeFailure));
    assert!(kernel.runs.iter().all(|run| run.message.is_some()));
    assert!(kernel.has_failure());
}

#[test]
fn test_required_work_group_size_skips_other_local_sizes() {
    let Some(env) = common::setup_env() else {
        return;
    };
    let source = r#"
__attribute__((reqd_work_group_size(2, 1, 1)))
kernel void A(global float* a, global float* b) {
    int i = get_global_id(0);
    b[i] = a[i] + 1.0f;
}
"#;
    let instance = common::instance(source, 8, &[1, 2, 4]);

    let result = Runner::new(&env, &instance)
        .run(&mut RecordingLogger::new())
        .unwrap();

    let outcomes: Vec<_> = result.kernel("A").unwrap().outcomes().collect();
    assert_eq!(
        outcomes,
        vec![
            KernelRunOutcome::InvalidDynamicParams,
            KernelRunOutcome::Pass,
            KernelRunOutcome::InvalidDynamicParams,
        ]
    );
    assert_eq!(result.outcome, RunOutcome::Pass);
}

#[test]
fn test_local_size_above_kernel_limit_is_skipped() {
    let Some(env) = common::setup_env() else {
        return;
    };
    let program = Program::builder()
        .src(SCALE_KERNEL)
        .devices(env.device())
        .cmplr_opt("-cl-kernel-arg-info")
        .build(env.context())
        .unwrap();
    let driver = KernelDriver::new(&env, &program, "A").unwrap();
    let limits = driver.work_group_limits().unwrap();
    assert!(limits.max_size <= env.max_work_group_size().unwrap());
    assert!(limits.required_size.is_none());

    let oversize = limits.max_size * 2;
    let instance = common::instance("", oversize * 2, &[oversize]);
    let result = driver.run(&instance).unwrap();
    assert_eq!(result.runs[0].outcome, KernelRunOutcome::InvalidDynamicParams);
}

#[test]
fn test_explicit_inputs_drive_the_kernel() {
    let Some(env) = common::setup_env() else {
        return;
    };
    let source = r#"
kernel void A(const int n, constant int* c, global int* a, local int* s) {
    int i = get_global_id(0);
    a[i] = c[i] * n;
}
"#;
    let entry = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    let instance = common::instance(source, 4, &[1, 2]).with_inputs(vec![
        entry(&["3"]),
        entry(&["1", "2", "3", "4"]),
        entry(&["0"]),
    ]);

    let result = Runner::new(&env, &instance)
        .run(&mut RecordingLogger::new())
        .unwrap();

    assert_eq!(result.outcome, RunOutcome::Pass);
    assert!(
        result
            .kernel("A")
            .unwrap()
            .outcomes()
            .all(|o| o == KernelRunOutcome::Pass)
    );
}

#[test]
fn test_wrong_number_of_inputs_is_unsupported() {
    let Some(env) = common::setup_env() else {
        return;
    };
    let instance = common::instance(SCALE_KERNEL, 8, &[1, 2]).with_inputs(vec![vec!["1".to_string()]]);
    let mut logger = RecordingLogger::new();

    let result = Runner::new(&env, &instance).run(&mut logger).unwrap();

    let kernel = result.kernel("A").unwrap();
    assert!(kernel.outcomes().all(|o| o == KernelRunOutcome::UnsupportedArguments));
    assert_eq!(
        kernel.runs[0].message.as_deref(),
        Some("kernel expects 2 inputs, but 1 were provided")
    );
    assert_eq!(result.outcome, RunOutcome::Pass);
    assert_eq!(logger.records.len(), 2);
}
