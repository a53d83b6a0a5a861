//! Common utilities for device integration tests

#![allow(dead_code)]

use cldrive::{DeviceSelector, DynamicParams, Instance, OpenClEnv};

/// Open the first device, or `None` when no OpenCL runtime is installed
pub fn setup_env() -> Option<OpenClEnv> {
    let _ = env_logger::builder().is_test(true).try_init();

    if !OpenClEnv::is_available() {
        println!("OpenCL not available, skipping test");
        return None;
    }
    match OpenClEnv::from_selector(&DeviceSelector::Index(0)) {
        Ok(env) => Some(env),
        Err(e) => {
            eprintln!("OpenCL device not available: {:?}", e);
            None
        }
    }
}

/// Instance over `source` with global size `global` and each local size
pub fn instance(source: &str, global: usize, locals: &[usize]) -> Instance {
    locals.iter().fold(Instance::new(source), |instance, &local| {
        instance.with_dynamic_params(DynamicParams::new(global, local))
    })
}
