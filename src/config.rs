//! Configuration record for a driver run
//!
//! An [`Instance`] names the kernel source, the build options, the device and
//! the size matrix to drive. The driver treats it as immutable input.

use crate::error::{CldriveError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// How to pick an OpenCL device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceSelector {
    /// Position in the list of devices across all platforms
    Index(usize),
    /// First device whose name contains this string
    Name(String),
}

impl Default for DeviceSelector {
    fn default() -> Self {
        DeviceSelector::Index(0)
    }
}

/// One-dimensional launch configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DynamicParams {
    pub global_size_x: usize,
    pub local_size_x: usize,
}

impl DynamicParams {
    pub fn new(global_size_x: usize, local_size_x: usize) -> Self {
        Self {
            global_size_x,
            local_size_x,
        }
    }

    /// Check the sizes against each other and against a work-group size limit
    pub fn validate(&self, max_work_group_size: usize) -> Result<()> {
        if self.global_size_x == 0 || self.local_size_x == 0 {
            return Err(CldriveError::InvalidDynamicParams(format!(
                "sizes must be positive, got {}",
                self
            )));
        }
        if self.global_size_x % self.local_size_x != 0 {
            return Err(CldriveError::InvalidDynamicParams(format!(
                "global size {} is not divisible by local size {}",
                self.global_size_x, self.local_size_x
            )));
        }
        if self.local_size_x > max_work_group_size {
            return Err(CldriveError::InvalidDynamicParams(format!(
                "local size {} exceeds the maximum work-group size {}",
                self.local_size_x, max_work_group_size
            )));
        }
        Ok(())
    }
}

impl fmt::Display for DynamicParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "global={} local={}", self.global_size_x, self.local_size_x)
    }
}

/// How argument values are generated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValuePolicy {
    /// Every scalar, and every lane of every buffer element, is set to the seed
    Constant(i64),
    /// Values drawn from a generator seeded with this value
    Random { seed: u64 },
}

impl Default for ValuePolicy {
    fn default() -> Self {
        ValuePolicy::Constant(1)
    }
}

impl ValuePolicy {
    /// A policy that produces different inputs, for input-sensitivity checks
    pub fn alternate(&self) -> ValuePolicy {
        match *self {
            ValuePolicy::Constant(value) => ValuePolicy::Random {
                seed: value as u64,
            },
            ValuePolicy::Random { seed } => ValuePolicy::Random {
                seed: seed.wrapping_add(1),
            },
        }
    }
}

/// Everything needed to drive one OpenCL program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// OpenCL C source of the program
    pub opencl_src: String,
    /// Extra build options; `-cl-kernel-arg-info` is always added
    #[serde(default)]
    pub build_opts: String,
    #[serde(default)]
    pub device: DeviceSelector,
    /// Size matrix; the first entry that runs is the reference
    pub dynamic_params: Vec<DynamicParams>,
    #[serde(default)]
    pub value_policy: ValuePolicy,
    /// Rerun each configuration with alternate inputs
    #[serde(default = "default_true")]
    pub check_input_sensitivity: bool,
    /// Caller-supplied values, one entry per non-local parameter in declared
    /// order; replaces `value_policy` for the checked runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<Vec<Vec<String>>>,
}

fn default_true() -> bool {
    true
}

impl Instance {
    pub fn new(opencl_src: impl Into<String>) -> Self {
        Self {
            opencl_src: opencl_src.into(),
            build_opts: String::new(),
            device: DeviceSelector::default(),
            dynamic_params: Vec::new(),
            value_policy: ValuePolicy::default(),
            check_input_sensitivity: true,
            inputs: None,
        }
    }

    pub fn with_build_opts(mut self, opts: impl Into<String>) -> Self {
        self.build_opts = opts.into();
        self
    }

    pub fn with_device(mut self, device: DeviceSelector) -> Self {
        self.device = device;
        self
    }

    pub fn with_dynamic_params(mut self, params: DynamicParams) -> Self {
        self.dynamic_params.push(params);
        self
    }

    pub fn with_value_policy(mut self, policy: ValuePolicy) -> Self {
        self.value_policy = policy;
        self
    }

    pub fn with_inputs(mut self, inputs: Vec<Vec<String>>) -> Self {
        self.inputs = Some(inputs);
        self
    }

    pub fn with_input_sensitivity_check(mut self, enabled: bool) -> Self {
        self.check_input_sensitivity = enabled;
        self
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validate_dynamic_params() {
        assert!(DynamicParams::new(8, 2).validate(256).is_ok());
        assert!(DynamicParams::new(8, 0).validate(256).is_err());
        assert!(DynamicParams::new(0, 1).validate(256).is_err());
        assert!(DynamicParams::new(8, 3).validate(256).is_err());
        assert!(DynamicParams::new(512, 512).validate(256).is_err());
    }

    #[test]
    fn test_alternate_policy_differs() {
        let constant = ValuePolicy::Constant(3);
        assert_ne!(constant.alternate(), constant);
        let random = ValuePolicy::Random { seed: 7 };
        assert_eq!(random.alternate(), ValuePolicy::Random { seed: 8 });
    }

    #[test]
    fn test_builder() {
        let instance = Instance::new("kernel void A() {}")
            .with_build_opts("-cl-opt-disable")
            .with_dynamic_params(DynamicParams::new(8, 1))
            .with_dynamic_params(DynamicParams::new(8, 2));
        assert_eq!(instance.build_opts, "-cl-opt-disable");
        assert_eq!(instance.dynamic_params.len(), 2);
        assert_eq!(instance.device, DeviceSelector::Index(0));
    }

    #[test]
    fn test_json_file_round_trip() {
        let instance = Instance::new("kernel void A(global int* a) {}")
            .with_device(DeviceSelector::Name("GPU".to_string()))
            .with_dynamic_params(DynamicParams::new(16, 4))
            .with_value_policy(ValuePolicy::Random { seed: 42 });

        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(instance.to_json().unwrap().as_bytes()).unwrap();

        let loaded = Instance::from_json_file(file.path()).unwrap();
        assert_eq!(loaded, instance);
    }

    #[test]
    fn test_json_defaults() {
        let json = r#"{
            "opencl_src": "kernel void A() {}",
            "dynamic_params": [{"global_size_x": 4, "local_size_x": 1}]
        }"#;
        let instance: Instance = serde_json::from_str(json).unwrap();
        assert_eq!(instance.value_policy, ValuePolicy::Constant(1));
        assert!(instance.check_input_sensitivity);
        assert!(instance.build_opts.is_empty());
        assert!(instance.inputs.is_none());
    }

    #[test]
    fn test_json_inputs() {
        let json = r#"{
            "opencl_src": "kernel void A(const int n, global int* a) {}",
            "dynamic_params": [{"global_size_x": 4, "local_size_x": 1}],
            "inputs": [["2"], ["1", "2", "3"]]
        }"#;
        let instance: Instance = serde_json::from_str(json).unwrap();
        let inputs = instance.inputs.unwrap();
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[1], vec!["1", "2", "3"]);
    }
}
