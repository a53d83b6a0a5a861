//! Kernel argument values
//!
//! A kernel argument is one of three variants, each with its own marshalling
//! rules:
//!
//! - [`ScalarArg`]: passed by value, never transferred
//! - [`LocalArg`]: work-group scratch memory, sized on bind, never readable
//! - [`GlobalArg`]: buffer with a host copy and a device mirror
//!
//! Values are grouped in a [`KernelArgValuesSet`] in the kernel's declared
//! parameter order.

mod generate;
mod global;
mod local;
mod scalar;
mod values_set;

pub use generate::ValueGenerator;
pub use global::GlobalArg;
pub use local::LocalArg;
pub use scalar::ScalarArg;
pub use values_set::KernelArgValuesSet;

use crate::error::{CldriveError, Result};
use crate::opencl_type::OpenClType;
use crate::profiling::ProfilingData;
use ocl::Queue;
use ocl::core::Kernel as KernelCore;
use std::fmt;

/// One argument value bound to a kernel parameter slot
#[derive(Debug)]
pub enum KernelArgValue {
    Scalar(ScalarArg),
    Local(LocalArg),
    Global(GlobalArg),
}

impl KernelArgValue {
    /// Element type of the value
    pub fn ty(&self) -> OpenClType {
        match self {
            KernelArgValue::Scalar(v) => v.ty(),
            KernelArgValue::Local(v) => v.ty(),
            KernelArgValue::Global(v) => v.ty(),
        }
    }

    pub fn is_local(&self) -> bool {
        matches!(self, KernelArgValue::Local(_))
    }

    /// Size of the argument's storage in bytes
    pub fn size_in_bytes(&self) -> usize {
        match self {
            KernelArgValue::Scalar(v) => v.size_in_bytes(),
            KernelArgValue::Local(v) => v.size_in_bytes(),
            KernelArgValue::Global(v) => v.size_in_bytes(),
        }
    }

    /// Write the host data to the device; only buffers transfer anything
    pub fn copy_to_device(&self, queue: &Queue, profiling: &mut ProfilingData) -> Result<()> {
        match self {
            KernelArgValue::Global(v) => v.copy_to_device(queue, profiling),
            KernelArgValue::Scalar(_) | KernelArgValue::Local(_) => Ok(()),
        }
    }

    /// Read the device state into a new value, leaving `self` untouched
    ///
    /// Local memory is not host-addressable, so it fails with
    /// [`CldriveError::LocalMemoryNotReadable`].
    pub fn copy_from_device_to_new_value(
        &self,
        queue: &Queue,
        profiling: &mut ProfilingData,
    ) -> Result<KernelArgValue> {
        match self {
            KernelArgValue::Scalar(v) => Ok(KernelArgValue::Scalar(v.clone())),
            KernelArgValue::Local(_) => Err(CldriveError::LocalMemoryNotReadable),
            KernelArgValue::Global(v) => {
                Ok(KernelArgValue::Global(v.copy_from_device(queue, profiling)?))
            }
        }
    }

    /// Bind to positional slot `index` of `kernel`
    pub fn bind(&self, kernel: &KernelCore, index: u32) -> Result<()> {
        match self {
            KernelArgValue::Scalar(v) => v.bind(kernel, index),
            KernelArgValue::Local(v) => v.bind(kernel, index),
            KernelArgValue::Global(v) => v.bind(kernel, index),
        }
    }
}

impl PartialEq for KernelArgValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (KernelArgValue::Scalar(a), KernelArgValue::Scalar(b)) => a == b,
            (KernelArgValue::Local(a), KernelArgValue::Local(b)) => a == b,
            (KernelArgValue::Global(a), KernelArgValue::Global(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for KernelArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelArgValue::Scalar(v) => fmt::Display::fmt(v, f),
            KernelArgValue::Local(v) => fmt::Display::fmt(v, f),
            KernelArgValue::Global(v) => fmt::Display::fmt(v, f),
        }
    }
}

impl From<ScalarArg> for KernelArgValue {
    fn from(v: ScalarArg) -> Self {
        KernelArgValue::Scalar(v)
    }
}

impl From<LocalArg> for KernelArgValue {
    fn from(v: LocalArg) -> Self {
        KernelArgValue::Local(v)
    }
}

impl From<GlobalArg> for KernelArgValue {
    fn from(v: GlobalArg) -> Self {
        KernelArgValue::Global(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opencl_type::Value;

    #[test]
    fn test_different_variants_are_never_equal() {
        let scalar: KernelArgValue = ScalarArg::new(Value::construct(OpenClType::INT, 1)).into();
        let local: KernelArgValue = LocalArg::new(OpenClType::INT, 1).into();
        let global: KernelArgValue = GlobalArg::filled(OpenClType::INT, 1, 1).into();

        assert_ne!(scalar, local);
        assert_ne!(scalar, global);
        assert_ne!(local, global);
        assert_eq!(global, KernelArgValue::from(GlobalArg::filled(OpenClType::INT, 1, 1)));
    }

    #[test]
    fn test_format_dispatch() {
        let scalar: KernelArgValue = ScalarArg::new(Value::construct(OpenClType::INT, 3)).into();
        let global: KernelArgValue = GlobalArg::filled(OpenClType::INT, 2, 3).into();
        let local: KernelArgValue = LocalArg::new(OpenClType::FLOAT, 4).into();
        assert_eq!(scalar.to_string(), "3");
        assert_eq!(global.to_string(), "[3, 3]");
        assert_eq!(local.to_string(), "local float[4]");
    }

    #[test]
    fn test_sizes() {
        let global: KernelArgValue = GlobalArg::filled(OpenClType::INT, 5, 0).into();
        assert_eq!(global.size_in_bytes(), 20);
        assert_eq!(global.ty(), OpenClType::INT);
        assert!(KernelArgValue::from(LocalArg::new(OpenClType::INT, 2)).is_local());
    }
}
