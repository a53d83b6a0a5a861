//! By-value kernel argument

use crate::error::Result;
use crate::opencl_type::{OpenClType, Value};
use ocl::core::{ArgVal, Kernel as KernelCore};
use std::ffi::c_void;
use std::fmt;

/// A scalar or vector passed by value
///
/// The kernel cannot modify it, so reading it back is a plain copy.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarArg {
    value: Value,
}

impl ScalarArg {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn ty(&self) -> OpenClType {
        self.value.ty()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.value.as_bytes().len()
    }

    pub(crate) fn bind(&self, kernel: &KernelCore, index: u32) -> Result<()> {
        let bytes = self.value.as_bytes();
        // clSetKernelArg copies the bytes before returning.
        let arg = unsafe { ArgVal::from_raw(bytes.len(), bytes.as_ptr() as *const c_void, false) };
        ocl::core::set_kernel_arg(kernel, index, arg)?;
        Ok(())
    }
}

impl fmt::Display for ScalarArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}
