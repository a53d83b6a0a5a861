//! Local (work-group scratch) memory argument

use crate::error::Result;
use crate::opencl_type::{OpenClType, element_size};
use ocl::core::{ArgVal, Kernel as KernelCore};
use std::fmt;

/// A `__local` buffer: only its size is known on the host
///
/// The device allocates the memory when the argument is bound, so there is
/// nothing to copy in either direction. Its contents are never observable,
/// so equality compares the element type only.
#[derive(Debug, Clone, Copy)]
pub struct LocalArg {
    ty: OpenClType,
    len: usize,
}

impl LocalArg {
    pub fn new(ty: OpenClType, len: usize) -> Self {
        Self { ty, len }
    }

    pub fn ty(&self) -> OpenClType {
        self.ty
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn size_in_bytes(&self) -> usize {
        self.len * element_size(self.ty)
    }

    pub(crate) fn bind(&self, kernel: &KernelCore, index: u32) -> Result<()> {
        let byte_len = self.size_in_bytes();
        ocl::core::set_kernel_arg(kernel, index, ArgVal::local::<u8>(&byte_len))?;
        Ok(())
    }
}

impl PartialEq for LocalArg {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
    }
}

impl Eq for LocalArg {}

impl fmt::Display for LocalArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "local {}[{}]", self.ty, self.len)
    }
}
