//! Global memory buffer argument

use crate::error::{CldriveError, Result};
use crate::opencl_type::{OpenClType, element_size, elements_equal, format_element, write_element};
use crate::profiling::{ProfilingData, ProfilingStage};
use ocl::core::{ArgVal, Kernel as KernelCore};
use ocl::{Buffer, Event, Queue, flags};
use std::fmt;

/// A `__global` or `__constant` buffer
///
/// Holds the host copy of the elements and, for buffers created against a
/// queue, a device mirror of the same byte length. The two are synchronised
/// only by explicit `copy_to_device` / `copy_from_device` calls.
///
/// Read-only buffers are never read back: the kernel cannot change them.
pub struct GlobalArg {
    ty: OpenClType,
    host: Vec<u8>,
    device: Option<Buffer<u8>>,
    read_only: bool,
}

impl GlobalArg {
    /// Create a buffer and allocate its device mirror on `queue`'s context
    pub fn new(ty: OpenClType, host: Vec<u8>, queue: &Queue) -> Result<Self> {
        Self::with_access(ty, host, false, queue)
    }

    /// Like [`GlobalArg::new`], for `__constant` and `const` parameters
    pub fn read_only(ty: OpenClType, host: Vec<u8>, queue: &Queue) -> Result<Self> {
        Self::with_access(ty, host, true, queue)
    }

    pub(crate) fn with_access(
        ty: OpenClType,
        host: Vec<u8>,
        read_only: bool,
        queue: &Queue,
    ) -> Result<Self> {
        let flags = if read_only {
            flags::MEM_READ_ONLY
        } else {
            flags::MEM_READ_WRITE
        };
        let buffer = Buffer::<u8>::builder()
            .queue(queue.clone())
            .flags(flags)
            .len(host.len())
            .build()?;

        Ok(Self {
            ty,
            host,
            device: Some(buffer),
            read_only,
        })
    }

    /// Host-only buffer, e.g. the result of a read-back
    pub fn from_host(ty: OpenClType, host: Vec<u8>) -> Self {
        debug_assert_eq!(host.len() % element_size(ty), 0);
        Self {
            ty,
            host,
            device: None,
            read_only: false,
        }
    }

    /// `len` elements with every lane set to `seed`
    pub fn filled(ty: OpenClType, len: usize, seed: i64) -> Self {
        Self::from_host(ty, Self::filled_bytes(ty, len, seed))
    }

    fn filled_bytes(ty: OpenClType, len: usize, seed: i64) -> Vec<u8> {
        let size = element_size(ty);
        let mut host = vec![0u8; len * size];
        for element in host.chunks_exact_mut(size) {
            write_element(ty, seed, element);
        }
        host
    }

    pub fn ty(&self) -> OpenClType {
        self.ty
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.host.len() / element_size(self.ty)
    }

    pub fn is_empty(&self) -> bool {
        self.host.is_empty()
    }

    pub fn size_in_bytes(&self) -> usize {
        self.host.len()
    }

    pub fn has_device_mirror(&self) -> bool {
        self.device.is_some()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Encoded bytes of element `index`
    pub fn element(&self, index: usize) -> Option<&[u8]> {
        let size = element_size(self.ty);
        self.host.get(index * size..(index + 1) * size)
    }

    pub fn elements(&self) -> impl Iterator<Item = &[u8]> {
        self.host.chunks_exact(element_size(self.ty))
    }

    fn mirror(&self) -> Result<&Buffer<u8>> {
        self.device.as_ref().ok_or(CldriveError::DetachedBuffer)
    }

    pub(crate) fn copy_to_device(&self, queue: &Queue, profiling: &mut ProfilingData) -> Result<()> {
        let buffer = self.mirror()?;
        let mut event = Event::empty();
        buffer
            .write(&self.host[..])
            .queue(queue)
            .enew(&mut event)
            .enq()?;
        profiling.record_event(ProfilingStage::TransferIn, &event)?;
        Ok(())
    }

    /// Read the device mirror into a new host-only buffer
    ///
    /// A read-only buffer yields a copy of its host elements without a
    /// transfer.
    pub(crate) fn copy_from_device(
        &self,
        queue: &Queue,
        profiling: &mut ProfilingData,
    ) -> Result<GlobalArg> {
        let buffer = self.mirror()?;
        if self.read_only {
            return Ok(GlobalArg {
                ty: self.ty,
                host: self.host.clone(),
                device: None,
                read_only: true,
            });
        }
        let mut host = vec![0u8; self.host.len()];
        let mut event = Event::empty();
        buffer
            .read(&mut host[..])
            .queue(queue)
            .enew(&mut event)
            .enq()?;
        profiling.record_event(ProfilingStage::TransferOut, &event)?;
        Ok(GlobalArg::from_host(self.ty, host))
    }

    pub(crate) fn bind(&self, kernel: &KernelCore, index: u32) -> Result<()> {
        let buffer = self.mirror()?;
        ocl::core::set_kernel_arg(kernel, index, ArgVal::mem(buffer.as_core()))?;
        Ok(())
    }
}

impl PartialEq for GlobalArg {
    fn eq(&self, other: &Self) -> bool {
        self.ty == other.ty
            && self.len() == other.len()
            && self
                .elements()
                .zip(other.elements())
                .all(|(a, b)| elements_equal(self.ty, a, b))
    }
}

impl fmt::Display for GlobalArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elements: Vec<String> = self.elements().map(|e| format_element(self.ty, e)).collect();
        write!(f, "[{}]", elements.join(", "))
    }
}

impl fmt::Debug for GlobalArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalArg")
            .field("ty", &self.ty)
            .field("len", &self.len())
            .field("device", &self.device.is_some())
            .field("read_only", &self.read_only)
            .finish()
    }
}
