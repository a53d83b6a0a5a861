//! Kernel signatures read from `-cl-kernel-arg-info`

use crate::arg_value::{KernelArgValue, ValueGenerator};
use crate::config::DynamicParams;
use crate::error::{CldriveError, Result};
use crate::opencl_type::OpenClType;
use ocl::Queue;
use ocl::core::{
    Kernel as KernelCore, KernelArgAddressQualifier, KernelArgInfo, KernelArgInfoResult,
    KernelArgTypeQualifier,
    KernelInfo, KernelInfoResult, OpenclVersion,
};
use std::fmt;

/// Qualifiers that may precede or follow the base type in a reported name
const TYPE_QUALIFIERS: [&str; 4] = ["const", "restrict", "volatile", "__restrict"];

/// Address space of a kernel parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressSpace {
    Global,
    Constant,
    Local,
    Private,
}

impl From<KernelArgAddressQualifier> for AddressSpace {
    fn from(q: KernelArgAddressQualifier) -> Self {
        match q {
            KernelArgAddressQualifier::Global => AddressSpace::Global,
            KernelArgAddressQualifier::Constant => AddressSpace::Constant,
            KernelArgAddressQualifier::Local => AddressSpace::Local,
            KernelArgAddressQualifier::Private => AddressSpace::Private,
        }
    }
}

/// One declared kernel parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelArg {
    index: u32,
    type_name: String,
    ty: OpenClType,
    address: AddressSpace,
    is_pointer: bool,
    is_const: bool,
}

impl KernelArg {
    /// Resolve a parameter from its reported type name and address space
    ///
    /// Fails with [`CldriveError::UnsupportedArgument`] for types outside the
    /// catalog (images, samplers, structs) and for private pointers.
    pub fn from_parts(index: u32, type_name: &str, address: AddressSpace) -> Result<Self> {
        let unsupported = || CldriveError::UnsupportedArgument {
            index,
            type_name: type_name.to_string(),
        };

        let is_pointer = type_name.contains('*');
        let words = type_name.replace('*', " ");
        let declared_const = words.split_whitespace().any(|word| word == "const");
        let base = words
            .split_whitespace()
            .filter(|word| !TYPE_QUALIFIERS.contains(word))
            .collect::<Vec<_>>()
            .join(" ");
        let ty: OpenClType = base.parse().map_err(|_| unsupported())?;

        match (address, is_pointer) {
            (AddressSpace::Private, true) => Err(unsupported()),
            (AddressSpace::Private, false) | (_, true) => Ok(Self {
                index,
                type_name: type_name.to_string(),
                ty,
                address,
                is_pointer,
                is_const: address == AddressSpace::Constant || (is_pointer && declared_const),
            }),
            (_, false) => Err(unsupported()),
        }
    }

    /// Query parameter `index` of a kernel built with argument info enabled
    pub fn query(kernel: &KernelCore, index: u32, version: OpenclVersion) -> Result<Self> {
        let versions = [version];
        let info = |request: KernelArgInfo| {
            ocl::core::get_kernel_arg_info(kernel, index, request, Some(&versions[..]))
        };

        let type_name = match info(KernelArgInfo::TypeName)? {
            KernelArgInfoResult::TypeName(name) => name,
            other => return Err(CldriveError::UnexpectedInfo(format!("{:?}", other))),
        };
        let address = match info(KernelArgInfo::AddressQualifier)? {
            KernelArgInfoResult::AddressQualifier(q) => AddressSpace::from(q),
            other => return Err(CldriveError::UnexpectedInfo(format!("{:?}", other))),
        };
        let qualified_const = match info(KernelArgInfo::TypeQualifier)? {
            KernelArgInfoResult::TypeQualifier(q) => q.contains(KernelArgTypeQualifier::CONST),
            other => return Err(CldriveError::UnexpectedInfo(format!("{:?}", other))),
        };

        let mut arg = Self::from_parts(index, &type_name, address)?;
        arg.is_const |= qualified_const && arg.is_pointer;
        Ok(arg)
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Type name exactly as the implementation reported it
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn ty(&self) -> OpenClType {
        self.ty
    }

    pub fn address(&self) -> AddressSpace {
        self.address
    }

    pub fn is_pointer(&self) -> bool {
        self.is_pointer
    }

    /// Buffers the kernel cannot write: `__constant` or `const`-qualified
    pub fn is_const(&self) -> bool {
        self.is_const
    }

    /// Whether the caller supplies a value for this parameter
    pub fn takes_input(&self) -> bool {
        self.address != AddressSpace::Local
    }

    /// Synthesize a value for this parameter
    ///
    /// Global and constant buffers hold `global_size_x` elements, local
    /// buffers `local_size_x` elements. Scalars take the next generated value.
    /// Const buffers are allocated read-only.
    pub fn create_value(
        &self,
        queue: &Queue,
        params: &DynamicParams,
        generator: &mut ValueGenerator,
    ) -> Result<KernelArgValue> {
        Ok(match self.address {
            AddressSpace::Global | AddressSpace::Constant => generator
                .global(self.ty, params.global_size_x, self.is_const, queue)?
                .into(),
            AddressSpace::Local => generator.local(self.ty, params.local_size_x).into(),
            AddressSpace::Private => generator.scalar(self.ty)?.into(),
        })
    }
}

impl fmt::Display for KernelArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let space = match self.address {
            AddressSpace::Global => "global ",
            AddressSpace::Constant => "constant ",
            AddressSpace::Local => "local ",
            AddressSpace::Private => "",
        };
        write!(f, "{}{}", space, self.ty)?;
        if self.is_pointer {
            write!(f, "*")?;
        }
        Ok(())
    }
}

/// Read the full parameter list of `kernel`, in declared order
pub fn kernel_signature(kernel: &KernelCore, version: OpenclVersion) -> Result<Vec<KernelArg>> {
    let num_args = match ocl::core::get_kernel_info(kernel, KernelInfo::NumArgs)? {
        KernelInfoResult::NumArgs(n) => n,
        other => return Err(CldriveError::UnexpectedInfo(format!("{:?}", other))),
    };
    (0..num_args)
        .map(|index| KernelArg::query(kernel, index, version))
        .collect()
}
