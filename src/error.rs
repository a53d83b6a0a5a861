//! Error types for the driver

use thiserror::Error;

/// Errors raised by the value model, the kernel driver and the runner
#[derive(Debug, Error)]
pub enum CldriveError {
    /// A call into the OpenCL API failed
    #[error("OpenCL error: {0}")]
    OpenCl(#[from] ocl::Error),

    /// The requested device could not be resolved
    #[error("device not found: {0}")]
    DeviceNotFound(String),

    /// `clBuildProgram` rejected the source or the build options
    #[error("program build failed: {0}")]
    Build(String),

    /// Local memory lives on the device only and cannot be copied back
    #[error("local memory argument is not host-readable")]
    LocalMemoryNotReadable,

    /// A global buffer without a device mirror was used on the device
    #[error("global buffer has no device mirror")]
    DetachedBuffer,

    /// The kernel declares an argument type outside the type catalog
    #[error("unsupported argument {index} of type '{type_name}'")]
    UnsupportedArgument { index: u32, type_name: String },

    /// The global/local size pair cannot be launched
    #[error("invalid dynamic params: {0}")]
    InvalidDynamicParams(String),

    /// An OpenCL type name could not be resolved
    #[error("unknown OpenCL type '{0}'")]
    UnknownType(String),

    /// Text could not be parsed as a value of the given type
    #[error("cannot parse '{text}' as {type_name}")]
    ParseValue { text: String, type_name: String },

    /// The number of caller-supplied inputs does not match the kernel
    #[error("kernel expects {expected} inputs, but {provided} were provided")]
    InputCount { expected: usize, provided: usize },

    /// An OpenCL info query returned a result of the wrong kind
    #[error("unexpected OpenCL info result: {0}")]
    UnexpectedInfo(String),

    /// Reading or writing a configuration file failed
    #[error("config error: {0}")]
    Config(String),
}

impl From<ocl::core::Error> for CldriveError {
    fn from(e: ocl::core::Error) -> Self {
        Self::OpenCl(ocl::Error::from(e))
    }
}

impl From<std::io::Error> for CldriveError {
    fn from(e: std::io::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<serde_json::Error> for CldriveError {
    fn from(e: serde_json::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl CldriveError {
    /// Native OpenCL status code and name, when the error came from the API
    pub fn status(&self) -> Option<(i32, String)> {
        match self {
            Self::OpenCl(e) => e.api_status().map(|s| {
                let name = format!("{:?}", s);
                (s as i32, name)
            }),
            _ => None,
        }
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, CldriveError>;
