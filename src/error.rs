#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A read asked for more bits or bytes than remain.
    #[error("Not enough data: needed {needed} bits, {available} available")]
    BufferUnderflow { needed: usize, available: usize },

    /// Out-of-range width, position, or otherwise unusable argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Version #{version} SFDU labels are not supported; label={label}")]
    UnsupportedVersion { version: u8, label: String },

    /// Declared unit length missing, unparsable, or outside `0..=max`.
    #[error("Invalid SFDU length {length:?} in label {label}; allowed range is 0 to {max} bytes")]
    InvalidLength {
        length: Option<i64>,
        max: usize,
        label: String,
    },

    #[error("Data CHDO not found at end of SFDU")]
    MissingDataRecord,

    /// The primary CHDO does not define one of the identity fields.
    #[error("Could not find field \"{0}\" in the input SFDU (should be in the primary CHDO)")]
    MissingIdentityField(String),

    #[error("The CHDO property \"{0}\" is not defined")]
    UnknownProperty(String),

    #[error("The CHDO property \"{property}\" references an unknown CHDO field \"{field}\"")]
    UnknownField { property: String, field: String },

    /// Dictionary construction contract violation.
    #[error("Invalid CHDO dictionary: {0}")]
    Dictionary(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn underflow(needed: usize, available: usize) -> Self {
        Error::BufferUnderflow { needed, available }
    }
}
