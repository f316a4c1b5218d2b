//! Post-handshake command verbs.

/// A command frame received from an authenticated client.
///
/// Matching is exact: no trimming, no case folding. Anything that is not a
/// known verb is [`Command::Unrecognized`], which the server ignores without
/// replying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `lsimage`: list the images visible to the project
    ListImages,
    /// `createInstance`: list flavors and networks available for a new
    /// instance
    CreateInstance,
    /// Any other text
    Unrecognized(String),
}

impl Command {
    /// Wire verb for [`Command::ListImages`].
    pub const LIST_IMAGES: &'static str = "lsimage";

    /// Wire verb for [`Command::CreateInstance`].
    pub const CREATE_INSTANCE: &'static str = "createInstance";

    /// Classify a command frame.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text {
            Self::LIST_IMAGES => Self::ListImages,
            Self::CREATE_INSTANCE => Self::CreateInstance,
            other => Self::Unrecognized(other.to_string()),
        }
    }
}
