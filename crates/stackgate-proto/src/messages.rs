//! Literal frames of the session protocol.
//!
//! Clients match on these strings byte for byte, including the trailing
//! spaces and the doubled space in [`NO_IMAGES`]. Do not reformat them.

/// First frame sent by the server on every accepted connection.
pub const AUTH_INITIATED: &str = "AUTH SEQUENCE INITIATED BY SERVER . . . ";

/// Sent when the identity service accepted the credentials.
pub const AUTH_SUCCESS: &str = "success";

/// Sent when the credentials were rejected for any reason.
pub const AUTH_ERROR: &str = "error";

/// Follows [`AUTH_SUCCESS`].
pub const AUTH_COMPLETED: &str = "AUTH SEQUENCE COMPLETED BY CLIENT . . . ";

/// Follows [`AUTH_ERROR`]. The server closes the connection afterwards.
pub const AUTH_FAILED: &str = "AUTH SEQUENCE FAILED BY CLIENT . . . ";

/// Response to `lsimage` when the image service lists nothing.
pub const NO_IMAGES: &str = "NO IMAGES AVAILABLE CURRENTLY. CONTACT  ADMIN";

/// Sent during `createInstance` when no flavors exist.
pub const NO_FLAVORS: &str = "NO FLAVORS AVAILABLE CURRENTLY. CONTACT ADMIN.";

/// Sent during `createInstance` when no networks exist.
pub const NO_NETWORKS: &str = "NO NETWORKS AVAILABLE CURRENTLY. CONTACT ADMIN.";

/// Sent when the image service could not be queried.
pub const IMAGE_LISTING_FAILED: &str = "IMAGE LISTING FAILED. CONTACT ADMIN.";

/// Sent when the compute service could not list flavors.
pub const FLAVOR_LISTING_FAILED: &str = "FLAVOR LISTING FAILED. CONTACT ADMIN.";

/// Sent when the network service could not list networks.
pub const NETWORK_LISTING_FAILED: &str = "NETWORK LISTING FAILED. CONTACT ADMIN.";

/// Separator between the fields of a credential frame.
pub const CREDENTIAL_SEPARATOR: char = ',';

/// Separator between the id and name of a rendered resource record.
pub const RECORD_SEPARATOR: &str = " : ";
