//! Accept media types the control plane's versioned endpoints expect.
//!
//! Every request carries an explicit `Accept` header pinning the response
//! schema version — there is no "latest" default on the wire.

/// Default `/api/atlas/v2` media type (versioned JSON).
pub const ATLAS_V2_JSON: &str = "application/vnd.atlas.2025-03-12+json";

/// `/api/atlas/v1.0` media type (disks/partition measurements).
pub const ATLAS_V1_JSON: &str = "application/json";

/// Log file gzip pass-through media type (out of core scope; carried only
/// so `get_bytes` can be exercised against the one endpoint that uses it).
pub const LOG_GZIP: &str = "application/vnd.atlas.2023-02-01+gzip";
