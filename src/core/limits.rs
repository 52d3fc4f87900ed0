/*!
 * Store Limits and Constants
 *
 * Defaults for table geometry, payload bounds and the network front end.
 */

// =============================================================================
// TABLE GEOMETRY
// =============================================================================

/// Bucket count of a freshly created table
pub const INITIAL_TABLE_SIZE: usize = 64;

/// Factor applied to the bucket count on every resize
pub const GROWTH_MULTIPLIER: usize = 2;

/// Average chain length that triggers a resize once exceeded
pub const DENSITY_THRESHOLD: usize = 1;

// =============================================================================
// PAYLOAD LIMITS
// =============================================================================

/// Largest key accepted across the boundary (64KB)
pub const MAX_KEY_SIZE: usize = 64 * 1024;

/// Largest value accepted across the boundary (16MB)
pub const MAX_VALUE_SIZE: usize = 16 * 1024 * 1024;

// =============================================================================
// REQUEST HANDLING
// =============================================================================

/// Requests slower than this are logged as warnings
pub const SLOW_REQUEST_THRESHOLD_MS: u128 = 10;

/// Times a client re-runs the two-phase GET after the value changed under it
pub const GET_RETRIES: usize = 3;

// =============================================================================
// NETWORK FRONT END
// =============================================================================

/// Default loopback port of the `kdict` binary
pub const DEFAULT_LISTEN_PORT: u16 = 50061;

/// Largest accepted request line
///
/// Payloads travel as JSON number arrays, up to four characters per byte
/// ("255,"), so a SET of the largest key and value must still fit.
pub const MAX_FRAME_SIZE: usize = 4 * (MAX_KEY_SIZE + MAX_VALUE_SIZE) + 4096;
