use std::sync::LazyLock;

/// The seed used when hashing sequence identifiers into the value index.
pub const SEQUENCE_HASH_SEED: u64 = 13;

/// The number of authentication tokens which can hold sequence privileges.
pub const AUTH_TOKEN_MAX: usize = 32;

/// The size in bytes of each extent backing the sequence value index (defaults to 512 bytes)
pub static SEQUENCE_EXTENT_SIZE: LazyLock<usize> =
	lazy_env_parse!("SURREAL_SEQUENCE_EXTENT_SIZE", usize, 512);

/// The maximum number of extents which the sequence value index may hold at
/// once. A value of 0 places no limit on the number of extents (defaults to 0)
pub static SEQUENCE_EXTENT_LIMIT: LazyLock<usize> =
	lazy_env_parse!("SURREAL_SEQUENCE_EXTENT_LIMIT", usize, 0);
