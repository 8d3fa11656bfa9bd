use ssz_types::typenum::{U5, U32, U128, U2048, U4096, U8192, U1048576};

/// Coins created at genesis for the premine address.
pub const PREMINE_COINS: u64 = 25_000_000;

/// Epochs a new deposit waits before it is eligible for activation.
pub const ACTIVATION_DELAY_EPOCHS: u64 = 2;

/// Epochs a newly-activated validator is exempt from penalties.
pub const PENALTY_GRACE_EPOCHS: u64 = 5;

/// Epochs without finality before the inactivity leak starts.
pub const MAX_FINALITY_DELAY_EPOCHS: u64 = 4;

/// Distinct reward categories paid per epoch, used as the base-reward divisor.
pub const NUM_REWARD_CATEGORIES: u64 = 5;

// Type-level bounds for SSZ collections. Real limits are enforced at runtime
// against `ChainParams`; these only cap the encoding.
pub type MaxValidators = U1048576;
pub type MaxAccounts = U1048576;
pub type MaxSlotsPerEpoch = U4096;
pub type MaxBlockRoots = U8192;
pub type MaxCommitteeSize = U2048;
pub type MaxVotesPerEpoch = U8192;
pub type MaxManagers = U32;
pub type MaxVotesPerBlock = U128;
pub type MaxTxsPerBlock = U8192;
pub type MaxDepositsPerBlock = U128;
pub type MaxExitsPerBlock = U128;
pub type MaxVoteSlashingsPerBlock = U32;
pub type MaxRandaoSlashingsPerBlock = U32;
pub type MaxProposerSlashingsPerBlock = U32;
pub type MaxGovernanceVotesPerBlock = U128;
pub type MaxReplacementCandidates = U5;
