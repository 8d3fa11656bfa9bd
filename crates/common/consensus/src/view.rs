use alloy_primitives::B256;

/// The chain context a state transition runs against. The caller supplies
/// block hashes and tracks the advancing tip; the state machine itself never
/// touches storage.
pub trait BlockView {
    /// Hash of the block at the given slot, or of the most recent ancestor
    /// if the slot was skipped.
    fn get_hash_by_slot(&self, slot: u64) -> anyhow::Result<B256>;

    /// Hash of the current tip.
    fn tip(&self) -> anyhow::Result<B256>;

    /// Advance the view to the given slot.
    fn set_tip_slot(&mut self, slot: u64);

    /// State root recorded at the tip.
    fn get_last_state_root(&self) -> anyhow::Result<B256>;
}
