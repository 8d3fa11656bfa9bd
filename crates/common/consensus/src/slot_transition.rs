use alloy_primitives::B256;
use olympus_chain_spec::ChainParams;
use tracing::debug;

use crate::{receipt::EpochReceipt, state::State, view::BlockView};

impl State {
    /// Advance the state by one slot, recording the hash of the block at the
    /// slot just left behind.
    pub fn process_slot(&mut self, previous_block_root: B256, params: &ChainParams) {
        self.slot += 1;
        let index = ((self.slot - 1) % params.latest_block_roots_length) as usize;
        self.latest_block_hashes[index] = previous_block_root;
        debug!(slot = self.slot, "processed slot");
    }

    /// Advance the state up to `requested_slot`, running the epoch transition
    /// at each epoch boundary crossed on the way. Returns the balance
    /// receipts of every epoch transition that ran.
    pub fn process_slots<V: BlockView>(
        &mut self,
        requested_slot: u64,
        view: &mut V,
        params: &ChainParams,
    ) -> anyhow::Result<Vec<EpochReceipt>> {
        let mut receipts = Vec::new();
        while self.slot < requested_slot {
            if self.slot / params.epoch_length > self.epoch_index
                && self.slot % params.epoch_length == 0
            {
                receipts.extend(self.process_epoch_transition(params)?);
            }
            let tip = view.tip()?;
            self.process_slot(tip, params);
            view.set_tip_slot(self.slot);
        }
        Ok(receipts)
    }
}
