pub mod block;
pub mod block_header;
pub mod block_transition;
pub mod coins;
pub mod constants;
pub mod deposit;
pub mod epoch_transition;
pub mod exit;
pub mod genesis;
pub mod governance;
pub mod merkle;
pub mod receipt;
pub mod shuffle;
pub mod slashing;
pub mod slot_transition;
pub mod state;
pub mod transfer;
pub mod validator;
pub mod view;
pub mod vote;
pub mod voter_group;
