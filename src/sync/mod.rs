//! Reconciliation between a board and the issue tracker.
//!
//! A run resolves the board's lists, snapshots every card and indexes which
//! cards already link to an issue. The passes then run in order against that
//! snapshot, each leaving it current for the next:
//!
//! 1. close issues of cards filed as done (or reopen the card)
//! 2. move cards whose issue was closed into DONE
//! 3. open an issue for every unlinked card
//! 4. create a card for every open issue without one
//! 5. add board backlinks to linked issues

pub mod board;
pub mod directory;
pub mod engine;
pub mod link;
pub mod snapshot;
pub mod text;


pub use board::BoardSync;
pub use directory::UserDirectory;
pub use engine::SyncReport;
