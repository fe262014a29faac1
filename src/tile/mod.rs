//! Tiles: the user-facing ciphertext and plaintext handles.
//!
//! A tile owns an opaque backend payload plus an `Arc` to the context it was
//! created under. All scheme bookkeeping (chain-index reconciliation,
//! relinearize/rescale scheduling, bootstrap triggering) lives here, in the
//! managed operations; the raw variants skip it for callers doing their own
//! scale management.

mod ctile;
mod ptile;

pub use ctile::CTile;
pub use ptile::PTile;

use crate::backend::Device;
use crate::error::HeResult;

/// Metadata behavior shared by cipher and plain tiles.
pub trait Tile {
    fn chain_index(&self) -> i32;
    /// Where the payload lives; follows the owning context's default.
    fn device(&self) -> Device;
    /// Lowers the chain index; increasing it is the bootstrap's privilege.
    fn set_chain_index(&mut self, target: i32) -> HeResult<()>;
    fn reduce_chain_index(&mut self) -> HeResult<()>;
    fn scale(&self) -> HeResult<f64>;
    fn set_scale(&mut self, scale: f64) -> HeResult<()>;
    fn slot_count(&self) -> usize;
    fn is_empty(&self) -> bool;
    /// Id of the owning context; tiles from different contexts never mix.
    fn context_id(&self) -> i32;
}
