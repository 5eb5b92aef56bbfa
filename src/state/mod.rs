// ============================================================================
// STATE MODULE - estado compartido con Rc<Cell/RefCell>
// ============================================================================

pub mod sync_state;

pub use sync_state::*;
