// ── Store façade ──
//
// Public entry point composing the scheduler and the broadcast hub around
// one owned snapshot.

mod builder;
mod state_store;

pub use builder::StoreBuilder;
pub use state_store::Store;
