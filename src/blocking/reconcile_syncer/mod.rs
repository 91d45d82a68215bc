#[doc(hidden)]
pub mod applier;
#[doc(hidden)]
pub mod fetcher;
#[doc(hidden)]
pub mod materializer;
pub mod reconciler;
#[doc(hidden)]
mod syncer;
pub mod time_helper;
pub mod watermark;

pub use reconciler::{Disposition, SyncPlan};
pub use syncer::{MappingReport, PassReport, ReconcileSyncer};
pub use time_helper::{Clock, ManualClock, SystemClock};
pub use watermark::{Side, WatermarkKey, WatermarkStore};
