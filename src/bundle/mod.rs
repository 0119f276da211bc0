// Viewer bundle: beats in, `mulmo_view.json` plus media files out
//
// - beat: the narrated content unit and the beat-list input format
// - manifest: `mulmo_view.json` read/write
// - lock: single-writer guard on an output directory
// - assembler: stages media and merges beats with localization results

pub mod assembler;
pub mod beat;
pub mod lock;
pub mod manifest;

pub use assembler::{media_file_name, BundleAssembler};
pub use beat::{Beat, BeatList, MediaReference, Timing};
pub use lock::{BundleLock, LOCK_FILE};
pub use manifest::{BeatData, ViewerBundle, MANIFEST_FILE};
