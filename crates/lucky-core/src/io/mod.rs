//! Frame I/O: directory enumeration and the two on-disk image formats this
//! crate round-trips (FITS in, FITS or XISF out).

pub mod fits;
pub mod xisf;

pub use fits::{load_fits, save_fits, scan_frame_directory};
pub use xisf::{registration_output_path, save_xisf};
