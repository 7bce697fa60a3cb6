pub mod background;
pub mod consts;
pub mod cosmetic;
pub mod detection;
pub mod error;
pub mod frame;
pub mod image;
pub mod io;
pub mod pipeline;
pub mod pool;
pub mod registration;
pub mod xml;
