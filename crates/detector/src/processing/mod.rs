pub mod coords;
pub mod decode;
pub mod filter;
pub mod nms;
pub mod post;
