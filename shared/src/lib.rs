pub mod protocol;
pub mod ansi;
pub mod entities;
pub mod items;
pub mod world;
pub mod space;

pub use protocol::*;
pub use entities::*;
pub use items::*;
pub use world::*;
pub use space::*;
