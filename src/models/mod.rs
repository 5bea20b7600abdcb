pub mod climate;
pub mod forecast;
pub mod phenology;
pub mod plantation;
pub mod recommendation;
pub mod soil;
pub mod variety;

pub use climate::*;
pub use forecast::*;
pub use phenology::*;
pub use plantation::*;
pub use recommendation::*;
pub use soil::*;
pub use variety::*;
