//! Document models, one module per area.

pub mod company;
pub mod design;
pub mod media;
pub mod offer;
pub mod user;

pub use company::*;
pub use design::*;
pub use media::*;
pub use offer::*;
pub use user::*;
