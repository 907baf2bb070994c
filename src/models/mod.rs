pub mod appointment;
pub mod bed;
pub mod doctor;
pub mod enums;
pub mod leave;

pub use appointment::*;
pub use bed::*;
pub use doctor::*;
pub use enums::*;
pub use leave::*;
