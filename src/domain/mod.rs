pub mod commands;
pub mod equipment;
pub mod errors;
pub mod events;
pub mod late_fee;
pub mod loan;
pub mod value_objects;

pub use commands::*;
pub use equipment::*;
pub use errors::*;
pub use events::*;
pub use loan::*;
pub use value_objects::*;
