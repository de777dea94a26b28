pub mod events;
pub mod localtime;
pub mod parsed;
pub mod policy;
pub mod recurrence;
pub mod reminder;

pub use events::*;
pub use parsed::*;
pub use policy::*;
pub use recurrence::*;
pub use reminder::*;
