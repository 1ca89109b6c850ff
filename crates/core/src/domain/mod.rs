pub mod lookup;
pub mod quote;
