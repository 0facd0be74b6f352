pub mod order;
pub mod proposal;
