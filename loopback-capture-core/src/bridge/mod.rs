pub mod callback_bridge;
pub mod registry;
