pub mod checkpoint;
pub mod context;
pub mod dag;
pub mod dispatch;
pub mod errors;
pub mod loopctl;
pub mod plan;
pub mod scars;
pub mod settings;
pub mod store;
pub mod verify;
